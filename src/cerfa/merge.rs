use lopdf::{dictionary, Document, Object, ObjectId};

use super::convert::ConvertedDocument;
use crate::error::CerfaError;

pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Concatenates the given PDFs into one document, keeping document order and
/// page order within each document.
pub fn merge_documents(documents: &[ConvertedDocument]) -> Result<MergedDocument, CerfaError> {
    if documents.is_empty() {
        return Err(CerfaError::MergeFailure("no pages to merge".into()));
    }

    let mut merged = Document::with_version("1.7");
    let mut max_id = 1;
    let mut kids: Vec<ObjectId> = Vec::new();

    for source in documents {
        let mut doc = Document::load_mem(&source.bytes)
            .map_err(|e| CerfaError::MergeFailure(format!("{}: {}", source.template, e)))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(CerfaError::MergeFailure(format!("{} has no pages", source.template)));
        }

        for page_id in &pages {
            let inherited = inherited_attributes(&doc, *page_id);
            if let Ok(Object::Dictionary(page)) = doc.get_object_mut(*page_id) {
                for (key, value) in inherited {
                    if !page.has(&key) {
                        page.set(key, value);
                    }
                }
            }
        }

        for (id, object) in doc.objects {
            if is_type(&object, b"Catalog") || is_type(&object, b"Pages") {
                continue;
            }
            merged.objects.insert(id, object);
        }
        kids.extend(pages);
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();
    let catalog_id = merged.new_object_id();

    for kid in &kids {
        match merged.objects.get_mut(kid) {
            Some(Object::Dictionary(page)) => page.set("Parent", pages_id),
            _ => return Err(CerfaError::MergeFailure(format!("page object {:?} is missing", kid))),
        }
    }

    let page_count = kids.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => page_count as i64,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);

    merged.compress();
    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|e| CerfaError::MergeFailure(e.to_string()))?;

    Ok(MergedDocument { bytes, page_count })
}

fn is_type(object: &Object, name: &[u8]) -> bool {
    object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(|t| t.as_name())
        .map(|t| t == name)
        .unwrap_or(false)
}

/// Walks the `Parent` chain and collects the nearest value of each inheritable key.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let mut found: Vec<(Vec<u8>, Object)> = Vec::new();
    let mut current = doc.get_object(page_id).and_then(|o| o.as_dict()).ok();
    let mut depth = 0;

    while let Some(node) = current {
        for key in INHERITABLE {
            if found.iter().any(|(k, _)| k.as_slice() == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                found.push((key.to_vec(), value.clone()));
            }
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        current = node
            .get(b"Parent")
            .and_then(|p| p.as_reference())
            .and_then(|id| doc.get_object(id))
            .and_then(|o| o.as_dict())
            .ok();
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::Stream;

    /// A PDF whose pages each draw their label, with MediaBox set on the
    /// `Pages` node only so it must be inherited.
    fn pdf(labels: &[&str]) -> ConvertedDocument {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for label in labels {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tj", vec![Object::string_literal(*label)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        ConvertedDocument { template: labels.join("+"), bytes }
    }

    fn page_labels(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let content = doc.get_page_content(id).unwrap();
                let ops = Content::decode(&content).unwrap().operations;
                let tj = ops.iter().find(|op| op.operator == "Tj").unwrap();
                String::from_utf8(tj.operands[0].as_str().unwrap().to_vec()).unwrap()
            })
            .collect()
    }

    #[test]
    fn pages_keep_document_order() {
        let merged = merge_documents(&[pdf(&["a1", "a2"]), pdf(&["b1"])]).unwrap();
        assert_eq!(merged.page_count, 3);
        assert_eq!(page_labels(&merged.bytes), ["a1", "a2", "b1"]);
    }

    #[test]
    fn inherited_media_box_survives_the_merge() {
        let merged = merge_documents(&[pdf(&["a1"]), pdf(&["b1"])]).unwrap();
        let doc = Document::load_mem(&merged.bytes).unwrap();
        for id in doc.get_pages().into_values() {
            let page = doc.get_object(id).unwrap().as_dict().unwrap();
            assert!(page.get(b"MediaBox").is_ok());
        }
    }

    #[test]
    fn corrupt_input_is_a_merge_failure() {
        let bad = ConvertedDocument { template: "individuals/page2".into(), bytes: b"not a pdf".to_vec() };
        let err = merge_documents(&[pdf(&["a1"]), bad]).err().expect("corrupt input");
        match err {
            CerfaError::MergeFailure(reason) => assert!(reason.contains("individuals/page2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn nothing_to_merge_is_rejected() {
        assert!(matches!(merge_documents(&[]), Err(CerfaError::MergeFailure(_))));
    }
}
