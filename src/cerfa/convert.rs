use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use svg2pdf::usvg::{self, fontdb};
use svg2pdf::{ConversionOptions, PageOptions};

use super::render::RenderedPage;
use crate::error::CerfaError;

/// Family name of the faces compiled into the binary.
pub const BUNDLED_FAMILY: &str = "DejaVu Sans";

const BUNDLED_FACES: [&[u8]; 2] = [
    include_bytes!("../../fonts/DejaVuSans.ttf"),
    include_bytes!("../../fonts/DejaVuSans-Bold.ttf"),
];

/// One rendered page turned into a standalone PDF.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub template: String,
    pub bytes: Vec<u8>,
}

/// SVG to PDF conversion with a font database shared across requests.
pub struct SvgConverter {
    fontdb: Arc<fontdb::Database>,
}

impl SvgConverter {
    /// Builds the font database from the bundled faces, then optional system
    /// and directory fonts. Fails when the generic `sans-serif` family used by
    /// the templates does not resolve to a loaded face.
    pub fn new(load_system_fonts: bool, font_dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut db = fontdb::Database::new();
        for face in BUNDLED_FACES {
            db.load_font_data(face.to_vec());
        }
        if load_system_fonts {
            db.load_system_fonts();
        }
        if let Some(dir) = font_dir {
            db.load_fonts_dir(dir);
        }
        Self::with_database(db)
    }

    fn with_database(mut db: fontdb::Database) -> anyhow::Result<Self> {
        db.set_sans_serif_family(BUNDLED_FAMILY);
        let query = fontdb::Query { families: &[fontdb::Family::SansSerif], ..Default::default() };
        if db.query(&query).is_none() {
            bail!("no font face resolves the sans-serif family ({})", BUNDLED_FAMILY);
        }
        tracing::info!("Font database ready with {} faces, sans-serif is {}", db.len(), BUNDLED_FAMILY);
        Ok(Self { fontdb: Arc::new(db) })
    }

    /// Converter with the bundled faces only.
    pub fn bundled() -> anyhow::Result<Self> {
        Self::new(false, None)
    }

    pub fn convert(&self, page: &RenderedPage) -> Result<ConvertedDocument, CerfaError> {
        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);

        let tree = usvg::Tree::from_str(&page.markup, &options)
            .map_err(|e| CerfaError::render(page.template.as_str(), e))?;
        let bytes = svg2pdf::to_pdf(&tree, ConversionOptions::default(), PageOptions::default())
            .map_err(|e| CerfaError::render(page.template.as_str(), e))?;

        Ok(ConvertedDocument { template: page.template.clone(), bytes })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::Object;

    fn page(markup: &str) -> RenderedPage {
        RenderedPage { template: "companies/page1".into(), markup: markup.into() }
    }

    /// Number of font dictionaries in a PDF.
    pub(crate) fn font_count(bytes: &[u8]) -> usize {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .filter(|object| {
                let dict = match object {
                    Object::Dictionary(dict) => dict,
                    Object::Stream(stream) => &stream.dict,
                    _ => return false,
                };
                dict.get(b"Type").and_then(Object::as_name).map_or(false, |name| name == b"Font")
            })
            .count()
    }

    #[test]
    fn svg_becomes_a_single_page_pdf() {
        let converter = SvgConverter::bundled().unwrap();
        let doc = converter
            .convert(&page(r##"<svg xmlns="http://www.w3.org/2000/svg" width="210mm" height="297mm" viewBox="0 0 210 297"><rect x="10" y="10" width="50" height="20" fill="#000000"/></svg>"##))
            .unwrap();

        assert!(doc.bytes.starts_with(b"%PDF"));
        let parsed = lopdf::Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn text_is_drawn_with_the_bundled_face() {
        let converter = SvgConverter::bundled().unwrap();
        let doc = converter
            .convert(&page(r#"<svg xmlns="http://www.w3.org/2000/svg" width="210mm" height="297mm" viewBox="0 0 210 297" font-family="Helvetica, Arial, sans-serif"><text x="20" y="40" font-size="5">Montant 150,00 euros</text><text x="20" y="60" font-size="5" font-weight="bold">Reçu fiscal</text></svg>"#))
            .unwrap();

        assert!(font_count(&doc.bytes) > 0);
    }

    #[test]
    fn missing_sans_serif_face_fails_at_startup() {
        let err = SvgConverter::with_database(fontdb::Database::new()).err().expect("empty database rejected");
        assert!(err.to_string().contains("sans-serif"));
    }

    #[test]
    fn malformed_markup_names_the_failing_template() {
        let converter = SvgConverter::bundled().unwrap();
        let err = converter.convert(&page("<svg xmlns=\"http://www.w3.org/2000/svg\"><rect")).unwrap_err();
        match err {
            CerfaError::RenderFailure { template, .. } => assert_eq!(template, "companies/page1"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
