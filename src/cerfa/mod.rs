//! CERFA receipt generation: SVG templates are filled per donation record,
//! each page is converted to PDF on its own, and the pages are merged into a
//! single downloadable document.
//!
//! Rendering is synchronous and CPU bound. Callers on the async runtime run
//! [`ReceiptPipeline::generate`] through `spawn_blocking`.

pub mod convert;
pub mod issuer;
pub mod merge;
pub mod render;
pub mod words;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::models::DonationRecord;
use crate::error::CerfaError;
use convert::SvgConverter;
use issuer::Issuer;
use render::ReceiptTemplates;

pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

#[derive(Clone)]
pub struct ReceiptPipeline {
    templates: Arc<ReceiptTemplates>,
    converter: Arc<SvgConverter>,
}

impl ReceiptPipeline {
    pub fn new(templates: ReceiptTemplates, converter: SvgConverter) -> Self {
        Self { templates: Arc::new(templates), converter: Arc::new(converter) }
    }

    pub fn generate(
        &self,
        record: &DonationRecord,
        issuer: &Issuer,
        issued_on: NaiveDate,
    ) -> Result<RenderedDocument, CerfaError> {
        let order_number = record.order_number();

        let pages = self.templates.render(record, issuer, issued_on)?;
        let converted = pages
            .iter()
            .map(|page| {
                let doc = self.converter.convert(page)?;
                tracing::debug!("Converted {} ({} bytes) for {}", doc.template, doc.bytes.len(), order_number);
                Ok(doc)
            })
            .collect::<Result<Vec<_>, CerfaError>>()?;

        let merged = merge::merge_documents(&converted)?;
        tracing::debug!("Merged {} pages for {}", merged.page_count, order_number);

        let filename = receipt_filename(record);
        tracing::info!(
            "Issued receipt {} ({} pages, {} bytes)",
            order_number,
            merged.page_count,
            merged.bytes.len()
        );

        Ok(RenderedDocument { filename, bytes: merged.bytes, page_count: merged.page_count })
    }
}

pub fn receipt_filename(record: &DonationRecord) -> String {
    let stem: String = format!("recu_fiscal_don-{}", record.order_number())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    format!("{}.pdf", stem)
}
