use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::cerfa::issuer::Issuer;
use crate::cerfa::RenderedDocument;
use crate::db::models::DonorKind;
use crate::error::CerfaError;
use crate::AppState;

pub async fn receipt(state: &AppState, kind: DonorKind, uuid: Uuid) -> Response {
    match generate(state, kind, uuid).await {
        Ok(document) => pdf_response(document),
        Err(e) => e.into_response(),
    }
}

async fn generate(state: &AppState, kind: DonorKind, uuid: Uuid) -> Result<RenderedDocument, CerfaError> {
    let record = crate::db::get_donation(&state.db, kind, uuid)
        .await?
        .ok_or(CerfaError::NotFound(uuid))?;
    let issuer = Issuer::resolve(&state.db, &state.storage).await?;

    let pipeline = state.receipts.clone();
    let issued_on = chrono::Utc::now().date_naive();
    tokio::task::spawn_blocking(move || pipeline.generate(&record, &issuer, issued_on))
        .await
        .map_err(|e| CerfaError::render(format!("{}/receipt", kind.as_str()), e))?
}

fn pdf_response(document: RenderedDocument) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    let disposition = match HeaderValue::from_str(&disposition) {
        Ok(value) => value,
        Err(e) => return CerfaError::render(document.filename, e).into_response(),
    };

    let mut resp = Response::new(Body::from(document.bytes));
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    resp
}
