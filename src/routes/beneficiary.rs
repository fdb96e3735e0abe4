use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};
use uuid::Uuid;

use crate::db::models::BeneficiaryForm;
use crate::AppState;

pub async fn get_beneficiary(State(state): State<AppState>) -> Response {
    match crate::db::get_beneficiary_organization(&state.db).await {
        Ok(Some(org)) => AxumJson(org).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "No beneficiary organization configured").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn put_beneficiary(State(state): State<AppState>, Json(form): Json<BeneficiaryForm>) -> Response {
    if let Err(msg) = form.validate() {
        return (StatusCode::BAD_REQUEST, msg).into_response();
    }

    match crate::db::upsert_beneficiary_organization(&state.db, &form).await {
        Ok(org) => AxumJson(org).into_response(),
        Err(e) => {
            tracing::error!("Save beneficiary error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

fn signature_extension(headers: &HeaderMap) -> Option<&'static str> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media_type = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match media_type.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        _ => None,
    }
}

/// Stores the raw image body in object storage and points the beneficiary at it.
pub async fn put_signature(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(ext) = signature_extension(&headers) else {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Signature must be image/png or image/jpeg").into_response();
    };
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "Signature image is empty").into_response();
    }

    match crate::db::get_beneficiary_organization(&state.db).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "No beneficiary organization configured").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let path = format!("signatures/{}.{}", Uuid::new_v4(), ext);
    if let Err(e) = state.storage.write(&path, body.to_vec()).await {
        tracing::error!("Signature upload to {} failed: {}", path, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error").into_response();
    }

    match crate::db::set_beneficiary_signature(&state.db, &path).await {
        Ok(true) => {
            tracing::info!("Stored beneficiary signature at {}", path);
            (StatusCode::OK, AxumJson(serde_json::json!({ "signature": path }))).into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "No beneficiary organization configured").into_response(),
        Err(e) => {
            tracing::error!("Set signature error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
