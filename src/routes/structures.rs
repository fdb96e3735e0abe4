use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;

use super::is_constraint_violation;
use crate::db::models::check_printable;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateStructureRequest {
    pub label: String,
}

#[derive(Deserialize)]
pub struct CreateLegalFormRequest {
    pub code: String,
    pub label: String,
}

pub async fn list_structures(State(state): State<AppState>) -> Response {
    match crate::db::list_declarative_structures(&state.db).await {
        Ok(structures) => AxumJson(serde_json::json!({ "structures": structures })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_structure(State(state): State<AppState>, Json(req): Json<CreateStructureRequest>) -> Response {
    if req.label.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "label is required").into_response();
    }

    match crate::db::create_declarative_structure(&state.db, &req.label).await {
        Ok(structure) => (StatusCode::CREATED, AxumJson(structure)).into_response(),
        Err(e) if is_constraint_violation(&e) => {
            (StatusCode::CONFLICT, "Declarative structure already exists").into_response()
        }
        Err(e) => {
            tracing::error!("Create structure error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_legal_forms(State(state): State<AppState>) -> Response {
    match crate::db::list_legal_forms(&state.db).await {
        Ok(forms) => AxumJson(serde_json::json!({ "legal_forms": forms })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_legal_form(State(state): State<AppState>, Json(req): Json<CreateLegalFormRequest>) -> Response {
    if req.code.trim().is_empty() || req.label.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "code and label are required").into_response();
    }
    if let Err(msg) = check_printable("code", &req.code).and_then(|_| check_printable("label", &req.label)) {
        return (StatusCode::BAD_REQUEST, msg).into_response();
    }

    match crate::db::create_legal_form(&state.db, &req.code, &req.label).await {
        Ok(form) => (StatusCode::CREATED, AxumJson(form)).into_response(),
        Err(e) if is_constraint_violation(&e) => (StatusCode::CONFLICT, "Legal form already exists").into_response(),
        Err(e) => {
            tracing::error!("Create legal form error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
