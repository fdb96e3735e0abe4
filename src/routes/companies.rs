use axum::{
    extract::{Json, Path, State},
    response::Response,
};
use uuid::Uuid;

use super::donations::{self, ValidDateRequest};
use crate::db::models::{CompanyForm, DonorForm, DonorKind};
use crate::AppState;

pub async fn list_companies(State(state): State<AppState>) -> Response {
    donations::list(&state, DonorKind::Company).await
}

pub async fn get_company(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Response {
    donations::get(&state, DonorKind::Company, uuid).await
}

pub async fn create_company(State(state): State<AppState>, Json(form): Json<CompanyForm>) -> Response {
    donations::create(&state, DonorForm::Company(form)).await
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(form): Json<CompanyForm>,
) -> Response {
    donations::update(&state, uuid, DonorForm::Company(form)).await
}

pub async fn update_valid_date(State(state): State<AppState>, Json(req): Json<ValidDateRequest>) -> Response {
    donations::update_valid_date(&state, DonorKind::Company, req).await
}

pub async fn export_companies(State(state): State<AppState>) -> Response {
    donations::export_csv(&state, DonorKind::Company).await
}

pub async fn company_receipt(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Response {
    super::cerfa::receipt(&state, DonorKind::Company, uuid).await
}
