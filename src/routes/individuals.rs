use axum::{
    extract::{Json, Path, State},
    response::Response,
};
use uuid::Uuid;

use super::donations::{self, ValidDateRequest};
use crate::db::models::{DonorForm, DonorKind, IndividualForm};
use crate::AppState;

pub async fn list_individuals(State(state): State<AppState>) -> Response {
    donations::list(&state, DonorKind::Individual).await
}

pub async fn get_individual(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Response {
    donations::get(&state, DonorKind::Individual, uuid).await
}

pub async fn create_individual(State(state): State<AppState>, Json(form): Json<IndividualForm>) -> Response {
    donations::create(&state, DonorForm::Individual(form)).await
}

pub async fn update_individual(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(form): Json<IndividualForm>,
) -> Response {
    donations::update(&state, uuid, DonorForm::Individual(form)).await
}

pub async fn update_valid_date(State(state): State<AppState>, Json(req): Json<ValidDateRequest>) -> Response {
    donations::update_valid_date(&state, DonorKind::Individual, req).await
}

pub async fn export_individuals(State(state): State<AppState>) -> Response {
    donations::export_csv(&state, DonorKind::Individual).await
}

pub async fn individual_receipt(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> Response {
    super::cerfa::receipt(&state, DonorKind::Individual, uuid).await
}
