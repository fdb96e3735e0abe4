pub mod cerfa;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;

use axum::{
    routing::{get, post, put},
    Router,
};
use opendal::Operator;
use tower_http::trace::TraceLayer;

use cerfa::ReceiptPipeline;
use db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub storage: Operator,
    pub receipts: ReceiptPipeline,
}

/// Application routes with request tracing. Rate limiting, CORS and security
/// headers are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/structures", get(routes::structures::list_structures).post(routes::structures::create_structure))
        .route("/legal-forms", get(routes::structures::list_legal_forms).post(routes::structures::create_legal_form))
        .route("/beneficiary", get(routes::beneficiary::get_beneficiary).put(routes::beneficiary::put_beneficiary))
        .route("/beneficiary/signature", put(routes::beneficiary::put_signature))
        // Companies (personnes morales)
        .route("/companies/list/", get(routes::companies::list_companies))
        .route("/companies/create/", post(routes::companies::create_company))
        .route("/companies/export", get(routes::companies::export_companies))
        .route("/companies/update-valid-date/", post(routes::companies::update_valid_date))
        .route("/companies/update/{uuid}/", put(routes::companies::update_company))
        .route("/companies/cerfa/pdf/{uuid}", get(routes::companies::company_receipt))
        .route("/companies/{uuid}", get(routes::companies::get_company))
        // Individuals (personnes physiques)
        .route("/individuals/list/", get(routes::individuals::list_individuals))
        .route("/individuals/create/", post(routes::individuals::create_individual))
        .route("/individuals/export", get(routes::individuals::export_individuals))
        .route("/individuals/update-valid-date/", post(routes::individuals::update_valid_date))
        .route("/individuals/update/{uuid}/", put(routes::individuals::update_individual))
        .route("/individuals/cerfa/pdf/{uuid}", get(routes::individuals::individual_receipt))
        .route("/individuals/{uuid}", get(routes::individuals::get_individual))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
