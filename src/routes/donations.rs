//! Handlers shared by the company and individual donation endpoints. The
//! per-kind modules only pick the form type and the `DonorKind`.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{DonationRecord, DonorForm, DonorKind};
use crate::AppState;

#[derive(Deserialize)]
pub struct ValidDateRequest {
    pub uuids: Vec<Uuid>,
}

pub async fn list(state: &AppState, kind: DonorKind) -> Response {
    match crate::db::list_donations(&state.db, kind).await {
        Ok(donations) => AxumJson(serde_json::json!({ "donations": donations })).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn get(state: &AppState, kind: DonorKind, uuid: Uuid) -> Response {
    match crate::db::get_donation(&state.db, kind, uuid).await {
        Ok(Some(record)) => AxumJson(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Validates the form and its references. `Err` carries the 400 message.
async fn check_form(state: &AppState, form: &mut DonorForm) -> Result<(), Response> {
    form.validate().map_err(|msg| (StatusCode::BAD_REQUEST, msg).into_response())?;

    let structure_id = form.record().declarative_structure_id;
    match crate::db::get_declarative_structure(&state.db, structure_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err((StatusCode::BAD_REQUEST, format!("Unknown declarative structure {}", structure_id)).into_response())
        }
        Err(e) => {
            tracing::error!("Declarative structure lookup failed: {}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response());
        }
    }

    if let DonorForm::Company(company) = form {
        if let Some(code) = company.identity.legal_form.as_deref() {
            match crate::db::legal_form_exists(&state.db, code).await {
                Ok(true) => {}
                Ok(false) => return Err((StatusCode::BAD_REQUEST, format!("Unknown legal form {}", code)).into_response()),
                Err(e) => {
                    tracing::error!("Legal form lookup failed: {}", e);
                    return Err((StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response());
                }
            }
        }
    }
    Ok(())
}

pub async fn create(state: &AppState, mut form: DonorForm) -> Response {
    if let Err(resp) = check_form(state, &mut form).await {
        return resp;
    }

    match crate::db::create_donation(&state.db, &form, chrono::Utc::now()).await {
        Ok(record) => {
            tracing::info!("Registered {} donation {}", record.kind().as_str(), record.order_number());
            (StatusCode::CREATED, AxumJson(record)).into_response()
        }
        Err(e) => {
            tracing::error!("Create donation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update(state: &AppState, uuid: Uuid, mut form: DonorForm) -> Response {
    if let Err(resp) = check_form(state, &mut form).await {
        return resp;
    }

    match crate::db::update_donation(&state.db, uuid, &form).await {
        Ok(Some(record)) => AxumJson(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => {
            tracing::error!("Update donation error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_valid_date(state: &AppState, kind: DonorKind, req: ValidDateRequest) -> Response {
    if req.uuids.is_empty() {
        return (StatusCode::BAD_REQUEST, "uuids must not be empty").into_response();
    }

    let today = chrono::Utc::now().date_naive();
    match crate::db::mark_validated(&state.db, kind, &req.uuids, today).await {
        Ok(updated) => AxumJson(serde_json::json!({ "updated": updated, "valid_date": today })).into_response(),
        Err(e) => {
            tracing::error!("Validation update error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

const EXPORT_HEADER: [&str; 15] = [
    "order_number",
    "uuid",
    "donor",
    "email",
    "street",
    "postal_code",
    "municipality",
    "cash_donation",
    "cash_payment_type",
    "inkind_donation",
    "inkind_donation_description",
    "total_donation",
    "date_start",
    "end_date",
    "valid_date",
];

fn export_row(record: &DonationRecord) -> [String; 15] {
    let meta = record.meta();
    let address = record.address();
    let donation = record.donation();
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
    [
        record.order_number(),
        meta.uuid.to_string(),
        record.donor_name(),
        record.email().unwrap_or_default().to_string(),
        address.street_line(),
        address.postal_code.clone(),
        address.municipality.clone(),
        donation.cash_donation.map(|d| d.to_string()).unwrap_or_default(),
        donation.cash_payment_type.map(|p| p.as_str().to_string()).unwrap_or_default(),
        donation.inkind_donation.map(|d| d.to_string()).unwrap_or_default(),
        donation.inkind_donation_description.clone(),
        record.total_donation().to_string(),
        date(Some(meta.date_start)),
        date(meta.end_date),
        date(meta.valid_date),
    ]
}

fn write_csv(records: &[DonationRecord]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;
    for record in records {
        writer.write_record(export_row(record))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV export: {}", e))
}

pub async fn export_csv(state: &AppState, kind: DonorKind) -> Response {
    let records = match crate::db::list_donations(&state.db, kind).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let bytes = match write_csv(&records) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("CSV export error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Export Error").into_response();
        }
    };

    let disposition = match kind {
        DonorKind::Company => "attachment; filename=companies.csv",
        DonorKind::Individual => "attachment; filename=individuals.csv",
    };
    let mut resp = Response::new(Body::from(bytes));
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(disposition));
    resp
}
