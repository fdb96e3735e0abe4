use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

/// Failures of the receipt pipeline. Each variant aborts the request before
/// any document bytes are written.
#[derive(Error, Debug)]
pub enum CerfaError {
    #[error("donation record {0} not found")]
    NotFound(Uuid),

    #[error("no beneficiary organization is configured; register the issuing organization before generating receipts")]
    MissingIssuerConfiguration,

    #[error("failed to render template {template}: {reason}")]
    RenderFailure { template: String, reason: String },

    #[error("failed to merge receipt pages: {0}")]
    MergeFailure(String),

    #[error("failed to read signature image: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl CerfaError {
    pub fn render(template: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CerfaError::RenderFailure { template: template.into(), reason: reason.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CerfaError::NotFound(_) => StatusCode::NOT_FOUND,
            CerfaError::MissingIssuerConfiguration => StatusCode::SERVICE_UNAVAILABLE,
            CerfaError::RenderFailure { .. }
            | CerfaError::MergeFailure(_)
            | CerfaError::Storage(_)
            | CerfaError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CerfaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Receipt generation failed: {}", self);
        }
        let message = match &self {
            CerfaError::Database(_) => "Database Error".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_failure_kind() {
        assert_eq!(CerfaError::NotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
        assert_eq!(CerfaError::MissingIssuerConfiguration.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(CerfaError::render("page2", "bad xml").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(CerfaError::MergeFailure("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn render_failure_names_the_template() {
        let err = CerfaError::render("individuals/page2", "unexpected end of stream");
        assert_eq!(err.to_string(), "failed to render template individuals/page2: unexpected end of stream");
    }
}
