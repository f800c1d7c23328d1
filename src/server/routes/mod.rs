//! API routes

pub mod ai;
pub mod analysis;
pub mod fix;
pub mod pdfs;

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Unwrap a JSON body, reporting malformed input in the API error shape.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// A required, non-blank string field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("'{field}' is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_required_field_is_rejected() {
        assert!(matches!(
            required(Some("  ".into()), "pdfId"),
            Err(ApiError::BadRequest(m)) if m.contains("pdfId")
        ));
        assert!(required(None, "pdfId").is_err());
        assert_eq!(required(Some("p1".into()), "pdfId").unwrap(), "p1");
    }
}
