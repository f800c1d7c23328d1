//! Error types for the edgequake-pdf-a11y service.
//!
//! Errors are split by who can observe them:
//!
//! * [`ApiError`]: what a request handler returns. Each variant maps to one
//!   HTTP status and is the only error type that crosses the HTTP boundary.
//!
//! * [`ServiceError`], [`StorageError`], [`StoreError`], [`RemediationError`]
//!   are collaborator failures. The orchestrators decide per flow whether one of
//!   these becomes an [`ApiError`] or is absorbed into a degraded outcome
//!   (fix flows never fail once the target issue exists).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Request-level failure returned by every route handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No bearer token, or the token failed verification.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Record or issue absent, or the caller does not own the record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required field is missing or malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested transition is not allowed from the record's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The checker or AI provider failed or returned a malformed payload.
    #[error("Upstream service error: {0}")]
    Upstream(#[from] ServiceError),

    /// Storage or database failure. The detail is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(ServiceError::QuotaExceeded { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Upstream(ServiceError::BadInput { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            ApiError::Upstream(e) => {
                tracing::warn!("Upstream failure: {}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidKey(key) => ApiError::BadRequest(format!("invalid file key '{key}'")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Failure talking to the accessibility checker or the AI provider.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    // ── Checker ───────────────────────────────────────────────────────────
    /// The HTTP call failed or returned a non-success status.
    #[error("{service} unavailable: {detail}")]
    ServiceUnavailable { service: String, detail: String },

    /// A success response whose body does not have the expected shape.
    #[error("{service} returned an invalid response: {detail}")]
    InvalidResponse { service: String, detail: String },

    // ── AI provider ───────────────────────────────────────────────────────
    /// Provider signalled a rate limit or exhausted quota (HTTP 429).
    #[error("Quota exceeded for provider '{provider}'")]
    QuotaExceeded { provider: String },

    /// Provider rejected the credentials (HTTP 401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Provider rejected the input (unsupported audio or image).
    #[error("Input rejected by provider '{provider}': {detail}")]
    BadInput { provider: String, detail: String },

    /// Transcription failed for any other reason.
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Vision completion failed (used per image; never aborts a batch).
    #[error("Alt-text generation failed: {0}")]
    AltTextFailed(String),
}

/// Object-storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object '{0}' not found")]
    NotFound(String),

    /// Keys must be relative and must not escape the storage root.
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Storage I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Record-store (metadata database) failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record '{0}' already exists")]
    AlreadyExists(String),

    #[error("Record '{0}' does not exist")]
    Missing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Stored report for '{id}' is not valid JSON: {detail}")]
    CorruptReport { id: String, detail: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// PDF mutation failure. Always absorbed into a metadata-only fix outcome.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("PDF could not be parsed: {0}")]
    Parse(String),

    #[error("PDF structure is missing '{0}'")]
    MissingStructure(&'static str),

    #[error("PDF could not be serialised: {0}")]
    Serialise(String),

    #[error("Remediation task panicked: {0}")]
    Panicked(String),
}

impl From<lopdf::Error> for RemediationError {
    fn from(e: lopdf::Error) -> Self {
        RemediationError::Parse(e.to_string())
    }
}

/// Invalid service configuration, reported by [`crate::config::ServiceConfigBuilder::build`].
#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);
