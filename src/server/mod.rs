//! HTTP surface: shared state, router and server loop.
//!
//! Every `/api` route authenticates through [`auth::AuthUser`] and hands the
//! caller's id to an orchestrator; handlers contain no business logic beyond
//! request validation.

pub mod auth;
pub mod routes;

use crate::ai::AiService;
use crate::alt_text::AltTextOrchestrator;
use crate::analysis::AnalysisOrchestrator;
use crate::checker::AccessibilityChecker;
use crate::config::ServiceConfig;
use crate::fix::FixOrchestrator;
use crate::remediate::PdfRemediator;
use crate::storage::ObjectStore;
use crate::store::RecordStore;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ai: Arc<dyn AiService>,
    pub analysis: AnalysisOrchestrator,
    pub fixer: FixOrchestrator,
    pub alt_text: AltTextOrchestrator,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the orchestrators over the given collaborators.
    pub fn new(
        config: Arc<ServiceConfig>,
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        checker: Arc<dyn AccessibilityChecker>,
        remediator: Arc<dyn PdfRemediator>,
        ai: Arc<dyn AiService>,
    ) -> Self {
        Self {
            analysis: AnalysisOrchestrator::new(
                Arc::clone(&records),
                Arc::clone(&objects),
                checker,
            ),
            fixer: FixOrchestrator::new(
                Arc::clone(&records),
                Arc::clone(&objects),
                Arc::clone(&remediator),
                config.document.clone(),
            ),
            alt_text: AltTextOrchestrator::new(
                Arc::clone(&records),
                Arc::clone(&objects),
                remediator,
                Arc::clone(&ai),
                Arc::clone(&config),
            ),
            records,
            objects,
            ai,
            jwt_secret: config.jwt_secret.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        // Health check
        .route("/health", get(routes::health_check))

        // Records
        .route("/api/pdfs", post(routes::pdfs::upload_pdf))
        .route("/api/pdfs/:id", get(routes::pdfs::get_pdf))

        // Analysis
        .route("/api/analysis/start", post(routes::analysis::start_analysis))
        .route("/api/analysis/status", get(routes::analysis::analysis_status))
        .route("/api/analysis/force-refresh", post(routes::analysis::force_refresh))

        // Fixes
        .route("/api/fix/issue", post(routes::fix::fix_issue))
        .route("/api/fix/all", post(routes::fix::fix_all))

        // AI
        .route("/api/ai/transcribe", post(routes::ai::transcribe))
        .route("/api/ai/generate-alt-text", post(routes::ai::generate_alt_text))

        // Body size: one explicit cap instead of axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))

        // CORS
        .layer(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any))

        // Tracing
        .layer(TraceLayer::new_for_http())

        // State
        .with_state(state)
}

/// Bind `bind_addr` and serve until the process exits.
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
