//! Analysis lifecycle routes

use super::{body, required};
use crate::analysis::{StartResult, StatusResult};
use crate::error::ApiError;
use crate::server::auth::AuthUser;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRequest {
    pub pdf_id: Option<String>,
}

pub async fn start_analysis(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<Json<StartResult>, ApiError> {
    let pdf_id = required(body(payload)?.pdf_id, "pdfId")?;
    Ok(Json(state.analysis.start(&user.owner_id, &pdf_id).await?))
}

pub async fn analysis_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<PdfRequest>,
) -> Result<Json<StatusResult>, ApiError> {
    let pdf_id = required(query.pdf_id, "pdfId")?;
    Ok(Json(state.analysis.status(&user.owner_id, &pdf_id).await?))
}

pub async fn force_refresh(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<Json<StatusResult>, ApiError> {
    let pdf_id = required(body(payload)?.pdf_id, "pdfId")?;
    Ok(Json(
        state.analysis.force_refresh(&user.owner_id, &pdf_id).await?,
    ))
}
