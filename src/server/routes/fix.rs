//! Fix routes

use super::{body, required};
use crate::error::ApiError;
use crate::fix::{FixAllResult, FixIssueResult};
use crate::server::auth::AuthUser;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixIssueRequest {
    pub pdf_id: Option<String>,
    pub issue_id: Option<u32>,
    /// Overrides the stored type as the mutation hint.
    pub issue_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixAllRequest {
    pub pdf_id: Option<String>,
}

pub async fn fix_issue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<FixIssueRequest>, JsonRejection>,
) -> Result<Json<FixIssueResult>, ApiError> {
    let req = body(payload)?;
    let pdf_id = required(req.pdf_id, "pdfId")?;
    let issue_id = req
        .issue_id
        .ok_or_else(|| ApiError::BadRequest("'issueId' is required".into()))?;

    let result = state
        .fixer
        .fix_issue(&user.owner_id, &pdf_id, issue_id, req.issue_type.as_deref())
        .await?;
    Ok(Json(result))
}

pub async fn fix_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<FixAllRequest>, JsonRejection>,
) -> Result<Json<FixAllResult>, ApiError> {
    let pdf_id = required(body(payload)?.pdf_id, "pdfId")?;
    Ok(Json(state.fixer.fix_all(&user.owner_id, &pdf_id).await?))
}
