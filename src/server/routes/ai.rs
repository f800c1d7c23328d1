//! AI routes: voice-command transcription and alt-text generation

use super::{body, required};
use crate::alt_text::AltTextResult;
use crate::error::ApiError;
use crate::server::auth::AuthUser;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextRequest {
    pub pdf_id: Option<String>,
    pub image_ids: Option<Vec<String>>,
    #[serde(default)]
    pub auto_apply: bool,
}

pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut audio = Vec::new();
    let mut file_name = String::from("recording.webm");
    let mut mime_type = String::from("audio/webm");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            if let Some(ct) = field.content_type() {
                mime_type = ct.to_string();
            }
            audio = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("reading upload: {e}")))?
                .to_vec();
        }
    }

    if audio.is_empty() {
        return Err(ApiError::BadRequest("a non-empty 'file' part is required".into()));
    }

    let text = state
        .ai
        .transcribe_audio(audio, &file_name, &mime_type)
        .await?;
    Ok(Json(TranscriptionResponse { text }))
}

pub async fn generate_alt_text(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<AltTextRequest>, JsonRejection>,
) -> Result<Json<AltTextResult>, ApiError> {
    let req = body(payload)?;
    let pdf_id = required(req.pdf_id, "pdfId")?;
    let result = state
        .alt_text
        .generate(
            &user.owner_id,
            &pdf_id,
            req.image_ids.as_deref(),
            req.auto_apply,
        )
        .await?;
    Ok(Json(result))
}
