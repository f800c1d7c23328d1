//! Upload and read records

use crate::error::ApiError;
use crate::model::PdfRecord;
use crate::server::auth::AuthUser;
use crate::server::AppState;
use crate::storage::object_key;
use crate::store::load_owned;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::info;

const PDF_MAGIC: &[u8] = b"%PDF-";

pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PdfRecord>), ApiError> {
    let mut file_data = Vec::new();
    let mut file_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().unwrap_or("document.pdf").to_string();
            file_data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("reading upload: {e}")))?
                .to_vec();
        }
    }

    if file_data.is_empty() {
        return Err(ApiError::BadRequest("a non-empty 'file' part is required".into()));
    }
    if !file_data.starts_with(PDF_MAGIC) {
        return Err(ApiError::BadRequest("uploaded file is not a PDF".into()));
    }

    let mut record = PdfRecord::new(&user.owner_id, &file_name, String::new());
    record.file_url = object_key(&user.owner_id, &record.id, &file_name);
    state.objects.put(&record.file_url, &file_data).await?;
    state.records.insert(&record).await?;

    info!(
        "Stored upload {} for {} ({} bytes)",
        record.id,
        user.owner_id,
        file_data.len()
    );
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_pdf(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PdfRecord>, ApiError> {
    let record = load_owned(state.records.as_ref(), &id, &user.owner_id).await?;
    Ok(Json(record))
}
