use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::provider::types::{ChunkingConfig, MetadataEntry};
use crate::proxy::UploadFileRequest;
use crate::state::AppState;

/// Multipart upload: `file`, `store_name`, `display_name`, and optionally
/// `metadata` (JSON list), `max_tokens_per_chunk`, `max_overlap_tokens`.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::Validation(format!("Expected a multipart upload: {}", rejection.body_text()))
    })?;
    let max_bytes = state.proxy.max_upload_bytes();

    let mut request = UploadFileRequest::default();
    let mut has_file = false;
    let mut max_tokens_per_chunk: Option<u32> = None;
    let mut max_overlap_tokens: Option<u32> = None;

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                request.file_name = field.file_name().map(str::to_string);
                request.mime_type = field.content_type().map(str::to_string);
                request.bytes = read_file_field(field, max_bytes).await?;
                has_file = true;
            }
            "store_name" => request.store_name = read_text(field).await?,
            "display_name" => request.display_name = Some(read_text(field).await?),
            "metadata" => request.metadata = parse_metadata(&read_text(field).await?)?,
            "max_tokens_per_chunk" => {
                max_tokens_per_chunk = parse_token_count(&name, &read_text(field).await?)?
            }
            "max_overlap_tokens" => {
                max_overlap_tokens = parse_token_count(&name, &read_text(field).await?)?
            }
            other => tracing::debug!("Ignoring unknown upload field '{}'", other),
        }
    }

    if !has_file {
        return Err(ApiError::validation("No file provided"));
    }

    if max_tokens_per_chunk.is_some() || max_overlap_tokens.is_some() {
        let defaults = state.settings.chunking;
        request.chunking = Some(ChunkingConfig {
            max_tokens_per_chunk: max_tokens_per_chunk.unwrap_or(defaults.max_tokens_per_chunk),
            max_overlap_tokens: max_overlap_tokens.unwrap_or(defaults.max_overlap_tokens),
        });
    }

    let receipt = state.proxy.upload_file(request).await?;
    Ok(Json(json!({
        "success": true,
        "message": receipt.message,
        "operation": receipt.operation,
    })))
}

async fn read_file_field(mut field: Field<'_>, max_bytes: u64) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(map_multipart_error)? {
        if (bytes.len() + chunk.len()) as u64 > max_bytes {
            return Err(size_limit_error(max_bytes));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(map_multipart_error)
}

fn parse_metadata(raw: &str) -> Result<Vec<MetadataEntry>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|err| ApiError::Validation(format!("Invalid metadata JSON: {}", err)))
}

fn parse_token_count(field: &str, raw: &str) -> Result<Option<u32>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>().map(Some).map_err(|_| {
        ApiError::Validation(format!("{} must be a positive integer", field))
    })
}

fn map_multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::SizeLimit(format!("Upload exceeds the request size limit: {}", err.body_text()));
    }
    ApiError::Validation(format!("Malformed upload: {}", err.body_text()))
}

fn size_limit_error(max_bytes: u64) -> ApiError {
    ApiError::SizeLimit(format!(
        "File exceeds the maximum upload size of {} bytes",
        max_bytes
    ))
}
