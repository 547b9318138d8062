use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.proxy.list_documents(&store_id).await?;
    Ok(Json(json!({"success": true, "documents": documents})))
}
