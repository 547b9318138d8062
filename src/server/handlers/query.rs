use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::proxy::QueryRequest;
use crate::server::handlers::utils::json_body;
use crate::state::AppState;

pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let answer = state.proxy.query(request).await?;
    Ok(Json(json!({
        "success": true,
        "response": answer.response,
        "grounding_metadata": answer.grounding_metadata,
        "model": answer.model,
    })))
}
