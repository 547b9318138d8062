use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::server::handlers::utils::{json_body, query_params};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteStoreParams {
    pub force: Option<bool>,
}

pub async fn create_store(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateStoreRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let store = state.proxy.create_store(&payload.display_name).await?;
    Ok(Json(json!({"success": true, "store": store})))
}

pub async fn list_stores(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let stores = state.proxy.list_stores().await?;
    Ok(Json(json!({"success": true, "stores": stores})))
}

pub async fn delete_store(
    State(state): State<Arc<AppState>>,
    Path(store_id): Path<String>,
    params: Result<Query<DeleteStoreParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let params = query_params(params)?;
    state
        .proxy
        .delete_store(&store_id, params.force.unwrap_or(true))
        .await?;
    Ok(Json(
        json!({"success": true, "message": "Store deleted successfully"}),
    ))
}
