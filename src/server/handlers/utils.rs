use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::core::errors::ApiError;

/// Unwraps a JSON body, turning axum's rejection into the uniform envelope.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        ))),
    }
}

/// Unwraps query-string parameters, same envelope treatment as [`json_body`].
pub fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    match params {
        Ok(Query(value)) => Ok(value),
        Err(rejection) => Err(ApiError::Validation(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        ))),
    }
}
