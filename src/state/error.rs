use thiserror::Error;

use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] ApiError),

    #[error("Failed to initialize File Search provider: {0}")]
    Provider(#[source] ApiError),
}
