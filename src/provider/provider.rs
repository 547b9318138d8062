use async_trait::async_trait;

use super::types::{
    Answer, GenerateRequest, Operation, ProviderDocument, ProviderStore, UploadJob,
};
use crate::core::errors::ApiError;

/// Remote document-indexing and retrieval service.
///
/// Implementations map every transport or remote failure into an
/// [`ApiError`] kind; callers never see raw HTTP errors.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// return the provider name (e.g. "gemini")
    fn name(&self) -> &str;

    async fn create_store(&self, display_name: &str) -> Result<ProviderStore, ApiError>;

    /// all stores, in provider order
    async fn list_stores(&self) -> Result<Vec<ProviderStore>, ApiError>;

    /// `store_name` is the full resource name (`fileSearchStores/...`)
    async fn delete_store(&self, store_name: &str, force: bool) -> Result<(), ApiError>;

    async fn list_documents(&self, store_name: &str) -> Result<Vec<ProviderDocument>, ApiError>;

    /// submit a file for indexing; returns the long-running operation
    async fn upload_file(&self, job: UploadJob) -> Result<Operation, ApiError>;

    async fn get_operation(&self, operation_name: &str) -> Result<Operation, ApiError>;

    async fn generate(&self, request: GenerateRequest) -> Result<Answer, ApiError>;
}
