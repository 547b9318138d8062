use std::sync::Arc;

use super::types::{
    normalize_store_name, AnswerResult, Document, OperationSummary, QueryRequest, Store,
    UploadFileRequest, UploadReceipt,
};
use crate::core::config::{AppSettings, UploadSettings};
use crate::core::errors::ApiError;
use crate::provider::types::{ChunkingConfig, GenerateRequest, Operation, UploadJob};
use crate::provider::IndexProvider;

/// Validates store/file/query requests and forwards them to the provider.
///
/// Stateless per call: it holds only immutable settings and a shared
/// provider handle, so one instance serves every session concurrently.
/// Local validation always runs before the provider is contacted.
#[derive(Clone)]
pub struct ProxyService {
    provider: Arc<dyn IndexProvider>,
    upload: UploadSettings,
    default_chunking: ChunkingConfig,
    model: String,
}

impl ProxyService {
    pub fn new(provider: Arc<dyn IndexProvider>, settings: &AppSettings) -> Self {
        Self {
            provider,
            upload: settings.upload.clone(),
            default_chunking: settings.chunking,
            model: settings.provider.model.clone(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.upload.max_upload_bytes
    }

    pub async fn create_store(&self, display_name: &str) -> Result<Store, ApiError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ApiError::validation("Store display name cannot be empty"));
        }

        tracing::info!("Creating store with name: {}", display_name);
        let store = self
            .provider
            .create_store(display_name)
            .await
            .inspect_err(|err| tracing::warn!("Error creating store: {}", err))?;
        let store = Store::from(store);
        tracing::info!("Store created successfully: {}", store.name);
        Ok(store)
    }

    pub async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        let stores: Vec<Store> = self
            .provider
            .list_stores()
            .await
            .inspect_err(|err| tracing::warn!("Error listing stores: {}", err))?
            .into_iter()
            .map(Store::from)
            .collect();
        tracing::debug!("Found {} stores", stores.len());
        Ok(stores)
    }

    pub async fn delete_store(&self, store_ref: &str, force: bool) -> Result<(), ApiError> {
        let store_name = normalize_store_name(store_ref)?;
        self.provider
            .delete_store(&store_name, force)
            .await
            .inspect_err(|err| tracing::warn!("Error deleting store {}: {}", store_name, err))?;
        tracing::info!("Store deleted: {}", store_name);
        Ok(())
    }

    pub async fn list_documents(&self, store_ref: &str) -> Result<Vec<Document>, ApiError> {
        let store_name = normalize_store_name(store_ref)?;
        let documents = self
            .provider
            .list_documents(&store_name)
            .await
            .inspect_err(|err| tracing::warn!("Error listing documents: {}", err))?;
        Ok(documents.into_iter().map(Document::from).collect())
    }

    pub async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadReceipt, ApiError> {
        let job = self.prepare_upload(request)?;
        let store_name = job.store_name.clone();
        let display_name = job.display_name.clone();

        tracing::info!(
            "Uploading {} ({} bytes) to {}",
            display_name,
            job.bytes.len(),
            store_name
        );
        let operation = self
            .provider
            .upload_file(job)
            .await
            .inspect_err(|err| tracing::warn!("Error uploading {}: {}", display_name, err))?;

        if !self.upload.wait_for_indexing {
            return Ok(UploadReceipt {
                message: "File submitted for indexing".to_string(),
                operation: OperationSummary {
                    name: operation.name,
                    done: operation.done,
                },
            });
        }

        let operation = self.wait_for_indexing(operation).await?;
        tracing::info!("Indexed {} into {}", display_name, store_name);
        Ok(UploadReceipt {
            message: "File uploaded and indexed successfully".to_string(),
            operation: OperationSummary {
                name: operation.name,
                done: operation.done,
            },
        })
    }

    pub async fn query(&self, request: QueryRequest) -> Result<AnswerResult, ApiError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ApiError::validation("Query text cannot be empty"));
        }
        let store_name = normalize_store_name(&request.store_name)?;

        tracing::info!("Querying store: {}", store_name);
        let answer = self
            .provider
            .generate(GenerateRequest {
                query: query.to_string(),
                store_name,
                model: self.model.clone(),
                metadata_filter: request.metadata_filter,
            })
            .await
            .inspect_err(|err| tracing::warn!("Query error: {}", err))?;

        tracing::debug!(
            "Grounding metadata extracted: {}",
            answer.grounding.is_some()
        );
        Ok(AnswerResult {
            response: answer.text,
            grounding_metadata: answer.grounding,
            model: self.model.clone(),
        })
    }

    fn prepare_upload(&self, request: UploadFileRequest) -> Result<UploadJob, ApiError> {
        let store_name = normalize_store_name(&request.store_name)?;

        if request.bytes.is_empty() {
            return Err(ApiError::validation("Uploaded file is empty"));
        }
        let size = request.bytes.len() as u64;
        if size > self.upload.max_upload_bytes {
            return Err(ApiError::SizeLimit(format!(
                "File is {} bytes; the maximum upload size is {} bytes",
                size, self.upload.max_upload_bytes
            )));
        }

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                request
                    .file_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
            })
            .ok_or_else(|| ApiError::validation("Display name cannot be empty"))?
            .to_string();

        let chunking = request.chunking.unwrap_or(self.default_chunking);
        chunking.validate()?;
        for entry in &request.metadata {
            entry.validate()?;
        }

        Ok(UploadJob {
            store_name,
            display_name,
            file_name: request.file_name,
            mime_type: request.mime_type,
            bytes: request.bytes,
            chunking,
            metadata: request.metadata,
        })
    }

    async fn wait_for_indexing(&self, mut operation: Operation) -> Result<Operation, ApiError> {
        let mut attempt = 0;
        while !operation.done && attempt < self.upload.max_poll_attempts {
            if operation.name.is_empty() {
                return Err(ApiError::Unknown(
                    "Provider returned an indexing operation without a name".to_string(),
                ));
            }
            tokio::time::sleep(self.upload.poll_interval()).await;
            operation = self.provider.get_operation(&operation.name).await?;
            attempt += 1;
        }

        if !operation.done {
            return Err(ApiError::Timeout(
                "Upload operation timed out before indexing finished".to_string(),
            ));
        }
        if let Some(error) = operation.error.take() {
            return Err(ApiError::Provider(format!("Indexing failed: {}", error)));
        }
        Ok(operation)
    }
}
