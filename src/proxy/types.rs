use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::provider::types::{
    ChunkingConfig, GroundingMetadata, MetadataEntry, ProviderDocument, ProviderStore,
};

pub const STORE_NAME_PREFIX: &str = "fileSearchStores/";

/// A provider-managed document collection as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Provider resource name, e.g. `fileSearchStores/abc-123`.
    pub name: String,
    /// Last path segment of `name`.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub create_time: Option<String>,
}

impl From<ProviderStore> for Store {
    fn from(store: ProviderStore) -> Self {
        let id = resource_id(&store.name).to_string();
        Store {
            display_name: store.display_name.unwrap_or_else(|| id.clone()),
            id,
            name: store.name,
            create_time: store.create_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub id: String,
    pub display_name: Option<String>,
    pub state: Option<String>,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
    pub create_time: Option<String>,
}

impl From<ProviderDocument> for Document {
    fn from(document: ProviderDocument) -> Self {
        Document {
            id: resource_id(&document.name).to_string(),
            name: document.name,
            display_name: document.display_name,
            state: document.state,
            size_bytes: document.size_bytes,
            mime_type: document.mime_type,
            create_time: document.create_time,
        }
    }
}

/// One file submission. Lives only for the duration of the upload call.
#[derive(Debug, Clone, Default)]
pub struct UploadFileRequest {
    pub store_name: String,
    pub file_name: Option<String>,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub chunking: Option<ChunkingConfig>,
    pub metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub name: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub operation: OperationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub store_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub response: String,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    pub model: String,
}

/// Final path segment of a provider resource name.
pub fn resource_id(name: &str) -> &str {
    name.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Accepts either a bare store id or a full `fileSearchStores/...` name.
pub fn normalize_store_name(reference: &str) -> Result<String, ApiError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ApiError::validation("No store selected"));
    }
    if let Some(id) = reference.strip_prefix(STORE_NAME_PREFIX) {
        if id.is_empty() || id.contains('/') {
            return Err(ApiError::Validation(format!(
                "Invalid store reference '{}'",
                reference
            )));
        }
        return Ok(reference.to_string());
    }
    if reference.contains('/') {
        return Err(ApiError::Validation(format!(
            "Invalid store reference '{}'",
            reference
        )));
    }
    Ok(format!(
        "{}{}",
        STORE_NAME_PREFIX,
        urlencoding::encode(reference)
    ))
}
