use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub const DEFAULT_MAX_TOKENS_PER_CHUNK: u32 = 800;
pub const DEFAULT_MAX_OVERLAP_TOKENS: u32 = 100;

/// White-space chunking parameters forwarded to the provider on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens_per_chunk: u32,
    pub max_overlap_tokens: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS_PER_CHUNK,
            max_overlap_tokens: DEFAULT_MAX_OVERLAP_TOKENS,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.max_tokens_per_chunk == 0 {
            return Err(ApiError::validation(
                "max_tokens_per_chunk must be a positive integer",
            ));
        }
        if self.max_overlap_tokens == 0 {
            return Err(ApiError::validation(
                "max_overlap_tokens must be a positive integer",
            ));
        }
        if self.max_overlap_tokens >= self.max_tokens_per_chunk {
            return Err(ApiError::Validation(format!(
                "max_overlap_tokens ({}) must be smaller than max_tokens_per_chunk ({})",
                self.max_overlap_tokens, self.max_tokens_per_chunk
            )));
        }
        Ok(())
    }
}

/// One custom metadata pair attached to an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
}

impl MetadataEntry {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            string_value: Some(value.into()),
            numeric_value: None,
        }
    }

    pub fn numeric(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            string_value: None,
            numeric_value: Some(value),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.key.trim().is_empty() {
            return Err(ApiError::validation("metadata key cannot be empty"));
        }
        match (&self.string_value, self.numeric_value) {
            (Some(_), None) => Ok(()),
            (None, Some(value)) if value.is_finite() => Ok(()),
            (None, Some(_)) => Err(ApiError::Validation(format!(
                "metadata '{}' has a non-finite numeric value",
                self.key
            ))),
            _ => Err(ApiError::Validation(format!(
                "metadata '{}' must carry exactly one of string_value or numeric_value",
                self.key
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStore {
    pub name: String,
    pub display_name: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDocument {
    pub name: String,
    pub display_name: Option<String>,
    pub state: Option<String>,
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
    pub create_time: Option<String>,
}

/// Everything the provider needs to ingest one file.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub store_name: String,
    pub display_name: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub chunking: ChunkingConfig,
    pub metadata: Vec<MetadataEntry>,
}

/// A provider long-running operation (indexing).
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub query: String,
    pub store_name: String,
    pub model: String,
    pub metadata_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_supports: Option<Vec<GroundingSupport>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<RetrievedContext>,
}

impl GroundingChunk {
    pub fn title(&self) -> Option<&str> {
        self.retrieved_context
            .as_ref()
            .and_then(|ctx| ctx.title.as_deref())
            .or_else(|| self.web.as_ref().and_then(|web| web.title.as_deref()))
    }

    pub fn uri(&self) -> Option<&str> {
        self.retrieved_context
            .as_ref()
            .and_then(|ctx| ctx.uri.as_deref())
            .or_else(|| self.web.as_ref().and_then(|web| web.uri.as_deref()))
    }

    pub fn excerpt(&self) -> Option<&str> {
        self.retrieved_context
            .as_ref()
            .and_then(|ctx| ctx.text.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingSupport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunk_indices: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_scores: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_index: Option<u64>,
    pub end_index: Option<u64>,
    pub text: Option<String>,
}
