use serde::{Deserialize, Serialize};

use crate::provider::types::GroundingMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A source passage attached to an assistant answer, in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub excerpt: Option<String>,
}

impl Citation {
    pub fn from_grounding(metadata: Option<&GroundingMetadata>) -> Vec<Citation> {
        metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .map(|chunk| Citation {
                        title: chunk.title().map(str::to_string),
                        uri: chunk.uri().map(str::to_string),
                        excerpt: chunk.excerpt().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Placeholder shown while an answer is outstanding.
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub failed: bool,
    pub created_at: String,
}

impl ChatMessage {
    fn new(role: Role, text: String, pending: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text,
            citations: Vec::new(),
            pending,
            failed: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), false)
    }

    pub fn pending_assistant() -> Self {
        Self::new(Role::Assistant, String::new(), true)
    }
}

/// `Idle -> Sent -> AwaitingResponse -> {Rendered | Failed} -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    Idle,
    Sent,
    AwaitingResponse,
    Rendered,
    Failed,
}

impl QueryPhase {
    pub fn in_flight(self) -> bool {
        matches!(self, QueryPhase::Sent | QueryPhase::AwaitingResponse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum UploadPhase {
    Idle,
    /// Indeterminate: the request is being built.
    Preparing,
    Submitting { percent: u8 },
}

impl UploadPhase {
    pub fn in_flight(self) -> bool {
        !matches!(self, UploadPhase::Idle)
    }
}

/// A file picked for upload but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-visible status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
