//! Pure mapping from session state to a toolkit-neutral display model.
//!
//! Everything coming from users or the provider is HTML-escaped here, so a
//! front end can drop the strings straight into markup.

use serde::Serialize;

use super::model::{ChatMessage, Citation, Notice, Role, UploadPhase};
use crate::proxy::Store;

pub const EXCERPT_PREVIEW_CHARS: usize = 150;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationView {
    pub title: String,
    pub uri: Option<String>,
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub html: String,
    pub pending: bool,
    pub failed: bool,
    /// Empty when the answer carried no grounding.
    pub citations: Vec<CitationView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub messages: Vec<MessageView>,
    pub stores: Vec<StoreOption>,
    pub send_enabled: bool,
    pub upload_enabled: bool,
    pub upload_status: Option<String>,
    pub notice: Option<Notice>,
}

/// Inputs for [`render_view`], borrowed from the controller.
pub struct ViewState<'a> {
    pub messages: &'a [ChatMessage],
    pub stores: &'a [Store],
    pub selected: Option<&'a str>,
    pub send_enabled: bool,
    pub upload_enabled: bool,
    pub upload_phase: UploadPhase,
    pub notice: Option<&'a Notice>,
}

pub fn render_view(state: ViewState<'_>) -> ChatView {
    ChatView {
        messages: state.messages.iter().map(render_message).collect(),
        stores: state
            .stores
            .iter()
            .map(|store| StoreOption {
                id: store.id.clone(),
                label: escape_html(&store.display_name),
                selected: state.selected == Some(store.id.as_str()),
            })
            .collect(),
        send_enabled: state.send_enabled,
        upload_enabled: state.upload_enabled,
        upload_status: upload_status(state.upload_phase),
        notice: state.notice.map(|notice| Notice {
            level: notice.level,
            text: escape_html(&notice.text),
        }),
    }
}

pub fn render_message(message: &ChatMessage) -> MessageView {
    let html = if message.pending {
        "Thinking...".to_string()
    } else {
        escape_html(&message.text).replace('\n', "<br>")
    };

    MessageView {
        id: message.id.clone(),
        role: message.role,
        html,
        pending: message.pending,
        failed: message.failed,
        citations: render_citations(&message.citations),
    }
}

pub fn render_citations(citations: &[Citation]) -> Vec<CitationView> {
    citations
        .iter()
        .enumerate()
        .map(|(index, citation)| {
            let title = citation
                .title
                .as_deref()
                .filter(|title| !title.trim().is_empty())
                .or(citation.uri.as_deref())
                .map(escape_html)
                .unwrap_or_else(|| format!("Source {}", index + 1));
            CitationView {
                title,
                uri: citation.uri.as_deref().map(escape_html),
                excerpt: citation
                    .excerpt
                    .as_deref()
                    .map(|text| escape_html(&truncate_excerpt(text))),
            }
        })
        .collect()
}

/// Caps an excerpt at [`EXCERPT_PREVIEW_CHARS`] characters plus `...`.
pub fn truncate_excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn upload_status(phase: UploadPhase) -> Option<String> {
    match phase {
        UploadPhase::Idle => None,
        UploadPhase::Preparing => Some("Preparing upload...".to_string()),
        UploadPhase::Submitting { percent } => Some(format!("Uploading... {}%", percent.min(100))),
    }
}
