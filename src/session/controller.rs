use std::sync::Arc;

use super::client::StoreApi;
use super::model::{ChatMessage, Citation, Notice, PickedFile, QueryPhase, UploadPhase};
use super::render::{render_view, ChatView, ViewState};
use super::sync::{StoreSynchronizer, SyncOutcome};
use crate::core::errors::ApiError;
use crate::provider::types::{ChunkingConfig, MetadataEntry};
use crate::proxy::{AnswerResult, QueryRequest, UploadFileRequest, UploadReceipt};

/// Issued by [`ChatController::begin_query`]; hand it back to `finish_query`.
#[derive(Debug, Clone)]
pub struct QueryTicket {
    pub request: QueryRequest,
    placeholder_id: String,
}

/// Issued by [`ChatController::begin_upload`]; hand it back to `finish_upload`.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub request: UploadFileRequest,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub display_name: Option<String>,
    pub chunking: Option<ChunkingConfig>,
    pub metadata: Vec<MetadataEntry>,
}

/// State of one chat session: store list and selection, transcript,
/// composer input, the picked file and the in-flight phases.
///
/// Nothing here is global. A server hosting several sessions keeps one
/// controller per connection. Query and upload each have a two-phase form
/// (`begin_*` / `finish_*`) so a driver holding the controller behind a
/// lock can release it while the network call runs; the phase recorded by
/// `begin_*` keeps a second send from the same session out until the first
/// one finishes. A query and an upload never overlap either. The async
/// helpers (`send_query`, `upload`) do both halves.
///
/// Operations never return errors to the caller. Each failure ends up as a
/// [`Notice`] and resets the control that triggered it.
pub struct ChatController {
    sync: StoreSynchronizer,
    messages: Vec<ChatMessage>,
    input: String,
    query_phase: QueryPhase,
    outstanding_query: Option<String>,
    upload_phase: UploadPhase,
    picked_file: Option<PickedFile>,
    notice: Option<Notice>,
}

impl ChatController {
    pub fn new(api: Arc<dyn StoreApi>) -> Self {
        Self {
            sync: StoreSynchronizer::new(api),
            messages: Vec::new(),
            input: String::new(),
            query_phase: QueryPhase::Idle,
            outstanding_query: None,
            upload_phase: UploadPhase::Idle,
            picked_file: None,
            notice: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn query_phase(&self) -> QueryPhase {
        self.query_phase
    }

    pub fn upload_phase(&self) -> UploadPhase {
        self.upload_phase
    }

    pub fn picked_file(&self) -> Option<&PickedFile> {
        self.picked_file.as_ref()
    }

    pub fn synchronizer(&self) -> &StoreSynchronizer {
        &self.sync
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// A query or an upload is in flight.
    pub fn busy(&self) -> bool {
        self.query_phase.in_flight() || self.upload_phase.in_flight()
    }

    pub fn can_send(&self) -> bool {
        !self.busy()
            && !self.input.trim().is_empty()
            && self.sync.selected().is_some()
    }

    pub fn can_upload(&self) -> bool {
        !self.busy()
            && self.picked_file.is_some()
            && self.sync.selected().is_some()
    }

    pub fn view(&self) -> ChatView {
        render_view(ViewState {
            messages: &self.messages,
            stores: self.sync.stores(),
            selected: self.sync.selected().map(|store| store.id.as_str()),
            send_enabled: self.can_send(),
            upload_enabled: self.can_upload(),
            upload_phase: self.upload_phase,
            notice: self.notice.as_ref(),
        })
    }

    // Stores

    pub async fn refresh_stores(&mut self) {
        match self.sync.refresh().await {
            Ok(outcome) if outcome.selection_cleared => {
                self.notice = Some(Notice::info(
                    "The selected store no longer exists. Please select another store.",
                ));
            }
            Ok(_) => {}
            Err(err) => self.fail("Failed to load stores", &err),
        }
    }

    pub fn select_store(&mut self, store_id: &str) {
        match self.sync.select(store_id) {
            Ok(store) => {
                tracing::debug!("Selected store {}", store.name);
                self.notice = None;
            }
            Err(err) => self.fail("Could not select store", &err),
        }
    }

    pub async fn create_store(&mut self, display_name: &str) {
        if self.refuse_while_busy() {
            return;
        }
        match self.sync.create_store(display_name).await {
            Ok(store) => {
                if self.sync.selected().is_none() {
                    match self.sync.select(&store.id) {
                        Ok(selected) => tracing::debug!("Selected new store {}", selected.name),
                        Err(err) => tracing::debug!(
                            "New store {} not in refreshed list yet: {}",
                            store.name,
                            err
                        ),
                    }
                }
                self.notice = Some(Notice::success(format!(
                    "Store '{}' created",
                    store.display_name
                )));
            }
            Err(err) => self.fail("Failed to create store", &err),
        }
    }

    pub async fn delete_store(&mut self, store_id: &str) {
        if self.refuse_while_busy() {
            return;
        }
        match self.sync.delete_store(store_id).await {
            Ok(SyncOutcome {
                selection_cleared,
                refresh_error: Some(err),
            }) => {
                let detail = err.detail().trim_end_matches('.').to_string();
                let follow_up = if selection_cleared {
                    " Select another store to continue chatting."
                } else {
                    ""
                };
                self.notice = Some(Notice::info(format!(
                    "Store deleted, but the store list could not be reloaded: {}.{}",
                    detail, follow_up
                )));
            }
            Ok(outcome) if outcome.selection_cleared => {
                self.notice = Some(Notice::success(
                    "Store deleted. Select another store to continue chatting.",
                ));
            }
            Ok(_) => self.notice = Some(Notice::success("Store deleted")),
            Err(err) => self.fail("Failed to delete store", &err),
        }
    }

    // Query

    /// Validates the composer and records the exchange optimistically.
    ///
    /// Appends the user message and a pending assistant placeholder and
    /// moves to `Sent`. Refuses without touching the transcript when the
    /// input is blank, no store is selected, or a query or upload is in
    /// flight.
    pub fn begin_query(&mut self) -> Result<QueryTicket, ApiError> {
        let result = self.prepare_query();
        if let Err(err) = &result {
            self.notice = Some(Notice::error(err.detail().to_string()));
        }
        result
    }

    fn prepare_query(&mut self) -> Result<QueryTicket, ApiError> {
        if self.query_phase.in_flight() {
            return Err(ApiError::validation("Please wait for the current answer"));
        }
        if self.upload_phase.in_flight() {
            return Err(ApiError::validation("Please wait for the upload to finish"));
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::validation("Please enter a question"));
        }
        let store_name = self
            .sync
            .selected()
            .map(|store| store.name.clone())
            .ok_or_else(|| ApiError::validation("Please select a store first"))?;

        self.messages.push(ChatMessage::user(text.clone()));
        let placeholder = ChatMessage::pending_assistant();
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);

        self.input.clear();
        self.notice = None;
        self.query_phase = QueryPhase::Sent;
        self.outstanding_query = Some(placeholder_id.clone());

        Ok(QueryTicket {
            request: QueryRequest {
                query: text,
                store_name,
                metadata_filter: None,
            },
            placeholder_id,
        })
    }

    pub fn mark_awaiting_response(&mut self) {
        if self.query_phase == QueryPhase::Sent {
            self.query_phase = QueryPhase::AwaitingResponse;
        }
    }

    /// Replaces the ticket's placeholder in place and returns to `Idle`.
    /// The returned phase is `Rendered` or `Failed`.
    ///
    /// Only the ticket from the latest `begin_query` is accepted. Any other
    /// ticket is dropped and the current phase is returned unchanged.
    pub fn finish_query(
        &mut self,
        ticket: QueryTicket,
        result: Result<AnswerResult, ApiError>,
    ) -> QueryPhase {
        if self.outstanding_query.as_deref() != Some(ticket.placeholder_id.as_str()) {
            tracing::debug!(
                "Ignoring result for query {} that is no longer outstanding",
                ticket.placeholder_id
            );
            return self.query_phase;
        }
        self.outstanding_query = None;
        self.query_phase = QueryPhase::Idle;

        let outcome = match &result {
            Ok(_) => QueryPhase::Rendered,
            Err(_) => QueryPhase::Failed,
        };
        if let Err(err) = &result {
            tracing::warn!("Query failed: {}", err);
        }

        let Some(slot) = self
            .messages
            .iter_mut()
            .find(|message| message.id == ticket.placeholder_id)
        else {
            tracing::debug!("Placeholder {} is gone; answer dropped", ticket.placeholder_id);
            return outcome;
        };
        slot.pending = false;

        match result {
            Ok(answer) => {
                slot.citations = Citation::from_grounding(answer.grounding_metadata.as_ref());
                slot.text = answer.response;
            }
            Err(err) => {
                slot.failed = true;
                slot.text = failure_text(&err);
            }
        }
        outcome
    }

    pub async fn send_query(&mut self) -> QueryPhase {
        let Ok(ticket) = self.begin_query() else {
            return QueryPhase::Failed;
        };
        self.mark_awaiting_response();
        let api = Arc::clone(self.sync.api());
        let result = api.query(ticket.request.clone()).await;
        self.finish_query(ticket, result)
    }

    // Upload

    pub fn pick_file(&mut self, file: PickedFile) {
        self.picked_file = Some(file);
    }

    pub fn clear_picked_file(&mut self) {
        self.picked_file = None;
    }

    /// Validates the picked file and target store and moves to `Preparing`.
    /// Call [`mark_submitting`](Self::mark_submitting) once the request is
    /// on its way.
    pub fn begin_upload(&mut self, options: UploadOptions) -> Result<UploadTicket, ApiError> {
        let result = self.prepare_upload(options);
        if let Err(err) = &result {
            self.notice = Some(Notice::error(err.detail().to_string()));
        }
        result
    }

    fn prepare_upload(&mut self, options: UploadOptions) -> Result<UploadTicket, ApiError> {
        if self.upload_phase.in_flight() {
            return Err(ApiError::validation("An upload is already in progress"));
        }
        if self.query_phase.in_flight() {
            return Err(ApiError::validation("Please wait for the current answer"));
        }
        let store_name = self
            .sync
            .selected()
            .map(|store| store.name.clone())
            .ok_or_else(|| ApiError::validation("Please select a store before uploading"))?;
        let file = self
            .picked_file
            .as_ref()
            .ok_or_else(|| ApiError::validation("Please choose a file to upload"))?;

        self.upload_phase = UploadPhase::Preparing;
        self.notice = Some(Notice::info(format!("Uploading {}...", file.file_name)));

        let display_name = options
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| file.file_name.clone());
        let request = UploadFileRequest {
            store_name,
            file_name: Some(file.file_name.clone()),
            display_name: Some(display_name),
            mime_type: file.mime_type.clone(),
            bytes: file.bytes.clone(),
            chunking: options.chunking,
            metadata: options.metadata,
        };

        Ok(UploadTicket { request })
    }

    pub fn mark_submitting(&mut self) {
        if self.upload_phase == UploadPhase::Preparing {
            self.upload_phase = UploadPhase::Submitting { percent: 0 };
        }
    }

    pub fn set_upload_progress(&mut self, percent: u8) {
        if self.upload_phase.in_flight() {
            self.upload_phase = UploadPhase::Submitting {
                percent: percent.min(100),
            };
        }
    }

    pub fn finish_upload(&mut self, _ticket: UploadTicket, result: Result<UploadReceipt, ApiError>) {
        self.upload_phase = UploadPhase::Idle;
        match result {
            Ok(receipt) => {
                self.picked_file = None;
                self.notice = Some(Notice::success(receipt.message));
            }
            Err(err) => self.fail("Upload failed", &err),
        }
    }

    pub async fn upload(&mut self, options: UploadOptions) {
        let Ok(ticket) = self.begin_upload(options) else {
            return;
        };
        self.mark_submitting();
        let api = Arc::clone(self.sync.api());
        let result = api.upload_file(ticket.request.clone()).await;
        self.finish_upload(ticket, result);
    }

    fn refuse_while_busy(&mut self) -> bool {
        if !self.busy() {
            return false;
        }
        self.notice = Some(Notice::error(
            "Please wait for the current request to finish",
        ));
        true
    }

    fn fail(&mut self, context: &str, err: &ApiError) {
        tracing::warn!("{}: {}", context, err);
        self.notice = Some(Notice::error(format!("{}: {}", context, err.detail())));
    }
}

fn failure_text(err: &ApiError) -> String {
    let detail = err.detail().trim();
    if detail.is_empty() {
        "Sorry, something went wrong while answering your question.".to_string()
    } else {
        format!("Sorry, something went wrong while answering your question: {}", detail)
    }
}
