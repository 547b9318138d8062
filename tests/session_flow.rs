//! Session behaviour against an in-process proxy backed by the fake provider.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common::{chunk, grounded_answer, test_settings, FakeProvider};
use filesearch_backend::core::errors::ApiError;
use filesearch_backend::proxy::{
    AnswerResult, ProxyService, QueryRequest, Store, UploadFileRequest, UploadReceipt,
};
use filesearch_backend::session::render::EXCERPT_PREVIEW_CHARS;
use filesearch_backend::session::{
    ChatController, NoticeLevel, PickedFile, QueryPhase, Role, StoreApi, StoreSynchronizer,
    UploadOptions, UploadPhase,
};

fn proxy(provider: &Arc<FakeProvider>) -> ProxyService {
    ProxyService::new(provider.clone(), &test_settings())
}

fn controller(provider: &Arc<FakeProvider>) -> ChatController {
    ChatController::new(Arc::new(proxy(provider)))
}

async fn controller_with_store(provider: &Arc<FakeProvider>, name: &str) -> ChatController {
    let mut chat = controller(provider);
    chat.create_store(name).await;
    let id = chat.synchronizer().stores()[0].id.clone();
    chat.select_store(&id);
    chat
}

fn text_file(name: &str) -> PickedFile {
    PickedFile {
        file_name: name.to_string(),
        mime_type: Some("text/plain".to_string()),
        bytes: b"hello".to_vec(),
    }
}

/// Proxy whose store listing can be made to fail or come back empty.
struct FlakyListing {
    inner: ProxyService,
    fail_list: AtomicBool,
    hide_stores: AtomicBool,
}

impl FlakyListing {
    fn new(provider: &Arc<FakeProvider>) -> Arc<Self> {
        Arc::new(Self {
            inner: proxy(provider),
            fail_list: AtomicBool::new(false),
            hide_stores: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl StoreApi for FlakyListing {
    async fn create_store(&self, display_name: &str) -> Result<Store, ApiError> {
        StoreApi::create_store(&self.inner, display_name).await
    }

    async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ApiError::Timeout("Listing stores timed out".to_string()));
        }
        if self.hide_stores.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        StoreApi::list_stores(&self.inner).await
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), ApiError> {
        StoreApi::delete_store(&self.inner, store_id).await
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadReceipt, ApiError> {
        StoreApi::upload_file(&self.inner, request).await
    }

    async fn query(&self, request: QueryRequest) -> Result<AnswerResult, ApiError> {
        StoreApi::query(&self.inner, request).await
    }
}

#[tokio::test]
async fn created_store_is_listed_with_derived_id() {
    let provider = FakeProvider::new();
    let mut sync = StoreSynchronizer::new(Arc::new(proxy(&provider)));

    sync.create_store("Test Store").await.unwrap();

    let stores = sync.stores();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].display_name, "Test Store");
    assert!(!stores[0].id.is_empty());
    assert_eq!(stores[0].name, format!("fileSearchStores/{}", stores[0].id));
}

#[tokio::test]
async fn store_list_tracks_provider_after_mutations() {
    let provider = FakeProvider::new();
    let mut sync = StoreSynchronizer::new(Arc::new(proxy(&provider)));

    let a = sync.create_store("A").await.unwrap();
    sync.create_store("B").await.unwrap();
    let c = sync.create_store("C").await.unwrap();
    sync.delete_store(&a.id).await.unwrap();
    sync.delete_store(&c.name).await.unwrap();
    sync.create_store("D").await.unwrap();

    let local: Vec<String> = sync.stores().iter().map(|s| s.name.clone()).collect();
    assert_eq!(local, provider.store_names());
    let labels: Vec<&str> = sync.stores().iter().map(|s| s.display_name.as_str()).collect();
    assert_eq!(labels, vec!["B", "D"]);
}

#[tokio::test]
async fn select_unknown_store_is_not_found() {
    let provider = FakeProvider::new();
    let mut sync = StoreSynchronizer::new(Arc::new(proxy(&provider)));
    let store = sync.create_store("Only").await.unwrap();
    sync.select(&store.id).unwrap();

    assert!(matches!(sync.select("missing"), Err(ApiError::NotFound(_))));
    assert_eq!(sync.selected().map(|s| s.id.clone()), Some(store.id));
}

#[tokio::test]
async fn deleting_selected_store_clears_selection_and_disables_send() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.set_input("what is in here?");
    assert!(chat.can_send());

    let id = chat.synchronizer().selected().unwrap().id.clone();
    chat.delete_store(&id).await;

    assert!(chat.synchronizer().selected().is_none());
    assert!(!chat.can_send());
    assert!(!chat.view().send_enabled);
    assert_eq!(chat.notice().unwrap().level, NoticeLevel::Success);

    chat.create_store("Other").await;
    let other = chat.synchronizer().stores()[0].id.clone();
    chat.select_store(&other);
    assert!(chat.can_send());
}

#[tokio::test]
async fn deleting_another_store_keeps_selection() {
    let provider = FakeProvider::new();
    let mut sync = StoreSynchronizer::new(Arc::new(proxy(&provider)));
    let keep = sync.create_store("Keep").await.unwrap();
    let drop = sync.create_store("Drop").await.unwrap();
    sync.select(&keep.id).unwrap();

    let outcome = sync.delete_store(&drop.id).await.unwrap();
    assert!(!outcome.selection_cleared);
    assert_eq!(sync.selected().unwrap().id, keep.id);
}

#[tokio::test]
async fn empty_query_or_missing_store_never_reaches_provider() {
    let provider = FakeProvider::new();
    let api = proxy(&provider);

    let err = StoreApi::query(
        &api,
        QueryRequest {
            query: "   ".to_string(),
            store_name: "fileSearchStores/s".to_string(),
            metadata_filter: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let err = StoreApi::query(
        &api,
        QueryRequest {
            query: "anything".to_string(),
            store_name: String::new(),
            metadata_filter: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let mut chat = controller(&provider);
    chat.set_input("anything");
    assert_eq!(chat.send_query().await, QueryPhase::Failed);
    assert!(chat.messages().is_empty());
    assert_eq!(chat.notice().unwrap().level, NoticeLevel::Error);

    assert_eq!(provider.calls(&provider.generate_calls), 0);
}

#[tokio::test]
async fn blank_input_is_refused_by_controller() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.set_input("  ");
    assert!(!chat.can_send());
    assert!(matches!(chat.begin_query(), Err(ApiError::Validation(_))));
    assert_eq!(provider.calls(&provider.generate_calls), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_locally() {
    let provider = FakeProvider::new();
    let api = proxy(&provider);
    let store = api.create_store("Docs").await.unwrap();
    let calls_before = provider.provider_calls();

    let err = api
        .upload_file(UploadFileRequest {
            store_name: store.id.clone(),
            file_name: Some("big.txt".to_string()),
            bytes: vec![b'x'; 2048],
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::SizeLimit(_)));
    assert_eq!(provider.provider_calls(), calls_before);
}

#[tokio::test]
async fn answer_with_two_chunks_renders_two_truncated_citations() {
    let long = "word ".repeat(60);
    let provider = FakeProvider::with_answer(grounded_answer(
        "Here is what I found.",
        vec![chunk("guide.pdf", &long), chunk("notes.md", "short excerpt")],
    ));
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.set_input("summarize");

    assert_eq!(chat.send_query().await, QueryPhase::Rendered);
    assert_eq!(chat.query_phase(), QueryPhase::Idle);

    let view = chat.view();
    assert_eq!(view.messages.len(), 2);
    let answer = &view.messages[1];
    assert_eq!(answer.role, Role::Assistant);
    assert!(!answer.pending);
    assert_eq!(answer.html, "Here is what I found.");
    assert_eq!(answer.citations.len(), 2);

    let first = answer.citations[0].excerpt.as_deref().unwrap();
    assert!(first.ends_with("..."));
    assert!(first.chars().count() <= EXCERPT_PREVIEW_CHARS + 3);
    assert_eq!(answer.citations[0].title, "guide.pdf");
    assert_eq!(answer.citations[1].excerpt.as_deref(), Some("short excerpt"));
}

#[tokio::test]
async fn double_send_issues_one_query() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));

    chat.set_input("first");
    let ticket = chat.begin_query().unwrap();
    chat.mark_awaiting_response();
    assert!(!chat.view().send_enabled);

    chat.set_input("second");
    assert!(!chat.can_send());
    assert!(matches!(chat.begin_query(), Err(ApiError::Validation(_))));

    let result = api.query(ticket.request.clone()).await;
    assert_eq!(chat.finish_query(ticket, result), QueryPhase::Rendered);

    assert_eq!(provider.calls(&provider.generate_calls), 1);
    // user + answer; the refused send left no trace
    assert_eq!(chat.messages().len(), 2);
    assert!(chat.can_send());
}

#[tokio::test]
async fn failed_query_replaces_placeholder_with_detail() {
    let provider = FakeProvider::new();
    *provider.fail_generate.lock().unwrap() =
        Some(ApiError::Provider("Query failed: quota exhausted".to_string()));
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.set_input("hello");

    assert_eq!(chat.send_query().await, QueryPhase::Failed);

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].failed);
    assert!(!messages[1].pending);
    assert!(messages[1].text.contains("quota exhausted"));
    assert!(chat.input().is_empty());
    assert_eq!(chat.query_phase(), QueryPhase::Idle);
}

#[tokio::test]
async fn upload_without_store_is_reported() {
    let provider = FakeProvider::new();
    let mut chat = controller(&provider);
    chat.pick_file(PickedFile {
        file_name: "a.txt".to_string(),
        mime_type: Some("text/plain".to_string()),
        bytes: b"hello".to_vec(),
    });

    chat.upload(UploadOptions::default()).await;

    let notice = chat.notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.text.contains("select a store"));
    assert_eq!(chat.upload_phase(), UploadPhase::Idle);
    assert_eq!(provider.calls(&provider.upload_calls), 0);
}

#[tokio::test]
async fn successful_upload_confirms_and_clears_picker() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.pick_file(PickedFile {
        file_name: "a.txt".to_string(),
        mime_type: Some("text/plain".to_string()),
        bytes: b"hello".to_vec(),
    });
    assert!(chat.can_upload());

    chat.upload(UploadOptions::default()).await;

    assert_eq!(chat.upload_phase(), UploadPhase::Idle);
    assert!(chat.picked_file().is_none());
    let notice = chat.notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.text, "File uploaded and indexed successfully");

    let uploads = provider.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].display_name, "a.txt");
    assert_eq!(uploads[0].chunking.max_tokens_per_chunk, 800);
}

#[tokio::test]
async fn failed_upload_keeps_file_and_reverts_to_idle() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.pick_file(PickedFile {
        file_name: "huge.bin".to_string(),
        mime_type: None,
        bytes: vec![0; 4096],
    });

    let ticket = chat.begin_upload(UploadOptions::default()).unwrap();
    assert_eq!(chat.upload_phase(), UploadPhase::Preparing);
    chat.mark_submitting();
    assert_eq!(chat.upload_phase(), UploadPhase::Submitting { percent: 0 });
    chat.set_upload_progress(55);
    assert_eq!(
        chat.view().upload_status.as_deref(),
        Some("Uploading... 55%")
    );
    assert!(!chat.can_upload());

    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));
    let result = api.upload_file(ticket.request.clone()).await;
    chat.finish_upload(ticket, result);

    assert_eq!(chat.upload_phase(), UploadPhase::Idle);
    assert!(chat.picked_file().is_some());
    let notice = chat.notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.text.starts_with("Upload failed:"));
    assert_eq!(provider.calls(&provider.upload_calls), 0);
}

#[tokio::test]
async fn upload_in_flight_blocks_query() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.pick_file(text_file("a.txt"));
    chat.set_input("question while uploading");

    let upload = chat.begin_upload(UploadOptions::default()).unwrap();
    assert!(!chat.can_send());
    assert!(!chat.view().send_enabled);
    assert!(matches!(chat.begin_query(), Err(ApiError::Validation(_))));
    assert_eq!(chat.query_phase(), QueryPhase::Idle);
    assert!(chat.messages().is_empty());
    assert_eq!(chat.input(), "question while uploading");

    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));
    let result = api.upload_file(upload.request.clone()).await;
    chat.finish_upload(upload, result);

    assert!(chat.can_send());
    assert_eq!(chat.send_query().await, QueryPhase::Rendered);
    assert_eq!(provider.calls(&provider.generate_calls), 1);
}

#[tokio::test]
async fn query_in_flight_blocks_upload() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.pick_file(text_file("a.txt"));
    chat.set_input("hello");

    let ticket = chat.begin_query().unwrap();
    chat.mark_awaiting_response();
    assert!(!chat.can_upload());
    assert!(!chat.view().upload_enabled);

    chat.upload(UploadOptions::default()).await;
    assert_eq!(chat.upload_phase(), UploadPhase::Idle);
    assert_eq!(chat.notice().unwrap().level, NoticeLevel::Error);
    assert!(chat.picked_file().is_some());
    assert_eq!(provider.calls(&provider.upload_calls), 0);

    let id = chat.synchronizer().selected().unwrap().id.clone();
    chat.delete_store(&id).await;
    chat.create_store("Another").await;
    assert_eq!(chat.notice().unwrap().level, NoticeLevel::Error);
    assert_eq!(provider.calls(&provider.delete_calls), 0);
    assert_eq!(provider.calls(&provider.create_calls), 1);
    assert_eq!(chat.synchronizer().selected().unwrap().id, id);

    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));
    let result = api.query(ticket.request.clone()).await;
    chat.finish_query(ticket, result);
    assert!(chat.can_upload());
}

#[tokio::test]
async fn upload_shows_preparing_before_submission() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    chat.pick_file(text_file("a.txt"));

    let ticket = chat.begin_upload(UploadOptions::default()).unwrap();
    assert_eq!(chat.upload_phase(), UploadPhase::Preparing);
    assert_eq!(
        chat.view().upload_status.as_deref(),
        Some("Preparing upload...")
    );
    assert!(!chat.can_upload());

    chat.mark_submitting();
    assert_eq!(
        chat.view().upload_status.as_deref(),
        Some("Uploading... 0%")
    );

    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));
    let result = api.upload_file(ticket.request.clone()).await;
    chat.finish_upload(ticket, result);
    assert_eq!(chat.view().upload_status, None);
}

#[tokio::test]
async fn stale_query_ticket_is_ignored() {
    let provider = FakeProvider::new();
    let mut chat = controller_with_store(&provider, "Docs").await;
    let api: Arc<dyn StoreApi> = Arc::new(proxy(&provider));

    chat.set_input("first");
    let first = chat.begin_query().unwrap();
    let result = api.query(first.request.clone()).await;
    assert_eq!(chat.finish_query(first.clone(), result), QueryPhase::Rendered);

    chat.set_input("second");
    let second = chat.begin_query().unwrap();
    chat.mark_awaiting_response();
    assert_eq!(chat.messages().len(), 4);

    let late = api.query(first.request.clone()).await;
    assert_eq!(chat.finish_query(first, late), QueryPhase::AwaitingResponse);
    assert_eq!(chat.messages().len(), 4);
    assert!(chat.messages()[3].pending);
    assert_eq!(chat.messages()[1].text, "Answer to: first");
    assert!(!chat.can_send());

    let result = api.query(second.request.clone()).await;
    assert_eq!(chat.finish_query(second, result), QueryPhase::Rendered);
    assert_eq!(chat.messages().len(), 4);
    assert_eq!(chat.messages()[3].text, "Answer to: second");
    assert_eq!(chat.query_phase(), QueryPhase::Idle);
}

#[tokio::test]
async fn delete_with_failed_refresh_still_drops_store() {
    let provider = FakeProvider::new();
    let api = FlakyListing::new(&provider);
    let mut sync = StoreSynchronizer::new(api.clone());
    let keep = sync.create_store("Keep").await.unwrap();
    let doomed = sync.create_store("Doomed").await.unwrap();
    sync.select(&doomed.id).unwrap();

    api.fail_list.store(true, Ordering::SeqCst);
    let outcome = sync.delete_store(&doomed.name).await.unwrap();

    assert!(outcome.selection_cleared);
    assert!(matches!(outcome.refresh_error, Some(ApiError::Timeout(_))));
    assert!(sync.selected().is_none());
    let ids: Vec<&str> = sync.stores().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![keep.id.as_str()]);
    assert_eq!(provider.store_names(), vec![keep.name.clone()]);
}

#[tokio::test]
async fn controller_reports_delete_success_when_refresh_fails() {
    let provider = FakeProvider::new();
    let api = FlakyListing::new(&provider);
    let mut chat = ChatController::new(api.clone());
    chat.create_store("Docs").await;
    let id = chat.synchronizer().selected().unwrap().id.clone();
    chat.set_input("still there?");
    assert!(chat.can_send());

    api.fail_list.store(true, Ordering::SeqCst);
    chat.delete_store(&id).await;

    assert!(chat.synchronizer().selected().is_none());
    assert!(chat.synchronizer().stores().is_empty());
    assert!(!chat.can_send());
    let notice = chat.notice().unwrap();
    assert_ne!(notice.level, NoticeLevel::Error);
    assert!(notice.text.starts_with("Store deleted"));
    assert!(notice.text.contains("could not be reloaded"));
    assert!(!notice.text.contains("Failed to delete store"));
}

#[tokio::test]
async fn new_store_missing_from_listing_is_not_selected() {
    let provider = FakeProvider::new();
    let api = FlakyListing::new(&provider);
    let mut chat = ChatController::new(api.clone());

    api.hide_stores.store(true, Ordering::SeqCst);
    chat.create_store("Eventually consistent").await;

    assert!(chat.synchronizer().selected().is_none());
    let notice = chat.notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.text, "Store 'Eventually consistent' created");
    assert_eq!(provider.calls(&provider.create_calls), 1);

    api.hide_stores.store(false, Ordering::SeqCst);
    chat.refresh_stores().await;
    assert_eq!(chat.synchronizer().stores().len(), 1);
    assert!(chat.synchronizer().selected().is_none());
}
