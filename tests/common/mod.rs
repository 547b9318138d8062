#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;

use filesearch_backend::core::config::{AppPaths, AppSettings};
use filesearch_backend::core::errors::ApiError;
use filesearch_backend::provider::types::{
    Answer, GenerateRequest, GroundingChunk, GroundingMetadata, Operation, ProviderDocument,
    ProviderStore, RetrievedContext, UploadJob,
};
use filesearch_backend::provider::IndexProvider;
use filesearch_backend::server::router::router;
use filesearch_backend::state::AppState;

/// In-memory stand-in for the File Search service.
#[derive(Default)]
pub struct FakeProvider {
    stores: Mutex<Vec<ProviderStore>>,
    next_id: AtomicUsize,
    pub uploads: Mutex<Vec<UploadJob>>,
    pub answer: Mutex<Option<Answer>>,
    pub fail_generate: Mutex<Option<ApiError>>,
    pub create_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub operation_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_answer(answer: Answer) -> Arc<Self> {
        let provider = Self::default();
        *provider.answer.lock().unwrap() = Some(answer);
        Arc::new(provider)
    }

    pub fn store_names(&self) -> Vec<String> {
        self.stores
            .lock()
            .unwrap()
            .iter()
            .map(|store| store.name.clone())
            .collect()
    }

    pub fn calls(&self, counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn provider_calls(&self) -> usize {
        [
            &self.create_calls,
            &self.list_calls,
            &self.delete_calls,
            &self.upload_calls,
            &self.operation_calls,
            &self.generate_calls,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

#[async_trait]
impl IndexProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_store(&self, display_name: &str) -> Result<ProviderStore, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let store = ProviderStore {
            name: format!("fileSearchStores/store-{}", id),
            display_name: Some(display_name.to_string()),
            create_time: Some("2026-01-01T00:00:00Z".to_string()),
        };
        self.stores.lock().unwrap().push(store.clone());
        Ok(store)
    }

    async fn list_stores(&self) -> Result<Vec<ProviderStore>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stores.lock().unwrap().clone())
    }

    async fn delete_store(&self, store_name: &str, _force: bool) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut stores = self.stores.lock().unwrap();
        let before = stores.len();
        stores.retain(|store| store.name != store_name);
        if stores.len() == before {
            return Err(ApiError::NotFound(format!(
                "Failed to delete store: {} not found",
                store_name
            )));
        }
        Ok(())
    }

    async fn list_documents(&self, store_name: &str) -> Result<Vec<ProviderDocument>, ApiError> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.store_name == store_name)
            .enumerate()
            .map(|(index, job)| ProviderDocument {
                name: format!("{}/documents/doc-{}", store_name, index),
                display_name: Some(job.display_name.clone()),
                state: Some("STATE_ACTIVE".to_string()),
                size_bytes: Some(job.bytes.len() as u64),
                mime_type: job.mime_type.clone(),
                create_time: None,
            })
            .collect())
    }

    async fn upload_file(&self, job: UploadJob) -> Result<Operation, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}/operations/op-{}", job.store_name, self.calls(&self.upload_calls));
        self.uploads.lock().unwrap().push(job);
        Ok(Operation {
            name,
            done: false,
            error: None,
        })
    }

    async fn get_operation(&self, operation_name: &str) -> Result<Operation, ApiError> {
        self.operation_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Operation {
            name: operation_name.to_string(),
            done: true,
            error: None,
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Answer, ApiError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_generate.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.answer.lock().unwrap().clone().unwrap_or(Answer {
            text: format!("Answer to: {}", request.query),
            grounding: None,
        }))
    }
}

pub fn chunk(title: &str, text: &str) -> GroundingChunk {
    GroundingChunk {
        web: None,
        retrieved_context: Some(RetrievedContext {
            uri: None,
            title: Some(title.to_string()),
            text: Some(text.to_string()),
        }),
    }
}

pub fn grounded_answer(text: &str, chunks: Vec<GroundingChunk>) -> Answer {
    Answer {
        text: text.to_string(),
        grounding: Some(GroundingMetadata {
            grounding_chunks: chunks,
            grounding_supports: None,
        }),
    }
}

/// Settings with a tiny upload ceiling and instant indexing polls.
pub fn test_settings() -> AppSettings {
    let mut settings = AppSettings::default();
    settings.server.static_dir = None;
    settings.upload.max_upload_bytes = 1024;
    settings.upload.poll_interval_secs = 0;
    settings.upload.max_poll_attempts = 3;
    settings
}

pub fn test_state(provider: Arc<FakeProvider>, dir: &tempfile::TempDir) -> Arc<AppState> {
    let paths = AppPaths::with_dirs(dir.path().to_path_buf(), dir.path().join("data"));
    AppState::with_provider(Arc::new(paths), test_settings(), provider)
}

/// Serves the router on an ephemeral port and returns its base URL.
pub async fn spawn_app(state: Arc<AppState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}
