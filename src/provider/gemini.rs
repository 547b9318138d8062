//! Gemini File Search REST client (`v1beta`).
//!
//! Stores, documents and long-running operations live under
//! `{base_url}/v1beta/`, uploads go through the resumable upload endpoint
//! under `{base_url}/upload/v1beta/`, and queries are `generateContent`
//! calls carrying a `fileSearch` tool.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::provider::IndexProvider;
use super::types::{
    Answer, GenerateRequest, GroundingChunk, GroundingMetadata, GroundingSupport, MetadataEntry,
    Operation, ProviderDocument, ProviderStore, RetrievedContext, Segment, UploadJob, WebSource,
};
use crate::core::config::ProviderSettings;
use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    page_size: u32,
    upload_timeout: std::time::Duration,
    client: Client,
}

impl GeminiProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ApiError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ApiError::validation(
                    "GEMINI_API_KEY is not set; add it to .env, secrets.yaml or the environment",
                )
            })?
            .to_string();

        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size: settings.page_size,
            upload_timeout: settings.upload_timeout(),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn upload_url(&self, store_name: &str) -> String {
        format!(
            "{}/upload/v1beta/{}:uploadToFileSearchStore",
            self.base_url, store_name
        )
    }

    async fn send_json(&self, request: RequestBuilder, context: &str) -> Result<Value, ApiError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|err| map_transport_error(err, context))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| map_transport_error(err, context))?;

        if !status.is_success() {
            return Err(map_status_error(status, &body, context));
        }
        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        serde_json::from_str(&body).map_err(|err| {
            ApiError::Unknown(format!("{}: unexpected provider payload: {}", context, err))
        })
    }

    async fn start_resumable_upload(
        &self,
        job: &UploadJob,
        mime_type: &str,
    ) -> Result<String, ApiError> {
        const CONTEXT: &str = "Failed to upload file";

        let response = self
            .client
            .post(self.upload_url(&job.store_name))
            .timeout(self.upload_timeout)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header(
                "X-Goog-Upload-Header-Content-Length",
                job.bytes.len().to_string(),
            )
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&upload_config_body(job, mime_type))
            .send()
            .await
            .map_err(|err| map_transport_error(err, CONTEXT))?;

        let status = response.status();
        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body, CONTEXT));
        }

        upload_url.ok_or_else(|| {
            ApiError::Unknown(format!(
                "{}: provider did not return an upload session URL",
                CONTEXT
            ))
        })
    }
}

#[async_trait]
impl IndexProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn create_store(&self, display_name: &str) -> Result<ProviderStore, ApiError> {
        const CONTEXT: &str = "Failed to create store";
        let request = self
            .client
            .post(self.api_url("fileSearchStores"))
            .json(&json!({ "displayName": display_name }));
        let payload = self.send_json(request, CONTEXT).await?;
        parse_payload::<StorePayload>(payload, CONTEXT).map(ProviderStore::from)
    }

    async fn list_stores(&self) -> Result<Vec<ProviderStore>, ApiError> {
        const CONTEXT: &str = "Failed to list stores";
        let mut stores = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.api_url("fileSearchStores"))
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let payload = self.send_json(request, CONTEXT).await?;
            let page: StorePage = parse_payload(payload, CONTEXT)?;
            stores.extend(page.file_search_stores.into_iter().map(ProviderStore::from));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }

        Ok(stores)
    }

    async fn delete_store(&self, store_name: &str, force: bool) -> Result<(), ApiError> {
        let request = self
            .client
            .delete(self.api_url(store_name))
            .query(&[("force", force.to_string())]);
        self.send_json(request, "Failed to delete store").await?;
        Ok(())
    }

    async fn list_documents(&self, store_name: &str) -> Result<Vec<ProviderDocument>, ApiError> {
        const CONTEXT: &str = "Failed to list documents";
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.api_url(&format!("{}/documents", store_name)))
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let payload = self.send_json(request, CONTEXT).await?;
            let page: DocumentPage = parse_payload(payload, CONTEXT)?;
            documents.extend(page.documents.into_iter().map(ProviderDocument::from));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn upload_file(&self, job: UploadJob) -> Result<Operation, ApiError> {
        const CONTEXT: &str = "Failed to upload file";

        let mime_type = job
            .mime_type
            .clone()
            .filter(|mime| !mime.is_empty() && mime != DEFAULT_MIME_TYPE)
            .or_else(|| {
                job.file_name
                    .as_deref()
                    .and_then(guess_mime_type)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let session_url = self.start_resumable_upload(&job, &mime_type).await?;
        tracing::debug!("Upload session opened for {}", job.display_name);

        let request = self
            .client
            .post(session_url)
            .timeout(self.upload_timeout)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(job.bytes);

        let payload = self.send_json(request, CONTEXT).await?;
        parse_payload::<OperationPayload>(payload, CONTEXT).map(Operation::from)
    }

    async fn get_operation(&self, operation_name: &str) -> Result<Operation, ApiError> {
        const CONTEXT: &str = "Failed to check indexing status";
        let request = self.client.get(self.api_url(operation_name));
        let payload = self.send_json(request, CONTEXT).await?;
        parse_payload::<OperationPayload>(payload, CONTEXT).map(Operation::from)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Answer, ApiError> {
        const CONTEXT: &str = "Query failed";
        let model_path = if request.model.starts_with("models/") {
            request.model.clone()
        } else {
            format!("models/{}", request.model)
        };

        let http_request = self
            .client
            .post(self.api_url(&format!("{}:generateContent", model_path)))
            .json(&generate_body(&request));
        let payload = self.send_json(http_request, CONTEXT).await?;
        parse_answer(payload)
    }
}

fn parse_payload<T: DeserializeOwned>(payload: Value, context: &str) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|err| {
        ApiError::Unknown(format!("{}: unexpected provider payload: {}", context, err))
    })
}

fn map_transport_error(err: reqwest::Error, context: &str) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(format!("{}: provider did not respond in time", context));
    }
    if err.is_decode() {
        return ApiError::Unknown(format!("{}: {}", context, err));
    }
    ApiError::Provider(format!("{}: {}", context, err))
}

pub(crate) fn map_status_error(status: StatusCode, body: &str, context: &str) -> ApiError {
    let (message, provider_status) = provider_error_message(body);
    let message = message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    });
    let detail = format!("{}: {}", context, message);

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::SizeLimit(detail),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::UnsupportedFormat(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ApiError::Timeout(detail),
        StatusCode::BAD_REQUEST if mentions_unsupported_format(&message) => {
            ApiError::UnsupportedFormat(detail)
        }
        _ if provider_status.as_deref() == Some("NOT_FOUND") => ApiError::NotFound(detail),
        _ => ApiError::Provider(detail),
    }
}

fn provider_error_message(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };
    let error = &value["error"];
    (
        error["message"].as_str().map(str::to_string),
        error["status"].as_str().map(str::to_string),
    )
}

fn mentions_unsupported_format(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("mime type") || lower.contains("unsupported") || lower.contains("file type")
}

fn upload_config_body(job: &UploadJob, mime_type: &str) -> Value {
    let mut body = json!({
        "displayName": job.display_name,
        "mimeType": mime_type,
        "chunkingConfig": {
            "whiteSpaceConfig": {
                "maxTokensPerChunk": job.chunking.max_tokens_per_chunk,
                "maxOverlapTokens": job.chunking.max_overlap_tokens,
            }
        }
    });

    if !job.metadata.is_empty() {
        if let Some(obj) = body.as_object_mut() {
            obj.insert(
                "customMetadata".to_string(),
                Value::Array(job.metadata.iter().map(metadata_to_wire).collect()),
            );
        }
    }

    body
}

fn metadata_to_wire(entry: &MetadataEntry) -> Value {
    match (&entry.string_value, entry.numeric_value) {
        (Some(text), _) => json!({ "key": entry.key, "stringValue": text }),
        (None, Some(number)) => json!({ "key": entry.key, "numericValue": number }),
        (None, None) => json!({ "key": entry.key }),
    }
}

fn generate_body(request: &GenerateRequest) -> Value {
    let mut file_search = json!({ "fileSearchStoreNames": [request.store_name] });
    if let Some(filter) = request
        .metadata_filter
        .as_deref()
        .filter(|filter| !filter.trim().is_empty())
    {
        if let Some(obj) = file_search.as_object_mut() {
            obj.insert("metadataFilter".to_string(), json!(filter));
        }
    }

    json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.query }] }],
        "tools": [{ "fileSearch": file_search }]
    })
}

pub(crate) fn parse_answer(payload: Value) -> Result<Answer, ApiError> {
    let response: GenerateResponse = parse_payload(payload, "Query failed")?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ApiError::Provider(format!(
                "Query failed: prompt was blocked ({})",
                reason
            )));
        }
        return Err(ApiError::Unknown(
            "Query failed: provider returned no candidates".to_string(),
        ));
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought.unwrap_or(false))
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(Answer {
        text,
        grounding: candidate.grounding_metadata.map(GroundingMetadata::from),
    })
}

/// Best-effort MIME type from a file extension, for clients that send
/// `application/octet-stream`.
pub fn guess_mime_type(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/x-yaml",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "js" => "text/javascript",
        "ts" => "application/typescript",
        "java" => "text/x-java",
        "c" | "h" => "text/x-c",
        "cpp" | "hpp" | "cc" => "text/x-c++",
        "go" => "text/x-go",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorePayload {
    name: String,
    display_name: Option<String>,
    create_time: Option<String>,
}

impl From<StorePayload> for ProviderStore {
    fn from(payload: StorePayload) -> Self {
        ProviderStore {
            name: payload.name,
            display_name: payload.display_name,
            create_time: payload.create_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StorePage {
    file_search_stores: Vec<StorePayload>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPayload {
    name: String,
    display_name: Option<String>,
    state: Option<String>,
    size_bytes: Option<Value>,
    mime_type: Option<String>,
    create_time: Option<String>,
}

impl From<DocumentPayload> for ProviderDocument {
    fn from(payload: DocumentPayload) -> Self {
        // int64 fields arrive as JSON strings
        let size_bytes = payload.size_bytes.and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
        });
        ProviderDocument {
            name: payload.name,
            display_name: payload.display_name,
            state: payload.state,
            size_bytes,
            mime_type: payload.mime_type,
            create_time: payload.create_time,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DocumentPage {
    documents: Vec<DocumentPayload>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<StatusPayload>,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    code: Option<i64>,
    message: Option<String>,
}

impl From<OperationPayload> for Operation {
    fn from(payload: OperationPayload) -> Self {
        let error = payload.error.map(|status| {
            status.message.unwrap_or_else(|| match status.code {
                Some(code) => format!("indexing failed with code {}", code),
                None => "indexing failed".to_string(),
            })
        });
        Operation {
            name: payload.name,
            // an operation that carries an error has finished
            done: payload.done || error.is_some(),
            error,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<CandidatePayload>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePayload {
    content: Option<ContentPayload>,
    grounding_metadata: Option<GroundingPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentPayload {
    parts: Vec<PartPayload>,
}

#[derive(Debug, Deserialize)]
struct PartPayload {
    text: Option<String>,
    thought: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GroundingPayload {
    grounding_chunks: Option<Vec<GroundingChunkPayload>>,
    grounding_supports: Option<Vec<GroundingSupportPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GroundingChunkPayload {
    web: Option<WebSource>,
    retrieved_context: Option<RetrievedContext>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GroundingSupportPayload {
    segment: Option<SegmentPayload>,
    grounding_chunk_indices: Option<Vec<u32>>,
    confidence_scores: Option<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SegmentPayload {
    start_index: Option<u64>,
    end_index: Option<u64>,
    text: Option<String>,
}

impl From<GroundingPayload> for GroundingMetadata {
    fn from(payload: GroundingPayload) -> Self {
        let grounding_chunks = payload
            .grounding_chunks
            .unwrap_or_default()
            .into_iter()
            .filter(|chunk| chunk.web.is_some() || chunk.retrieved_context.is_some())
            .map(|chunk| GroundingChunk {
                web: chunk.web,
                retrieved_context: chunk.retrieved_context,
            })
            .collect();

        let grounding_supports = payload.grounding_supports.map(|supports| {
            supports
                .into_iter()
                .map(|support| GroundingSupport {
                    segment: support.segment.map(|segment| Segment {
                        start_index: segment.start_index,
                        end_index: segment.end_index,
                        text: segment.text,
                    }),
                    grounding_chunk_indices: support.grounding_chunk_indices,
                    confidence_scores: support.confidence_scores,
                })
                .filter(|support| {
                    support.segment.is_some()
                        || support.grounding_chunk_indices.is_some()
                        || support.confidence_scores.is_some()
                })
                .collect()
        });

        GroundingMetadata {
            grounding_chunks,
            grounding_supports,
        }
    }
}
