use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::proxy::{AnswerResult, ProxyService, QueryRequest, Store, UploadFileRequest, UploadReceipt};

/// What a chat session needs from the proxy.
#[async_trait]
pub trait StoreApi: Send + Sync {
    async fn create_store(&self, display_name: &str) -> Result<Store, ApiError>;

    async fn list_stores(&self) -> Result<Vec<Store>, ApiError>;

    async fn delete_store(&self, store_id: &str) -> Result<(), ApiError>;

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadReceipt, ApiError>;

    async fn query(&self, request: QueryRequest) -> Result<AnswerResult, ApiError>;
}

#[async_trait]
impl StoreApi for ProxyService {
    async fn create_store(&self, display_name: &str) -> Result<Store, ApiError> {
        ProxyService::create_store(self, display_name).await
    }

    async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        ProxyService::list_stores(self).await
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), ApiError> {
        ProxyService::delete_store(self, store_id, true).await
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadReceipt, ApiError> {
        ProxyService::upload_file(self, request).await
    }

    async fn query(&self, request: QueryRequest) -> Result<AnswerResult, ApiError> {
        ProxyService::query(self, request).await
    }
}

/// Talks to a running proxy over its HTTP surface and decodes the
/// `{success, ...}` envelope back into typed results and errors.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: Client,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        decode_envelope(status, &body)
    }
}

#[async_trait]
impl StoreApi for HttpApiClient {
    async fn create_store(&self, display_name: &str) -> Result<Store, ApiError> {
        let request = self
            .client
            .post(self.url("/api/stores/create"))
            .json(&json!({ "display_name": display_name }));
        let envelope = self.send(request).await?;
        field(envelope, "store")
    }

    async fn list_stores(&self) -> Result<Vec<Store>, ApiError> {
        let envelope = self.send(self.client.get(self.url("/api/stores/list"))).await?;
        field(envelope, "stores")
    }

    async fn delete_store(&self, store_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/stores/{}", urlencoding::encode(store_id));
        self.send(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn upload_file(&self, request: UploadFileRequest) -> Result<UploadReceipt, ApiError> {
        let file_name = request
            .file_name
            .clone()
            .or_else(|| request.display_name.clone())
            .unwrap_or_else(|| "upload".to_string());
        let mut part = Part::bytes(request.bytes).file_name(file_name);
        if let Some(mime) = request.mime_type.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|err| ApiError::Validation(format!("Invalid MIME type: {}", err)))?;
        }

        let mut form = Form::new()
            .part("file", part)
            .text("store_name", request.store_name)
            .text("display_name", request.display_name.unwrap_or_default());
        if !request.metadata.is_empty() {
            let metadata = serde_json::to_string(&request.metadata).map_err(ApiError::internal)?;
            form = form.text("metadata", metadata);
        }
        if let Some(chunking) = request.chunking {
            form = form
                .text(
                    "max_tokens_per_chunk",
                    chunking.max_tokens_per_chunk.to_string(),
                )
                .text("max_overlap_tokens", chunking.max_overlap_tokens.to_string());
        }

        let envelope = self
            .send(self.client.post(self.url("/api/files/upload")).multipart(form))
            .await?;
        parse(envelope)
    }

    async fn query(&self, request: QueryRequest) -> Result<AnswerResult, ApiError> {
        let envelope = self
            .send(self.client.post(self.url("/api/query")).json(&request))
            .await?;
        parse(envelope)
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout("The server did not respond in time".to_string());
    }
    ApiError::Provider(format!("Could not reach the server: {}", err))
}

pub(crate) fn decode_envelope(status: reqwest::StatusCode, body: &str) -> Result<Value, ApiError> {
    let Ok(envelope) = serde_json::from_str::<Value>(body) else {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        };
        return Err(ApiError::Unknown(detail));
    };

    if envelope.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(envelope);
    }

    let kind = envelope
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    let detail = envelope
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    Err(ApiError::from_kind(kind, detail))
}

fn field<T: DeserializeOwned>(mut envelope: Value, key: &str) -> Result<T, ApiError> {
    let value = envelope
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::Unknown(format!("Response is missing '{}'", key)))?;
    serde_json::from_value(value)
        .map_err(|err| ApiError::Unknown(format!("Unexpected '{}' payload: {}", key, err)))
}

fn parse<T: DeserializeOwned>(envelope: Value) -> Result<T, ApiError> {
    serde_json::from_value(envelope)
        .map_err(|err| ApiError::Unknown(format!("Unexpected response payload: {}", err)))
}
