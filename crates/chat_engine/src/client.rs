use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use chat_logging::chat_debug;
use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use url::Url;

use crate::{FailureKind, TransportError};

pub const CHAT_STREAM_PATH: &str = "api/v1/chat/stream";
pub const DOWNLOAD_PATH: &str = "api/v1/models/download";
pub const TITLE_PATH: &str = "api/v1/generate-title";

/// Chunked response body as handed to the frame reader.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("chat_engine/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub session_id: String,
    pub prompt: String,
    /// Ask the backend to replace its last stored answer instead of appending.
    pub regenerate: bool,
}

#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    async fn open_download_stream(
        &self,
        repo_id: &str,
        filename: &str,
    ) -> Result<ByteStream, TransportError>;

    async fn generate_title(&self, session_id: &str) -> Result<String, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        // No overall timeout: generation streams stay open as long as the model writes.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    async fn post(&self, path: &str, body: Value) -> Result<reqwest::Response, TransportError> {
        let url = self.endpoint(path)?;
        chat_debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response
            .bytes()
            .await
            .ok()
            .and_then(|body| error_detail(&body))
            .unwrap_or_else(|| status.to_string());
        Err(TransportError::new(
            FailureKind::HttpStatus(status.as_u16()),
            detail,
        ))
    }

    async fn post_stream(&self, path: &str, body: Value) -> Result<ByteStream, TransportError> {
        let response = self.post(path, body).await?;
        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(map_reqwest_error)),
        ))
    }
}

#[async_trait::async_trait]
impl BackendClient for ReqwestBackend {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let mut body = json!({
            "session_id": request.session_id,
            "prompt": request.prompt,
        });
        if request.regenerate {
            body["regenerate"] = Value::Bool(true);
        }
        self.post_stream(CHAT_STREAM_PATH, body).await
    }

    async fn open_download_stream(
        &self,
        repo_id: &str,
        filename: &str,
    ) -> Result<ByteStream, TransportError> {
        let body = json!({ "repo_id": repo_id, "filename": filename });
        self.post_stream(DOWNLOAD_PATH, body).await
    }

    async fn generate_title(&self, session_id: &str) -> Result<String, TransportError> {
        let response = self
            .post(TITLE_PATH, json!({ "session_id": session_id }))
            .await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|err| TransportError::new(FailureKind::InvalidResponse, err.to_string()))?;
        value
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TransportError::new(FailureKind::InvalidResponse, "missing title"))
    }
}

/// Extracts the `detail` field the backend puts in error bodies.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("detail").and_then(Value::as_str).map(str::to_string)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}
