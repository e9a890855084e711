//! The single path from page code to a backend.
//!
//! Sends JSON or multipart bodies, decodes JSON responses, and turns
//! non-success statuses into `KitError::Api` carrying the server's `error`
//! text. No retries: failures go straight back to the caller.

use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dom::FileDescriptor;
use crate::errors::{KitError, GENERIC_REQUEST_MESSAGE};
use crate::progress::{ProgressIndicator, ProgressTask};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Body of an outgoing request.
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Sent as-is; reqwest sets the multipart boundary header.
    Multipart(Form),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Form> for RequestBody {
    fn from(form: Form) -> Self {
        RequestBody::Multipart(form)
    }
}

#[derive(Clone)]
pub struct RequestClient {
    client: Client,
    base_url: Option<String>,
}

impl RequestClient {
    pub fn new(timeout: Duration) -> Result<Self, KitError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: None,
        })
    }

    /// Resolves relative URLs (those starting with `/`) against `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn resolve(&self, url: &str) -> String {
        match (&self.base_url, url.starts_with('/')) {
            (Some(base), true) => format!("{base}{url}"),
            _ => url.to_string(),
        }
    }

    /// Sends one request and returns the decoded JSON payload.
    pub async fn request(
        &self,
        url: &str,
        method: Method,
        body: RequestBody,
    ) -> Result<Value, KitError> {
        let url = self.resolve(url);
        let builder = self.client.request(method.clone(), &url);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder
                .header("content-type", "application/json")
                .body(serde_json::to_vec(&value)?),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await?;
        let status = response.status();
        let raw = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(&raw);
            warn!(%method, %url, status = status.as_u16(), "Request failed: {message}");
            return Err(KitError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload = decode_payload(status, &raw)?;
        debug!(%method, %url, status = status.as_u16(), "Request succeeded");
        Ok(payload)
    }

    /// Like `request`, deserializing the payload into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        url: &str,
        method: Method,
        body: RequestBody,
    ) -> Result<T, KitError> {
        let payload = self.request(url, method, body).await?;
        serde_json::from_value(payload).map_err(KitError::Parse)
    }

    pub async fn get(&self, url: &str) -> Result<Value, KitError> {
        self.request(url, Method::GET, RequestBody::Empty).await
    }

    pub async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Value, KitError> {
        let value = serde_json::to_value(body)?;
        self.request(url, Method::POST, RequestBody::Json(value))
            .await
    }

    /// Uploads one file as multipart field `field`, advancing `progress`
    /// as the body is streamed out. The task is finished as succeeded or
    /// failed according to the outcome.
    pub async fn upload(
        &self,
        url: &str,
        field: &str,
        file: &FileDescriptor,
        contents: Bytes,
        progress: Option<(&ProgressIndicator, &ProgressTask)>,
    ) -> Result<Value, KitError> {
        let total = contents.len() as u64;
        let chunks = chunk(contents);
        let tracker = progress.map(|(indicator, task)| (indicator.clone(), task.clone()));

        let mut sent: u64 = 0;
        let tracked = chunks.into_iter().map(move |piece| {
            sent += piece.len() as u64;
            if let Some((indicator, task)) = &tracker {
                indicator.update_task(task, percent_of(sent, total));
            }
            Ok::<Bytes, std::io::Error>(piece)
        });

        let body = reqwest::Body::wrap_stream(stream::iter(tracked));
        let part = Part::stream_with_length(body, total)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = Form::new().part(field.to_string(), part);

        info!(file = %file.name, bytes = total, "Uploading file");
        let result = self
            .request(url, Method::POST, RequestBody::Multipart(form))
            .await;

        if let Some((indicator, task)) = progress {
            if result.is_ok() {
                indicator.update_task(task, 100);
            }
            indicator.finish(task, result.is_ok());
        }
        result
    }
}

/// Picks the server's explanation out of an error body.
/// Accepts `{"error": "text"}` and `{"error": {"message": "text"}}`.
fn error_message(raw: &[u8]) -> String {
    serde_json::from_slice::<Value>(raw)
        .ok()
        .and_then(|payload| match payload.get("error")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_REQUEST_MESSAGE.to_string())
}

fn decode_payload(status: StatusCode, raw: &[u8]) -> Result<Value, KitError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        debug!(status = status.as_u16(), "Empty response body");
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(raw)?)
}

fn chunk(contents: Bytes) -> Vec<Bytes> {
    let mut pieces = Vec::new();
    let mut offset = 0;
    while offset < contents.len() {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(contents.len());
        pieces.push(contents.slice(offset..end));
        offset = end;
    }
    pieces
}

fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde::Deserialize;
    use serde_json::json;

    use crate::dom::Page;

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { Json(json!({"short_url": "http://s/abc", "hits": 3})) }))
            .route(
                "/echo",
                post(|Json(body): Json<Value>| async move { Json(json!({ "received": body })) }),
            )
            .route(
                "/fail",
                post(|| async {
                    (AxumStatus::BAD_REQUEST, Json(json!({"error": "Invalid URL"})))
                }),
            )
            .route(
                "/nested-fail",
                get(|| async {
                    (
                        AxumStatus::NOT_FOUND,
                        Json(json!({"error": {"code": "NOT_FOUND", "message": "No such course"}})),
                    )
                }),
            )
            .route(
                "/plain-fail",
                get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route("/html", get(|| async { "<html>not json</html>" }))
            .route("/empty", post(|| async { AxumStatus::NO_CONTENT }))
            .route(
                "/upload",
                post(|mut multipart: Multipart| async move {
                    let mut files = Vec::new();
                    while let Ok(Some(field)) = multipart.next_field().await {
                        let name = field.file_name().unwrap_or_default().to_string();
                        let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
                        files.push(json!({"name": name, "size": len}));
                    }
                    Json(json!({ "files": files }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> RequestClient {
        RequestClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    #[tokio::test]
    async fn test_success_payload_returned_unchanged() {
        let base = spawn_server().await;
        let payload = client(&base).get("/ok").await.unwrap();
        assert_eq!(payload, json!({"short_url": "http://s/abc", "hits": 3}));
    }

    #[tokio::test]
    async fn test_json_body_is_sent() {
        let base = spawn_server().await;
        let payload = client(&base)
            .post_json("/echo", &json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert_eq!(payload["received"]["url"], "https://example.com");
    }

    #[tokio::test]
    async fn test_error_field_becomes_error_message() {
        let base = spawn_server().await;
        let err = client(&base)
            .request("/fail", Method::POST, RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL");
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_nested_error_message_is_understood() {
        let base = spawn_server().await;
        let err = client(&base).get("/nested-fail").await.unwrap_err();
        assert_eq!(err.to_string(), "No such course");
    }

    #[tokio::test]
    async fn test_error_without_payload_is_generic() {
        let base = spawn_server().await;
        let err = client(&base).get("/plain-fail").await.unwrap_err();
        assert_eq!(err.to_string(), GENERIC_REQUEST_MESSAGE);
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_unparsable_success_is_parse_error() {
        let base = spawn_server().await;
        let err = client(&base).get("/html").await.unwrap_err();
        assert!(matches!(err, KitError::Parse(_)));
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_null() {
        let base = spawn_server().await;
        let payload = client(&base)
            .request("/empty", Method::POST, RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(payload, Value::Null);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}")).get("/ok").await.unwrap_err();
        assert!(matches!(err, KitError::Network(_)));
    }

    #[tokio::test]
    async fn test_request_as_deserializes() {
        #[derive(Deserialize)]
        struct Shortened {
            short_url: String,
            hits: u32,
        }

        let base = spawn_server().await;
        let out: Shortened = client(&base)
            .request_as("/ok", Method::GET, RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(out.short_url, "http://s/abc");
        assert_eq!(out.hits, 3);
    }

    #[tokio::test]
    async fn test_upload_streams_file_and_completes_progress() {
        let base = spawn_server().await;
        let page = Page::new();
        let indicator = ProgressIndicator::new(&page);
        let task = indicator.create_task_in(page.body(), "resume.pdf");

        let contents = Bytes::from(vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10]);
        let file = FileDescriptor::new("resume.pdf", contents.len() as u64, "application/pdf");

        let payload = client(&base)
            .upload("/upload", "file", &file, contents, Some((&indicator, &task)))
            .await
            .unwrap();

        assert_eq!(payload["files"][0]["name"], "resume.pdf");
        assert_eq!(payload["files"][0]["size"], UPLOAD_CHUNK_SIZE * 2 + 10);
        assert_eq!(indicator.percent(&task), Some(100));
        assert!(page.has_class(task.bar(), "bg-success"));
    }

    #[test]
    fn test_error_message_variants() {
        assert_eq!(error_message(br#"{"error":"X"}"#), "X");
        assert_eq!(error_message(br#"{"error":{"message":"Y"}}"#), "Y");
        assert_eq!(error_message(br#"{"error":""}"#), GENERIC_REQUEST_MESSAGE);
        assert_eq!(error_message(br#"{"detail":"Z"}"#), GENERIC_REQUEST_MESSAGE);
        assert_eq!(error_message(b"not json"), GENERIC_REQUEST_MESSAGE);
    }

    #[test]
    fn test_chunking_and_percent() {
        let pieces = chunk(Bytes::from(vec![0u8; UPLOAD_CHUNK_SIZE + 1]));
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].len(), 1);
        assert!(chunk(Bytes::new()).is_empty());

        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(1, 4), 25);
        assert_eq!(percent_of(4, 4), 100);
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let c = client("http://localhost:9000/");
        assert_eq!(c.resolve("/api/recent-progress"), "http://localhost:9000/api/recent-progress");
        assert_eq!(c.resolve("https://other/x"), "https://other/x");
    }
}
