// Router harness shared by the web tests.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::ServiceExt;

use super::{DEFAULT_MAX_BODY_BYTES, create_app, upload::UploadDestination};
use crate::{
    context::AppContext,
    realtime::{ChannelEvent, ConnectionInfo, RealtimeChannel},
    store::memory::MemoryStore,
};

const BOUNDARY: &str = "feed-server-test-boundary";

pub enum Part {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Part {
    pub fn text(name: &str, value: &str) -> Self {
        Part::Text {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn file(name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        Part::File {
            name: name.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        }
    }
}

fn encode_multipart(parts: Vec<Part>) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub struct TestApp {
    router: Router,
    ctx: AppContext,
    images: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_body_limit(DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_body_limit(max_body_bytes: usize) -> Self {
        let images = tempfile::tempdir().expect("failed to create image directory");
        let ctx = AppContext {
            store: MemoryStore::shared(),
            realtime: RealtimeChannel::init(),
            uploads: UploadDestination::new(images.path()),
            max_body_bytes,
        };
        Self {
            router: create_app(ctx.clone()),
            ctx,
            images,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.ctx.realtime.subscribe()
    }

    pub fn connections(&self) -> broadcast::Receiver<ConnectionInfo> {
        self.ctx.realtime.on_connection()
    }

    pub fn emit(&self, event: ChannelEvent) -> usize {
        self.ctx.realtime.emit(event)
    }

    /// Names of the files currently in the image directory, sorted.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.images.path())
            .expect("image directory is readable")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn raw(&self, method: Method, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request(request).await
    }

    pub async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    async fn status_and_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = Self::body_bytes(response).await;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn send(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        Self::status_and_json(self.raw(method, uri).await).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri).await
    }

    pub async fn raw_json(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Self::status_and_json(self.request(request).await).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.raw_json(method, uri, &body.to_string()).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        parts: Vec<Part>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(encode_multipart(parts)))
            .unwrap();
        Self::status_and_json(self.request(request).await).await
    }
}
