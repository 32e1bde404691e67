//! In-process stand-in for LND's REST proxy.
//!
//! Serves canned JSON for request/response endpoints and scripted chunked
//! bodies for the streaming endpoints. Every request is recorded so tests can
//! assert on paths, bodies and the macaroon header.

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

pub const MOCK_MACAROON: &[u8] = b"\x02\x01\x03lnd-admin-macaroon";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub macaroon: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Canned {
    status: StatusCode,
    body: String,
}

/// Scripted body of a streaming endpoint.
#[derive(Debug, Clone)]
pub struct MockStream {
    status: StatusCode,
    error_body: String,
    chunks: Vec<(Duration, Vec<u8>)>,
    end: StreamEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Finish,
    HoldOpen,
    /// connection dropped mid body after the given delay
    Reset(Duration),
}

impl Default for MockStream {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            error_body: String::new(),
            chunks: Vec::new(),
            end: StreamEnd::Finish,
        }
    }
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers the subscribe call with `status` and `body` instead of a stream.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            error_body: body.to_owned(),
            ..Self::default()
        }
    }

    pub fn chunk(self, chunk: impl AsRef<[u8]>) -> Self {
        self.delayed_chunk(Duration::ZERO, chunk)
    }

    pub fn delayed_chunk(mut self, delay: Duration, chunk: impl AsRef<[u8]>) -> Self {
        self.chunks.push((delay, chunk.as_ref().to_vec()));
        self
    }

    /// One JSON value per line.
    pub fn frame(self, value: &Value) -> Self {
        self.chunk(format!("{value}\n"))
    }

    /// Keeps the connection open after the last chunk instead of ending the body.
    pub fn hold_open(self) -> Self {
        Self {
            end: StreamEnd::HoldOpen,
            ..self
        }
    }

    /// Breaks the body `delay` after the last chunk, as a connection reset would.
    pub fn reset_after(self, delay: Duration) -> Self {
        Self {
            end: StreamEnd::Reset(delay),
            ..self
        }
    }

    fn into_response(self) -> Response {
        if !self.status.is_success() {
            return (self.status, self.error_body).into_response();
        }

        let chunks = stream::iter(self.chunks).then(|(delay, chunk)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, io::Error>(Bytes::from(chunk))
        });
        let body: BoxStream<'static, io::Result<Bytes>> = match self.end {
            StreamEnd::Finish => chunks.boxed(),
            StreamEnd::HoldOpen => chunks.chain(stream::pending()).boxed(),
            StreamEnd::Reset(delay) => chunks
                .chain(stream::once(async move {
                    tokio::time::sleep(delay).await;
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
                }))
                .boxed(),
        };
        let body = Body::from_stream(body);
        (StatusCode::OK, body).into_response()
    }
}

#[derive(Debug, Default)]
struct MockState {
    macaroon_hex: String,
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<(Method, String), Canned>>,
    streams: Mutex<HashMap<String, MockStream>>,
}

/// Running mock server, stopped on drop.
pub struct LndMock {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl LndMock {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            macaroon_hex: hex::encode(MOCK_MACAROON),
            ..MockState::default()
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    pub fn url(&self) -> anyhow::Result<Url> {
        Ok(format!("http://{}", self.addr).parse()?)
    }

    /// Writes the macaroon the mock accepts into `dir`.
    pub fn write_macaroon(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join("admin.macaroon");
        std::fs::write(&path, MOCK_MACAROON)?;
        Ok(path)
    }

    pub fn macaroon_hex(&self) -> &str {
        &self.state.macaroon_hex
    }

    /// Serves `body` with `status` for `method` on `/v1/{path}`.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<String>) {
        let canned = Canned {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.into(),
        };
        self.lock_responses()
            .insert((method, format!("/v1/{path}")), canned);
    }

    pub fn respond_json(&self, method: Method, path: &str, body: &Value) {
        self.respond(method, path, 200, body.to_string());
    }

    /// Serves `stream` on the next GET to `/v1/{path}`. Later calls get 404.
    pub fn stream(&self, path: &str, stream: MockStream) {
        self.state
            .streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("/v1/{path}"), stream);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        let path = format!("/v1/{path}");
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<(Method, String), Canned>> {
        self.state
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for LndMock {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_owned();
    let macaroon = headers
        .get("grpc-metadata-macaroon")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            macaroon: macaroon.clone(),
            body: serde_json::from_slice(&body).ok(),
        });

    if macaroon.as_deref() != Some(state.macaroon_hex.as_str()) {
        return (StatusCode::UNAUTHORIZED, "verification failed: signature mismatch")
            .into_response();
    }

    if method == Method::GET {
        let stream = state
            .streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&path);
        if let Some(stream) = stream {
            return stream.into_response();
        }
    }

    let canned = state
        .responses
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&(method, path))
        .cloned();
    match canned {
        Some(Canned { status, body }) => {
            (status, [("content-type", "application/json")], body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
