//! Scripted HTTP server for exercising the HTTP collaborators.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Clone, Default)]
struct Script {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockServer {
    pub base_url: String,
    script: Script,
}

impl MockServer {
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.script.requests.lock().await.clone()
    }
}

/// Answers requests with `responses` in order. Once the script runs out every
/// further request gets a 500.
pub async fn serve(responses: Vec<MockResponse>) -> MockServer {
    let script = Script {
        responses: Arc::new(Mutex::new(responses.into())),
        requests: Arc::default(),
    };
    let app = Router::new().fallback(reply).with_state(script.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
    let address = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockServer { base_url: format!("http://{address}"), script }
}

async fn reply(
    State(script): State<Script>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    script.requests.lock().await.push(RecordedRequest {
        path: uri.path().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let next = script.responses.lock().await.pop_front();
    let response = next.unwrap_or_else(|| MockResponse::new(500, "no scripted response left"));
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, [(header::CONTENT_TYPE, "application/json")], response.body)
}
