use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A request as seen by [`FakeRemote`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Recorded>>,
    responses: Mutex<VecDeque<(StatusCode, String)>>,
}

/// Local HTTP server standing in for the hosted backend. Records every
/// request and answers with queued responses, or `200 []` when none is queued.
pub struct FakeRemote {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl FakeRemote {
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let app = Router::new().fallback(record).with_state(Arc::clone(&shared));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            shared,
        }
    }

    pub async fn respond(&self, status: StatusCode, body: impl Into<String>) {
        self.shared
            .responses
            .lock()
            .await
            .push_back((status, body.into()));
    }

    pub async fn requests(&self) -> Vec<Recorded> {
        self.shared.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Recorded {
        self.requests().await.pop().unwrap()
    }
}

async fn record(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    shared.requests.lock().await.push(Recorded {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body,
    });
    let (status, body) = shared
        .responses
        .lock()
        .await
        .pop_front()
        .unwrap_or_else(|| (StatusCode::OK, "[]".to_string()));
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}
