#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use message_relay::config::AppConfig;
use message_relay::store::{MemoryStore, StoreUser};
use message_relay::{app, AppState};

pub const TOKEN: &str = "valid-token";
pub const TABLE: &str = "Messages";

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.store.url = "http://127.0.0.1:9".to_string();
    config.store.key = "test-anon-key".to_string();
    config.api.enable_request_logging = false;
    config
}

pub fn test_user() -> StoreUser {
    StoreUser {
        id: "user-1".to_string(),
        email: Some("ops@example.com".to_string()),
    }
}

/// Five messages; ids 1-4 fall inside 2024, id 4 is already completed
pub fn fixtures() -> Vec<Value> {
    vec![
        json!({"id": 1, "first_name": "Ann", "last_name": "Lee", "message": "Call me back", "created_at": "2024-03-01T10:00:00+00:00", "is_completed": false}),
        json!({"id": 2, "first_name": "Bob", "last_name": "Stone", "message": "Invoice question", "created_at": "2024-06-15T12:00:00+00:00", "is_completed": false}),
        json!({"id": 3, "first_name": "Joanne", "last_name": "Park", "message": "Delivery window", "created_at": "2024-09-20T08:30:00+00:00", "is_completed": false}),
        json!({"id": 4, "first_name": "Carl", "last_name": "Hanna", "message": "Thanks!", "created_at": "2024-11-05T16:45:00+00:00", "is_completed": true}),
        json!({"id": 5, "first_name": "Dana", "last_name": "Ray", "message": "Happy new year", "created_at": "2023-12-31T23:00:00+00:00", "is_completed": false}),
    ]
}

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new().with_user(TOKEN, test_user());
    store.insert(TABLE, fixtures());
    store
}

pub fn router(store: &MemoryStore) -> Router {
    router_with(store, test_config())
}

pub fn router_with(store: &MemoryStore, config: AppConfig) -> Router {
    app(AppState::new(config, store.clone()))
}

/// Ids left in the messages table, in insertion order
pub fn stored_ids(store: &MemoryStore) -> Vec<i64> {
    store
        .rows(TABLE)
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64))
        .collect()
}

pub fn is_completed(store: &MemoryStore, id: i64) -> Option<bool> {
    store
        .rows(TABLE)
        .iter()
        .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
        .and_then(|row| row.get("is_completed").and_then(Value::as_bool))
}

/// POST a JSON body through the router without a socket
pub async fn post(router: Router, path: &str, authorization: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    send(router, builder.body(Body::from(body.to_string()))?).await
}

pub async fn send(router: Router, request: Request) -> Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    read_json(response).await
}

async fn read_json(response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    if bytes.is_empty() {
        return Ok((status, Value::Null));
    }
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Ok((status, body))
}

/// CORS preflight for `path`; only status and headers matter
pub async fn preflight(router: Router, path: &str, origin: &str, method: &str) -> Result<(StatusCode, HeaderMap)> {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(path)
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, method)
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())?;
    let response = router.oneshot(request).await?;
    Ok((response.status(), response.headers().clone()))
}

/// Comma-separated header value as trimmed, upper-cased items
pub fn header_list(headers: &HeaderMap, name: header::HeaderName) -> Vec<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(|item| item.trim().to_ascii_uppercase()).collect())
        .unwrap_or_default()
}

pub fn ids_of(body: &Value) -> Vec<i64> {
    body.as_array()
        .map(|rows| rows.iter().filter_map(|row| row["id"].as_i64()).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Fake hosted store: GoTrue user endpoint plus a PostgREST table endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes()).into_owned().collect()
    }
}

#[derive(Clone, Default)]
pub struct FakeSupabase {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    rows: Arc<Mutex<Vec<Value>>>,
}

impl FakeSupabase {
    /// Serve on an unused port; GET on any table returns `rows` as-is
    pub async fn start(rows: Vec<Value>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind fake store")?;

        let fake = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests: Arc::default(),
            rows: Arc::new(Mutex::new(rows)),
        };

        let router = Router::new().fallback(fake_store).with_state(fake.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(fake)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

async fn fake_store(State(fake): State<FakeSupabase>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX)
        .await
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();

    fake.requests.lock().unwrap().push(RecordedRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or("").to_string(),
        headers: parts.headers.clone(),
        body,
    });

    let expected = HeaderValue::from_str(&bearer(TOKEN)).unwrap();
    let authorized = parts.headers.get(header::AUTHORIZATION) == Some(&expected);
    let path = parts.uri.path();

    if path == "/auth/v1/user" {
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"code": 401, "msg": "invalid JWT"}))).into_response();
        }
        return Json(serde_json::to_value(test_user()).unwrap()).into_response();
    }

    if path.starts_with("/rest/v1/") {
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"code": "PGRST301", "message": "JWT expired"})))
                .into_response();
        }
        return match parts.method {
            Method::GET => Json(Value::Array(fake.rows.lock().unwrap().clone())).into_response(),
            _ => StatusCode::NO_CONTENT.into_response(),
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

// ---------------------------------------------------------------------------
// Built binary, for end-to-end checks
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub async fn spawn(store_url: &str) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_message-relay"));
        cmd.env("SUPABASE_URL", store_url)
            .env("SUPABASE_KEY", "test-anon-key")
            .env("RELAY_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        let server = Self { port, base_url, child };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
