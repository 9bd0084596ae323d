#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use wahlkreis_api::app::{self, AppState};
use wahlkreis_api::auth::{issue_session_token, Claims, Profile};
use wahlkreis_api::backend::{BackendAuthClient, RefreshOutcome, SessionRefresher};
use wahlkreis_api::config::AppConfig;
use wahlkreis_api::store::{MemoryStore, Record};

pub const APP_URL: &str = "http://app.test";
pub const LOGIN_URL: &str = "http://app.test/anmelden";
pub const SESSION_SECRET: &str = "integration-test-secret";

/// Port 9 (discard) on loopback: nothing listens there in the test environment
pub const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9";

pub fn test_config(backend_url: &str) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("BACKEND_URL", backend_url.to_string()),
        ("BACKEND_ANON_KEY", "anon-key".to_string()),
        ("BACKEND_SERVICE_KEY", "service-key".to_string()),
        ("SESSION_SECRET", SESSION_SECRET.to_string()),
        ("PUBLIC_APP_URL", APP_URL.to_string()),
        ("STORE_BACKEND", "memory".to_string()),
        ("BACKEND_TIMEOUT_SECS", "2".to_string()),
    ]);
    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub config: Arc<AppConfig>,
}

impl TestApp {
    /// App wired to the real backend auth client at `backend_url`
    pub fn with_backend(backend_url: &str) -> Self {
        Self::build(test_config(backend_url), None)
    }

    /// App whose per-request backend refresh is replaced by a stub
    pub fn with_refresher(refresher: Arc<dyn SessionRefresher>) -> Self {
        Self::build(test_config(UNREACHABLE_BACKEND), Some(refresher))
    }

    pub fn new() -> Self {
        Self::with_refresher(Arc::new(StaticRefresher::default()))
    }

    fn build(config: AppConfig, refresher: Option<Arc<dyn SessionRefresher>>) -> Self {
        let config = Arc::new(config);
        let auth = Arc::new(BackendAuthClient::new(reqwest::Client::new(), &config.backend, false));
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            config: config.clone(),
            store: store.clone(),
            refresher: refresher.unwrap_or_else(|| auth.clone() as Arc<dyn SessionRefresher>),
            auth,
        };
        Self { router: app::router(state), store, config }
    }

    pub fn token_for(&self, sub: &str) -> String {
        let claims = Claims::new(profile(sub), self.config.session.ttl_hours);
        issue_session_token(&claims, &self.config.session).expect("token")
    }

    pub fn expired_token_for(&self, sub: &str) -> String {
        let mut claims = Claims::new(profile(sub), 1);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 10;
        issue_session_token(&claims, &self.config.session).expect("token")
    }

    /// Token issued long enough ago to be due for rotation, but still valid
    pub fn aging_token_for(&self, sub: &str) -> String {
        let mut claims = Claims::new(profile(sub), self.config.session.ttl_hours);
        claims.iat -= (self.config.session.rotate_after_minutes + 1) * 60;
        issue_session_token(&claims, &self.config.session).expect("token")
    }

    pub fn session_cookie(&self, token: &str) -> String {
        format!("{}={}", self.config.session.cookie_name, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response> {
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let records = rows
            .into_iter()
            .filter_map(|row| row.as_object().cloned())
            .collect();
        self.store.seed(table, records).await;
    }

    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.store.rows(table).await
    }
}

pub fn profile(sub: &str) -> Profile {
    Profile {
        sub: sub.to_string(),
        name: format!("User {}", sub),
        email: format!("{}@example.org", sub),
        is_fraction_leadership: false,
        wahlkreis: Some("WK 1".to_string()),
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

pub fn with_cookie(uri: &str, method: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("request")
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub async fn body_json(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Every `Set-Cookie` header on the response
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `Set-Cookie` header for `name`, if any
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find(|c| c.starts_with(&prefix))
}

/// Value part of a `Set-Cookie` header
pub fn cookie_value(set_cookie: &str) -> String {
    Cookie::parse(set_cookie.to_string())
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

pub fn is_removal(set_cookie: &str) -> bool {
    set_cookie.contains("Max-Age=0")
}

/// Refresher stub returning a fixed outcome and counting calls
#[derive(Default)]
pub struct StaticRefresher {
    pub cookies: Vec<Cookie<'static>>,
    pub access_token: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticRefresher {
    pub fn with_cookie(name: &str, value: &str) -> Self {
        Self {
            cookies: vec![Cookie::build((name.to_string(), value.to_string())).path("/").build()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRefresher for StaticRefresher {
    async fn refresh(&self, _jar: &CookieJar) -> RefreshOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RefreshOutcome {
            cookies: self.cookies.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

/// Backend access token as the managed auth service would issue it
pub fn backend_token(sub: &str, exp_offset_secs: i64) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": sub,
            "role": "authenticated",
            "exp": Utc::now().timestamp() + exp_offset_secs,
        }),
        &EncodingKey::from_secret(b"backend-jwt-secret"),
    )
    .expect("backend token")
}

/// How the fake auth service answers refresh-token grants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Succeed,
    InvalidGrant,
    ServerError,
}

pub const FAKE_USER_ID: &str = "user-from-backend";
pub const FAKE_EMAIL: &str = "abgeordnete@example.org";
pub const FAKE_PASSWORD: &str = "correct horse";

/// In-process stand-in for the managed auth service
pub struct FakeBackend {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

pub struct FakeState {
    mode: Mutex<RefreshMode>,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub last_refresh_token: Mutex<Option<String>>,
}

impl FakeState {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

impl FakeBackend {
    pub async fn spawn(mode: RefreshMode) -> Result<Self> {
        let state = Arc::new(FakeState {
            mode: Mutex::new(mode),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
        });

        let router = Router::new()
            .route("/auth/v1/token", post(token_grant))
            .route("/auth/v1/logout", post(logout))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { base_url: format!("http://{}", addr), state })
    }

    pub fn set_mode(&self, mode: RefreshMode) {
        if let Ok(mut current) = self.state.mode.lock() {
            *current = mode;
        }
    }
}

fn issued_session() -> Value {
    json!({
        "access_token": backend_token(FAKE_USER_ID, 3600),
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "rotated-refresh-token",
        "user": { "id": FAKE_USER_ID, "email": FAKE_EMAIL }
    })
}

async fn token_grant(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body.get("email").and_then(Value::as_str);
            let password = body.get("password").and_then(Value::as_str);
            if email == Some(FAKE_EMAIL) && password == Some(FAKE_PASSWORD) {
                Json(issued_session()).into_response()
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
                )
                    .into_response()
            }
        }
        Some("refresh_token") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = state.last_refresh_token.lock() {
                *last = body.get("refresh_token").and_then(Value::as_str).map(str::to_string);
            }
            let mode = state.mode.lock().map(|m| *m).unwrap_or(RefreshMode::Succeed);
            match mode {
                RefreshMode::Succeed => Json(issued_session()).into_response(),
                RefreshMode::InvalidGrant => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_grant", "error_description": "Refresh Token Not Found" })),
                )
                    .into_response(),
                RefreshMode::ServerError => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
                }
            }
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "unsupported_grant_type" }))).into_response(),
    }
}

async fn logout(State(state): State<Arc<FakeState>>) -> StatusCode {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

/// One request as seen by the fake PostgREST endpoint
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
    pub prefer: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Decoded value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// In-process stand-in for the backend's PostgREST API. Answers with queued
/// responses in order, then with an empty row list.
pub struct FakeRest {
    pub base_url: String,
    state: Arc<FakeRestState>,
}

#[derive(Default)]
struct FakeRestState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<(StatusCode, Value)>>,
}

impl FakeRest {
    pub async fn spawn() -> Result<Self> {
        let state = Arc::new(FakeRestState::default());

        let router = Router::new()
            .route("/rest/v1/", any(rest_call))
            .route("/rest/v1/:table", any(rest_call))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { base_url: format!("http://{}", addr), state })
    }

    pub fn respond(&self, status: StatusCode, body: Value) {
        if let Ok(mut queue) = self.state.responses.lock() {
            queue.push_back((status, body));
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request reached the fake backend")
    }
}

async fn rest_call(
    State(state): State<Arc<FakeRestState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let recorded = RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect(),
        apikey: text("apikey"),
        authorization: text("authorization"),
        prefer: text("prefer"),
        body: serde_json::from_slice(&body).ok(),
    };
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(recorded);
    }

    let (status, body) = state
        .responses
        .lock()
        .ok()
        .and_then(|mut queue| queue.pop_front())
        .unwrap_or((StatusCode::OK, json!([])));
    (status, Json(body)).into_response()
}
