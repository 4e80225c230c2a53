//! Mock cooperative backend for integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use coop_client::auth::{
    AuthCoordinator, CoordinatorOptions, Credentials, MemoryCredentialStore,
};
use coop_client::http_client::HttpTransport;

pub const EMAIL: &str = "asha@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USER_ID: &str = "6f1c1f1e-8f43-4d7a-9a56-0c4d3c1f0b11";

/// Backend state shared with the handlers and inspected by tests
#[derive(Default)]
pub struct MockState {
    valid_token: Mutex<String>,
    refresh_count: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    refresh_failure: Mutex<Option<StatusCode>>,
    refresh_tokens: Mutex<Vec<Option<String>>>,
    refresh_bearers: Mutex<Vec<Option<String>>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl MockState {
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn valid_token(&self) -> String {
        self.valid_token.lock().unwrap().clone()
    }

    /// Invalidate the current access token as if it expired server-side
    pub fn expire_token(&self) {
        *self.valid_token.lock().unwrap() = "expired".to_string();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn fail_refresh_with(&self, status: StatusCode) {
        *self.refresh_failure.lock().unwrap() = Some(status);
    }

    /// `token` query parameters seen by the refresh endpoint
    pub fn refresh_tokens(&self) -> Vec<Option<String>> {
        self.refresh_tokens.lock().unwrap().clone()
    }

    /// Authorization headers seen by the refresh endpoint
    pub fn refresh_bearers(&self) -> Vec<Option<String>> {
        self.refresh_bearers.lock().unwrap().clone()
    }

    /// Path and bearer of every non-refresh request, in arrival order
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let bearer = bearer(headers);
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), bearer.clone()));
        bearer
    }

    fn authorized(&self, bearer: &Option<String>) -> bool {
        bearer.as_deref() == Some(self.valid_token.lock().unwrap().as_str())
    }
}

/// Mock backend bound to an ephemeral local port
pub struct MockBackend {
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockBackend {
    /// Start a backend that accepts `tok1` until it is expired
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        *state.valid_token.lock().unwrap() = "tok1".to_string();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let app = Router::new()
            .route("/auth/refresh", post(handle_refresh))
            .route("/users/login", post(handle_login))
            .route("/users/me", get(handle_me))
            .route("/users/logout", get(handle_logout))
            .route("/admin/users", get(handle_list_users))
            .route("/echo/:name", get(handle_echo))
            .route("/forbidden", get(handle_forbidden))
            .route("/boom", get(handle_boom))
            .route("/always-401", get(handle_always_unauthorized))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            state,
            shutdown_tx: Some(shutdown_tx),
            port,
        }
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Coordinator against this backend, holding the given credentials
    pub fn coordinator(&self, credentials: Option<Credentials>) -> AuthCoordinator {
        self.coordinator_with(credentials, CoordinatorOptions::default())
    }

    pub fn coordinator_with(
        &self,
        credentials: Option<Credentials>,
        options: CoordinatorOptions,
    ) -> AuthCoordinator {
        let transport = HttpTransport::new(&self.url(), 16, 5, 30).unwrap();
        let store = match credentials {
            Some(credentials) => MemoryCredentialStore::with_credentials(credentials),
            None => MemoryCredentialStore::new(),
        };
        AuthCoordinator::new(Arc::new(transport), Arc::new(store), options).unwrap()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
        .into_response()
}

fn user_json() -> serde_json::Value {
    json!({
        "id": USER_ID,
        "email": EMAIL,
        "first_name": "Asha",
        "last_name": "Rai",
        "access_roles": ["member", "admin"],
        "cooperative_roles": ["treasurer"]
    })
}

#[derive(Deserialize)]
struct RefreshQuery {
    token: Option<String>,
}

async fn handle_refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<RefreshQuery>,
) -> Response {
    let n = state.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
    state.refresh_tokens.lock().unwrap().push(query.token);
    state.refresh_bearers.lock().unwrap().push(bearer(&headers));

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let failure = *state.refresh_failure.lock().unwrap();
    if let Some(status) = failure {
        return (status, Json(json!({"detail": "Refresh token expired"}))).into_response();
    }

    let token = format!("tok{}", n + 1);
    *state.valid_token.lock().unwrap() = token.clone();

    Json(json!({"access_token": token, "token_type": "bearer"})).into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn handle_login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Response {
    state.record("/users/login", &headers);

    if body.email != EMAIL || body.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid email or password"})),
        )
            .into_response();
    }

    Json(json!({
        "token": {"access_token": state.valid_token(), "refresh_token": "ref1", "token_type": "bearer"},
        "user": user_json()
    }))
    .into_response()
}

async fn handle_me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let bearer = state.record("/users/me", &headers);
    if !state.authorized(&bearer) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn handle_logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/users/logout", &headers);
    Json(json!({"message": "Logged out"})).into_response()
}

async fn handle_list_users(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let bearer = state.record("/admin/users", &headers);
    if !state.authorized(&bearer) {
        return unauthorized();
    }
    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100);
    let users: Vec<_> = std::iter::repeat(user_json()).take(limit.min(3)).collect();
    Json(users).into_response()
}

async fn handle_echo(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let bearer = state.record(&format!("/echo/{}", name), &headers);
    if !state.authorized(&bearer) {
        return unauthorized();
    }
    Json(json!({"name": name})).into_response()
}

async fn handle_forbidden(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/forbidden", &headers);
    (
        StatusCode::FORBIDDEN,
        Json(json!({"detail": "Not enough permissions"})),
    )
        .into_response()
}

async fn handle_boom(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("/boom", &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

async fn handle_always_unauthorized(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Response {
    state.record("/always-401", &headers);
    unauthorized()
}
