//! In-process Kurso backend for integration tests
//!
//! A small axum app that speaks just enough of the real API: credential
//! login, refresh-token rotation, a handful of authenticated resources, and
//! the websocket channel. Tests steer it through [`TestServer`] to expire
//! tokens, fail refreshes, or push real-time events.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use client::auth::{LoginRequest, LoginResponse, LogoutRequest};
use client::http::{RefreshRequest, RefreshResponse};
use client::models::{Course, Notification, Role, User};
use client::{Client, ClientConfig};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const TEST_EMAIL: &str = "ada@example.com";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

static INIT_LOGGING: Once = Once::new();

struct TokenSet {
    access: String,
    refresh: String,
}

/// Mutable backend state shared by every route
pub struct ServerState {
    user: User,
    course: Course,
    notification: Notification,
    tokens: Mutex<TokenSet>,
    generation: AtomicUsize,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    courses_calls: AtomicUsize,
    ws_connects: AtomicUsize,
    refresh_should_fail: AtomicBool,
    reject_all_bearers: AtomicBool,
    events: broadcast::Sender<String>,
}

impl ServerState {
    fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            user: User {
                id: Uuid::new_v4(),
                name: "Ada Student".to_string(),
                email: TEST_EMAIL.to_string(),
                role: Role::Student,
            },
            course: Course {
                id: Uuid::new_v4(),
                title: "Rust for Educators".to_string(),
                description: "Ownership explained with classroom props".to_string(),
                instructor: "Grace Instructor".to_string(),
                lesson_count: 2,
                updated_at: Utc::now(),
            },
            notification: Notification {
                id: Uuid::new_v4(),
                title: "Welcome to Kurso".to_string(),
                body: "Your first lesson is ready".to_string(),
                read: false,
                created_at: Utc::now(),
            },
            tokens: Mutex::new(TokenSet {
                access: String::new(),
                refresh: String::new(),
            }),
            generation: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            courses_calls: AtomicUsize::new(0),
            ws_connects: AtomicUsize::new(0),
            refresh_should_fail: AtomicBool::new(false),
            reject_all_bearers: AtomicBool::new(false),
            events,
        }
    }

    /// Issue the next token generation, replacing the current pair
    fn mint(&self) -> (String, String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{generation}");
        let refresh = format!("refresh-{generation}");
        let mut tokens = self.tokens.lock().unwrap();
        tokens.access = access.clone();
        tokens.refresh = refresh.clone();
        (access, refresh)
    }

    fn access_is_current(&self, presented: &str) -> bool {
        !presented.is_empty() && presented == self.tokens.lock().unwrap().access
    }

    fn refresh_is_current(&self, presented: &str) -> bool {
        !presented.is_empty() && presented == self.tokens.lock().unwrap().refresh
    }
}

/// Running backend plus the handles tests use to steer it
pub struct TestServer {
    pub state: Arc<ServerState>,
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind the mock backend on an ephemeral port and serve it
pub async fn spawn() -> TestServer {
    INIT_LOGGING.call_once(|| common::logging::init("debug"));

    let state = Arc::new(ServerState::new());
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/courses", get(list_courses))
        .route("/api/v1/courses/:id", get(course_detail))
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/:id/read", post(mark_notification_read))
        .route("/api/v1/chat/messages", post(send_message))
        .route("/api/v1/forbidden", get(forbidden))
        .route("/api/v1/broken", get(broken))
        .route("/api/v1/validate", post(validate))
        .route("/ws", get(ws_upgrade))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server died");
    });

    TestServer {
        state,
        addr,
        handle,
    }
}

impl TestServer {
    /// Client configuration pointing at this server
    pub fn config(&self, storage_dir: &std::path::Path) -> ClientConfig {
        ClientConfig {
            base_url: format!("http://{}", self.addr),
            api_version: "v1".to_string(),
            request_timeout_secs: 2,
            session_timeout_secs: 1800,
            realtime_url: format!("ws://{}/ws", self.addr),
            monitor_interval_secs: 60,
            storage_dir: storage_dir.to_string_lossy().into_owned(),
            log_level: "debug".to_string(),
        }
    }

    /// Build a client wired to this server, storing state under `storage_dir`
    pub fn client(&self, storage_dir: &std::path::Path) -> Client {
        Client::new(self.config(storage_dir)).expect("Failed to build client")
    }

    /// Invalidate the outstanding access token while keeping refresh valid
    pub fn expire_access(&self) {
        self.state.tokens.lock().unwrap().access.push_str("-expired");
    }

    /// Make the next refresh attempts fail with a 401
    pub fn fail_refresh(&self) {
        self.state.refresh_should_fail.store(true, Ordering::SeqCst);
    }

    /// Answer 401 to every bearer-authenticated request from now on
    pub fn reject_all_bearers(&self) {
        self.state.reject_all_bearers.store(true, Ordering::SeqCst);
    }

    /// Push a real-time frame to every connected channel
    pub fn push_event(&self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        let _ = self.state.events.send(frame);
    }

    pub fn user(&self) -> User {
        self.state.user.clone()
    }

    pub fn course(&self) -> Course {
        self.state.course.clone()
    }

    pub fn notification(&self) -> Notification {
        self.state.notification.clone()
    }

    pub fn current_access(&self) -> String {
        self.state.tokens.lock().unwrap().access.clone()
    }

    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    pub fn courses_calls(&self) -> usize {
        self.state.courses_calls.load(Ordering::SeqCst)
    }

    pub fn ws_connects(&self) -> usize {
        self.state.ws_connects.load(Ordering::SeqCst)
    }
}

/// Poll `check` until it passes or the deadline hits
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..150 {
        if check().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("Timed out waiting for {what}");
}

fn bearer(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default()
}

fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = bearer(headers);
    if state.reject_all_bearers.load(Ordering::SeqCst) || !state.access_is_current(presented) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token expired" })),
        )
            .into_response());
    }
    Ok(())
}

async fn login(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    if request.email != TEST_EMAIL || request.password != TEST_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }

    let (access_token, refresh_token) = state.mint();
    Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: 900,
        user: state.user.clone(),
    })
    .into_response()
}

async fn refresh(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RefreshRequest>,
) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if state.refresh_should_fail.load(Ordering::SeqCst)
        || !state.refresh_is_current(&request.refresh_token)
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Refresh token revoked" })),
        )
            .into_response();
    }

    let (access_token, refresh_token) = state.mint();
    Json(RefreshResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: 900,
    })
    .into_response()
}

async fn logout(
    State(state): State<Arc<ServerState>>,
    Json(_request): Json<LogoutRequest>,
) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true })).into_response()
}

async fn me(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    Json(state.user.clone()).into_response()
}

async fn list_courses(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    state.courses_calls.fetch_add(1, Ordering::SeqCst);
    Json(vec![state.course.clone()]).into_response()
}

async fn course_detail(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if id != state.course.id {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No such course" })),
        )
            .into_response();
    }

    let mut detail = serde_json::to_value(&state.course).expect("Course must serialize");
    detail["lessons"] = json!([
        {
            "id": Uuid::new_v4(),
            "course_id": state.course.id,
            "title": "Borrowing, live",
            "position": 1
        },
        {
            "id": Uuid::new_v4(),
            "course_id": state.course.id,
            "title": "Lifetimes without tears",
            "position": 2
        }
    ]);
    Json(detail).into_response()
}

async fn list_notifications(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    Json(vec![state.notification.clone()]).into_response()
}

async fn mark_notification_read(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    if id != state.notification.id {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No such notification" })),
        )
            .into_response();
    }

    let mut updated = state.notification.clone();
    updated.read = true;
    Json(updated).into_response()
}

async fn send_message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    Json(json!({
        "id": Uuid::new_v4(),
        "sender_id": state.user.id,
        "sender_name": state.user.name,
        "body": request["body"],
        "sent_at": Utc::now()
    }))
    .into_response()
}

async fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "message": "Students cannot grade themselves" })),
    )
        .into_response()
}

async fn broken() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server exploded" })),
    )
        .into_response()
}

async fn validate(Json(_body): Json<Value>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": "Validation failed",
            "errors": { "title": ["Required"] }
        })),
    )
        .into_response()
}

async fn ws_upgrade(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.get("token").cloned().unwrap_or_default();
    if !state.access_is_current(&token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut events = state.events.subscribe();
    // Counted only once the subscription exists, so tests that wait on the
    // connect count can push events without losing them
    state.ws_connects.fetch_add(1, Ordering::SeqCst);
    let _ = socket
        .send(Message::Text(json!({ "event": "connect" }).to_string()))
        .await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(frame) => {
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
