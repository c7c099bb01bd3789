use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "test@example.com";
pub const DEMO_PASSWORD: &str = "testpassword123";

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
const ACCESS_MAX_AGE: u32 = 15 * 60;
const REFRESH_MAX_AGE: u32 = 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub mobile_number: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub course_code: String,
    pub course_name: String,
    pub credits: u8,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Default)]
struct Store {
    users: HashMap<String, (String, User)>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    courses: Vec<Course>,
}

/// Shared server state. Clones observe the same store, so tests keep a
/// handle to expire tokens while the server runs.
#[derive(Clone, Default)]
pub struct AuthState {
    store: Arc<RwLock<Store>>,
    refresh_calls: Arc<AtomicUsize>,
}

impl AuthState {
    /// State seeded with the demo user and a few courses.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        store.users.insert(
            DEMO_EMAIL.to_string(),
            (
                DEMO_PASSWORD.to_string(),
                User {
                    email: DEMO_EMAIL.to_string(),
                    first_name: "Test".to_string(),
                    last_name: "User".to_string(),
                    full_name: "Test User".to_string(),
                    mobile_number: Some("9876543210".to_string()),
                },
            ),
        );
        store.courses = vec![
            course("CS101", "Introduction to Programming", 4),
            course("MA201", "Linear Algebra", 3),
            course("PH110", "Engineering Physics", 4),
        ];
        Self {
            store: Arc::new(RwLock::new(store)),
            refresh_calls: Arc::default(),
        }
    }

    /// Invalidate every issued access token; refresh tokens stay valid.
    pub async fn expire_access_tokens(&self) {
        self.store.write().await.access_tokens.clear();
    }

    /// Invalidate every issued refresh token.
    pub async fn revoke_refresh_tokens(&self) {
        self.store.write().await.refresh_tokens.clear();
    }

    /// Number of calls received by the refresh endpoint.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    async fn authenticated_user(&self, headers: &HeaderMap) -> Option<User> {
        let token = cookie(headers, ACCESS_COOKIE)?;
        let store = self.store.read().await;
        let email = store.access_tokens.get(&token)?;
        store.users.get(email).map(|(_, user)| user.clone())
    }
}

fn course(code: &str, name: &str, credits: u8) -> Course {
    Course {
        course_code: code.to_string(),
        course_name: name.to_string(),
        credits,
    }
}

pub fn app() -> Router {
    app_with_state(AuthState::seeded())
}

pub fn app_with_state(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login/", post(login))
        .route("/auth/token/refresh/", post(refresh))
        .route("/auth/logout/", post(logout))
        .route("/auth/me/", get(profile))
        .route("/courses/courses/", get(list_courses))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AuthState::seeded()).await
}

pub async fn run_with_state(listener: TcpListener, state: AuthState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn set_cookie(name: &str, value: &str, max_age: u32) -> (header::HeaderName, String) {
    (
        header::SET_COOKIE,
        format!("{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age}"),
    )
}

fn not_authenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Authentication credentials were not provided."})),
    )
        .into_response()
}

async fn login(State(state): State<AuthState>, Json(input): Json<LoginRequest>) -> Response {
    let mut store = state.store.write().await;
    let user = match store.users.get(&input.email) {
        Some((password, user)) if *password == input.password => user.clone(),
        _ => {
            debug!(email = %input.email, "rejected login");
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid credentials"}))).into_response();
        }
    };
    let access = Uuid::new_v4().to_string();
    let refresh = Uuid::new_v4().to_string();
    store.access_tokens.insert(access.clone(), user.email.clone());
    store.refresh_tokens.insert(refresh.clone(), user.email.clone());
    info!(email = %user.email, "login");

    (
        StatusCode::OK,
        AppendHeaders([
            set_cookie(ACCESS_COOKIE, &access, ACCESS_MAX_AGE),
            set_cookie(REFRESH_COOKIE, &refresh, REFRESH_MAX_AGE),
        ]),
        Json(json!({"message": "Login successful", "user": user})),
    )
        .into_response()
}

async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let Some(refresh) = cookie(&headers, REFRESH_COOKIE) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No refresh token provided"}))).into_response();
    };

    let mut store = state.store.write().await;
    let Some(email) = store.refresh_tokens.get(&refresh).cloned() else {
        debug!("rejected refresh token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid or expired refresh token"})),
        )
            .into_response();
    };
    let access = Uuid::new_v4().to_string();
    store.access_tokens.insert(access.clone(), email.clone());
    info!(%email, "token refreshed");

    (
        StatusCode::OK,
        AppendHeaders([set_cookie(ACCESS_COOKIE, &access, ACCESS_MAX_AGE)]),
        Json(json!({"message": "Token refreshed successfully"})),
    )
        .into_response()
}

async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    if state.authenticated_user(&headers).await.is_none() {
        return not_authenticated();
    }
    let mut store = state.store.write().await;
    if let Some(refresh) = cookie(&headers, REFRESH_COOKIE) {
        store.refresh_tokens.remove(&refresh);
    }
    if let Some(access) = cookie(&headers, ACCESS_COOKIE) {
        store.access_tokens.remove(&access);
    }

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([set_cookie(ACCESS_COOKIE, "", 0), set_cookie(REFRESH_COOKIE, "", 0)]),
    )
        .into_response()
}

async fn profile(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    match state.authenticated_user(&headers).await {
        Some(user) => Json(user).into_response(),
        None => not_authenticated(),
    }
}

async fn list_courses(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    if state.authenticated_user(&headers).await.is_none() {
        return not_authenticated();
    }
    let courses = state.store.read().await.courses.clone();
    Json(json!({
        "count": courses.len(),
        "next": null,
        "previous": null,
        "results": courses,
    }))
    .into_response()
}
