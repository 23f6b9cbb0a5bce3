//! HTTP route handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use intake_store::{ApplicationKind, ApplicationStatus, NewApplication};

use crate::auth::Claims;
use crate::server::AppState;

/// Maximum accepted message length for an application.
const MAX_MESSAGE_LEN: usize = 1000;

/// Login attempts allowed per username inside one window.
const MAX_LOGIN_ATTEMPTS: u32 = 5;
/// Rate-limit window in seconds.
const LOGIN_WINDOW_SECS: u64 = 300;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn ok_json(value: serde_json::Value) -> ApiResponse {
    (StatusCode::OK, Json(value))
}

fn not_found(what: &str) -> ApiResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"ok": false, "error": format!("{what} not found")})),
    )
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> ApiResponse {
    tracing::error!("{context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"ok": false, "error": "Internal error"})),
    )
}

// ─── Health ──────────────────────────────────────

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "pending_transitions": state.scheduler.pending_count(),
    }))
}

// ─── Auth ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Sliding-window limiter: too many attempts for one username → back off.
fn login_rate_limited(state: &AppState, username: &str) -> bool {
    let mut attempts = state.login_attempts.lock().unwrap();
    let now = std::time::Instant::now();
    if let Some((_, first_at)) = attempts.get(username) {
        if now.duration_since(*first_at).as_secs() >= LOGIN_WINDOW_SECS {
            attempts.remove(username);
        }
    }
    let entry = attempts.entry(username.to_string()).or_insert((0, now));
    entry.0 += 1;
    entry.0 > MAX_LOGIN_ATTEMPTS
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResponse {
    if req.username.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"ok": false, "error": "Username and password are required"})),
        );
    }

    if login_rate_limited(&state, &req.username) {
        tracing::warn!("login: rate limit hit for '{}'", req.username);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({"ok": false, "error": "Too many login attempts, try again later"})),
        );
    }

    let user = match state.db.get_user_by_username(&req.username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"ok": false, "error": "Invalid username or password"})),
            );
        }
        Err(e) => return internal_error("login: user lookup", e),
    };

    // bcrypt verification is CPU-bound — keep it off the async runtime
    let password = req.password.clone();
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || crate::auth::verify_password(&password, &hash))
        .await
        .unwrap_or(false);

    if !verified {
        tracing::warn!("login: invalid credentials for '{}'", req.username);
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "Invalid username or password"})),
        );
    }

    match crate::auth::create_token(
        user.id,
        &user.username,
        state.config.auth.token_ttl_hours,
        &state.jwt_secret,
    ) {
        Ok(token) => ok_json(serde_json::json!({"ok": true, "token": token})),
        Err(e) => internal_error("login: token issue", e),
    }
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResponse {
    let Some(user_id) = claims.user_id() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "Invalid token subject"})),
        );
    };
    match state.db.get_user_by_id(user_id) {
        Ok(Some(user)) => ok_json(
            serde_json::json!({"ok": true, "user": {"id": user.id, "username": user.username}}),
        ),
        Ok(None) => not_found("User"),
        Err(e) => internal_error("current_user", e),
    }
}

// ─── Applications ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub kind: ApplicationKind,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ApplicationStatus,
}

pub async fn list_applications(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.db.list_applications() {
        Ok(apps) => {
            let count = apps.len();
            ok_json(serde_json::json!({
                "ok": true,
                "applications": apps,
                "count": count,
            }))
        }
        Err(e) => internal_error("list_applications", e),
    }
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse {
    match state.db.get_application(id) {
        Ok(Some(app)) => ok_json(serde_json::json!({"ok": true, "application": app})),
        Ok(None) => not_found("Application"),
        Err(e) => internal_error("get_application", e),
    }
}

pub async fn create_application(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateApplicationRequest>,
) -> ApiResponse {
    let Some(user_id) = claims.user_id() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "Invalid token subject"})),
        );
    };
    if req.message.is_empty() || req.message.chars().count() > MAX_MESSAGE_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "ok": false,
                "error": format!("Message must be 1..{MAX_MESSAGE_LEN} characters"),
            })),
        );
    }

    let new = NewApplication {
        date: Utc::now(),
        kind: req.kind,
        status: ApplicationStatus::Submitted,
        message: req.message,
        user_id,
    };
    let app = match state.db.create_application(&new) {
        Ok(app) => app,
        Err(e) => return internal_error("create_application", e),
    };

    // Hand it to the scheduler for automatic completion
    state.scheduler.register(app.id);
    tracing::info!("Application {} created by user {user_id}", app.id);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"ok": true, "application": app})),
    )
}

pub async fn update_application_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusUpdateRequest>,
) -> ApiResponse {
    let mut app = match state.db.get_application(id) {
        Ok(Some(app)) => app,
        Ok(None) => return not_found("Application"),
        Err(e) => return internal_error("update_application_status", e),
    };

    // Leaving the submitted state by hand takes the entry away from the
    // scheduler before anything is persisted.
    if app.status == ApplicationStatus::Submitted && req.status != ApplicationStatus::Submitted {
        state.scheduler.unregister(id);
    }

    app.status = req.status;
    match state.db.update_application(&app) {
        Ok(true) => {
            state.hub.publish(&app);
            ok_json(serde_json::json!({"ok": true, "application": app}))
        }
        Ok(false) => not_found("Application"),
        Err(e) => internal_error("update_application_status", e),
    }
}

pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse {
    // Idempotent regardless of current status
    state.scheduler.unregister(id);

    match state.db.delete_application(id) {
        Ok(true) => {
            tracing::info!("Application {id} deleted");
            ok_json(serde_json::json!({"ok": true}))
        }
        Ok(false) => not_found("Application"),
        Err(e) => internal_error("delete_application", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventHub;
    use intake_core::IntakeConfig;
    use intake_scheduler::StatusScheduler;
    use intake_store::IntakeDb;

    fn test_state() -> State<Arc<AppState>> {
        let db = Arc::new(IntakeDb::open_in_memory().unwrap());
        let hub = Arc::new(EventHub::new());
        let config = IntakeConfig::default();
        let scheduler = Arc::new(StatusScheduler::new(
            config.scheduler.clone(),
            db.clone(),
            hub.clone(),
        ));
        State(Arc::new(AppState {
            config,
            db,
            scheduler,
            hub,
            jwt_secret: "test-secret".into(),
            start_time: std::time::Instant::now(),
            login_attempts: std::sync::Mutex::new(std::collections::HashMap::new()),
        }))
    }

    fn seed_user(state: &State<Arc<AppState>>, username: &str, password: &str) -> i64 {
        let hash = crate::auth::hash_password(password).unwrap();
        state.0.db.create_user(username, &hash).unwrap()
    }

    fn claims_for(user_id: i64, username: &str) -> Extension<Claims> {
        Extension(Claims {
            sub: user_id.to_string(),
            name: username.to_string(),
            exp: usize::MAX,
            iat: 0,
        })
    }

    fn create_request() -> Json<CreateApplicationRequest> {
        Json(CreateApplicationRequest {
            kind: ApplicationKind::Request,
            message: "please review my request".into(),
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = test_state();
        let Json(body) = health_check(state).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_login_success() {
        let state = test_state();
        seed_user(&state, "alice", "password123");

        let (status, Json(body)) = login(
            state.clone(),
            Json(LoginRequest {
                username: "alice".into(),
                password: "password123".into(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let token = body["token"].as_str().unwrap();
        let claims = crate::auth::validate_token(token, "test-secret").unwrap();
        assert_eq!(claims.name, "alice");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let state = test_state();
        seed_user(&state, "alice", "password123");

        let (status, Json(body)) = login(
            state,
            Json(LoginRequest {
                username: "alice".into(),
                password: "wrong".into(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let state = test_state();
        let (status, _) = login(
            state,
            Json(LoginRequest {
                username: "nobody".into(),
                password: "whatever".into(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let state = test_state();
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            assert!(!login_rate_limited(&state.0, "alice"));
        }
        assert!(login_rate_limited(&state.0, "alice"));
        // Other usernames are unaffected
        assert!(!login_rate_limited(&state.0, "bob"));
    }

    #[tokio::test]
    async fn test_create_application_registers_pending() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");

        let (status, Json(body)) = create_application(
            state.clone(),
            claims_for(user_id, "alice"),
            create_request(),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let id = body["application"]["id"].as_i64().unwrap();
        assert_eq!(body["application"]["status"], "submitted");

        let stored = state.0.db.get_application(id).unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Submitted);
        assert!(state.0.scheduler.is_pending(id));
    }

    #[tokio::test]
    async fn test_create_application_rejects_long_message() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");

        let (status, _) = create_application(
            state.clone(),
            claims_for(user_id, "alice"),
            Json(CreateApplicationRequest {
                kind: ApplicationKind::Complaint,
                message: "x".repeat(MAX_MESSAGE_LEN + 1),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.0.scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_status_change_unregisters() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");
        let mut events = state.0.hub.subscribe();

        let (_, Json(body)) = create_application(
            state.clone(),
            claims_for(user_id, "alice"),
            create_request(),
        )
        .await;
        let id = body["application"]["id"].as_i64().unwrap();
        assert!(state.0.scheduler.is_pending(id));

        let (status, Json(body)) = update_application_status(
            state.clone(),
            Path(id),
            Json(StatusUpdateRequest {
                status: ApplicationStatus::Cancelled,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["application"]["status"], "cancelled");
        assert!(!state.0.scheduler.is_pending(id));
        let stored = state.0.db.get_application(id).unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Cancelled);

        // Manual changes are broadcast too
        let event = events.recv().await.unwrap();
        assert_eq!(event.application.id, id);
        assert_eq!(event.application.status, ApplicationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_status_missing_application() {
        let state = test_state();
        let (status, _) = update_application_status(
            state,
            Path(404),
            Json(StatusUpdateRequest {
                status: ApplicationStatus::Completed,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_application_unregisters() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");

        let (_, Json(body)) = create_application(
            state.clone(),
            claims_for(user_id, "alice"),
            create_request(),
        )
        .await;
        let id = body["application"]["id"].as_i64().unwrap();

        let (status, _) = delete_application(state.clone(), Path(id)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.0.scheduler.is_pending(id));
        assert!(state.0.db.get_application(id).unwrap().is_none());

        // Second delete: nothing left
        let (status, _) = delete_application(state, Path(id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_application_not_found() {
        let state = test_state();
        let (status, _) = get_application(state, Path(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_current_user() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");

        let (status, Json(body)) =
            current_user(state.clone(), claims_for(user_id, "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");

        let (status, _) = current_user(state, claims_for(999, "ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_applications() {
        let state = test_state();
        let user_id = seed_user(&state, "alice", "pw");
        for _ in 0..2 {
            create_application(state.clone(), claims_for(user_id, "alice"), create_request())
                .await;
        }

        let (status, Json(body)) = list_applications(state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["applications"].as_array().unwrap().len(), 2);
    }
}
