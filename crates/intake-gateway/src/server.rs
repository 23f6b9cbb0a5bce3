//! HTTP server wiring using Axum.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use intake_core::IntakeConfig;
use intake_scheduler::StatusScheduler;
use intake_store::IntakeDb;

use crate::hub::EventHub;

/// Shared state for the gateway.
pub struct AppState {
    pub config: IntakeConfig,
    pub db: Arc<IntakeDb>,
    pub scheduler: Arc<StatusScheduler>,
    pub hub: Arc<EventHub>,
    pub jwt_secret: String,
    pub start_time: std::time::Instant,
    /// Rate limiter: username → (attempt_count, first_attempt_time).
    pub login_attempts: Mutex<HashMap<String, (u32, std::time::Instant)>>,
}

/// Bearer-token auth middleware — validates `Authorization: Bearer <jwt>`
/// and inserts the claims as a request extension.
async fn require_auth(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if let Some(token) = auth_header.strip_prefix("Bearer ") {
        if let Ok(claims) = crate::auth::validate_token(token, &state.jwt_secret) {
            let mut req = req;
            req.extensions_mut().insert(claims);
            return next.run(req).await;
        }
    }

    axum::response::Response::builder()
        .status(axum::http::StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(
            serde_json::json!({"ok": false, "error": "Unauthorized — invalid or missing bearer token"})
                .to_string(),
        ))
        .unwrap()
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Protected routes — require a valid bearer token
    let protected = Router::new()
        .route("/api/auth/me", get(crate::routes::current_user))
        .route("/api/applications", get(crate::routes::list_applications))
        .route("/api/applications", post(crate::routes::create_application))
        .route("/api/applications/{id}", get(crate::routes::get_application))
        .route(
            "/api/applications/{id}/status",
            put(crate::routes::update_application_status),
        )
        .route(
            "/api/applications/{id}",
            axum::routing::delete(crate::routes::delete_application),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Public routes — /ws authenticates itself via ?access_token=
    let public = Router::new()
        .route("/health", get(crate::routes::health_check))
        .route("/api/auth/login", post(crate::routes::login))
        .route("/ws", get(crate::ws::ws_handler));

    protected
        .merge(public)
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(std::time::Duration::from_secs(3600));

            let origins: Vec<_> = state
                .config
                .server
                .cors_origins
                .iter()
                .filter_map(|s| s.parse::<axum::http::HeaderValue>().ok())
                .collect();
            if origins.is_empty() {
                // Development fallback — allow all origins
                cors.allow_origin(Any)
            } else {
                cors.allow_origin(origins)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Intake server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
