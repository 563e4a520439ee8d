//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    bulk_set_active_handler, chat_history_handler, chat_socket_handler, check_comment_handler,
    check_post_handler, clear_chat_handler, create_rule_handler, health_handler,
    list_audit_handler, list_rules_handler, update_rule_handler,
};

/// Upper bound on a single REST request. Upgraded sockets are not affected.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    /// None when running on in-memory stores
    pub db_pool: Option<PgPool>,
    pub deps: Arc<ServerDeps>,
}

impl AxumAppState {
    pub fn new(db_pool: Option<PgPool>, deps: ServerDeps) -> Self {
        Self {
            db_pool,
            deps: Arc::new(deps),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // No configured origins: allow any (development)
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}

/// Build the Axum application router
pub fn build_app(state: AxumAppState, allowed_origins: &[String]) -> Router {
    let api = Router::new()
        // Moderation
        .route("/api/posts/check", post(check_post_handler))
        .route("/api/comments/check", post(check_comment_handler))
        // Chat history
        .route("/api/chat/:room/history", get(chat_history_handler))
        // Admin
        .route(
            "/api/admin/rules",
            get(list_rules_handler).post(create_rule_handler),
        )
        .route("/api/admin/rules/bulk", post(bulk_set_active_handler))
        .route("/api/admin/rules/:id", put(update_rule_handler))
        .route("/api/admin/audit", get(list_audit_handler))
        .route("/api/admin/chat/:room", delete(clear_chat_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    Router::new()
        .merge(api)
        // WebSocket chat (no request timeout)
        .route("/ws/chat/:room", get(chat_socket_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
