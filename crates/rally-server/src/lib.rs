//! Rally server library logic.

pub mod api;
pub mod api_events;
pub mod config;
pub mod middleware;
pub mod reminder;

use axum::{
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use rally_db::DbPool;
use rally_service::EventService;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Event business rules and the notification dispatcher behind them.
    pub service: EventService,
    /// Users allowed to call `/api/admin` endpoints.
    pub admin_user_ids: Arc<HashSet<String>>,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/events", post(api_events::create_event_handler))
        .route(
            "/api/events/{eventId}",
            get(api_events::get_event_handler).patch(api_events::update_event_handler),
        )
        .route(
            "/api/events/{eventId}/cancel",
            post(api_events::cancel_event_handler),
        )
        .route(
            "/api/events/{eventId}/restore",
            post(api_events::restore_event_handler),
        )
        .route(
            "/api/events/{eventId}/guests",
            put(api_events::update_guest_list_handler),
        )
        .route(
            "/api/events/{eventId}/attendance",
            put(api_events::respond_handler),
        )
        .route("/api/feeds/{feed}", get(api_events::feed_handler))
        .route("/api/search", get(api_events::search_handler))
        .route(
            "/api/admin/events/{eventId}",
            patch(api_events::admin_update_event_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
