//! `logbook serve`: HTTP JSON API over the experience engine.
//!
//! Security features:
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional client API key (`Authorization: Bearer` or `X-API-Key`)
//! - Optional admin key (`X-Admin-Key`) required for admin deletes
//!
//! Endpoints:
//! - GET    /health                             - Server status (exempt from auth)
//! - GET    /books                              - Books with course counts
//! - POST   /experiences                        - Submit a record
//! - GET    /experiences                        - List records (filters in query)
//! - GET    /experiences/{id}                   - One record
//! - PUT    /experiences/{id}                   - Owner edit of a pending record
//! - DELETE /experiences/{id}                   - Owner or admin delete
//! - POST   /experiences/{id}/confirm           - Approver confirm with PIN
//! - POST   /experiences/{id}/reject            - Approver reject with PIN
//! - POST   /experiences/{id}/cancel            - Owner self-cancel
//! - POST   /experiences/bulk/confirm           - Bulk confirm under one PIN
//! - POST   /experiences/bulk/reject            - Bulk reject under one PIN
//! - GET    /books/{id}/progress/{student_id}   - Student progress
//! - GET    /books/{id}/cohort                  - Cohort progress
//!
//! Errors are `{"error": message, "kind": code}`.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_bulk_confirm, handle_bulk_reject, handle_cancel, handle_cohort, handle_confirm,
    handle_delete, handle_edit, handle_get_experience, handle_health, handle_list_books,
    handle_list_experiences, handle_not_found, handle_progress, handle_reject, handle_submit,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::seed::MemoryEngine;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Server settings resolved from config, environment, and flags.
#[derive(Debug, Clone)]
pub(crate) struct ServeSettings {
    pub(crate) port: u16,
    pub(crate) rate_limit: u64,
    pub(crate) api_key: Option<String>,
    pub(crate) admin_api_key: Option<String>,
}

/// JSON error response with the given status, message, and error kind.
pub(crate) fn json_error(status: StatusCode, message: &str, kind: &str) -> Response {
    (
        status,
        Json(serde_json::json!({"error": message, "kind": kind})),
    )
        .into_response()
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/books", get(handle_list_books))
        .route("/books/{id}/progress/{student_id}", get(handle_progress))
        .route("/books/{id}/cohort", get(handle_cohort))
        .route(
            "/experiences",
            get(handle_list_experiences).post(handle_submit),
        )
        .route("/experiences/bulk/confirm", post(handle_bulk_confirm))
        .route("/experiences/bulk/reject", post(handle_bulk_reject))
        .route(
            "/experiences/{id}",
            get(handle_get_experience)
                .put(handle_edit)
                .delete(handle_delete),
        )
        .route("/experiences/{id}/confirm", post(handle_confirm))
        .route("/experiences/{id}/reject", post(handle_reject))
        .route("/experiences/{id}/cancel", post(handle_cancel))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Serve `engine` over HTTP until Ctrl+C.
pub(crate) async fn start_server(
    settings: ServeSettings,
    engine: MemoryEngine,
) -> Result<(), Box<dyn std::error::Error>> {
    if settings.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    if settings.admin_api_key.is_some() {
        tracing::info!("admin deletes enabled");
    }
    tracing::info!(
        rate_limit = settings.rate_limit,
        "rate limit: requests per minute per IP"
    );

    let state = Arc::new(AppState {
        engine,
        rate_limiter: RateLimiter::new(settings.rate_limit),
        api_key: settings.api_key,
        admin_api_key: settings.admin_api_key,
    });

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("logbook listening on http://{}", addr);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
