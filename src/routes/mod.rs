//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - health check at `/`
/// - participant API under `/api/...`
/// - admin API under `/api/admin/...`
/// - Static SPA from `./static` with index fallback
/// - CORS from settings ("*" allows any origin)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    let cors = match state.settings.cors_origin_list() {
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(target: "voxrecord_backend", origin = %o, "Ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(parsed)).allow_methods(Any).allow_headers(Any)
        }
    };

    Router::new()
        // Health
        .route("/", get(http::http_health))
        // Participant API
        .route("/api/login", post(http::http_login))
        .route("/api/next_task", get(http::http_next_task))
        .route("/api/upload_recording", post(http::http_upload_recording))
        .route("/api/upload_recording_b64", post(http::http_upload_recording_b64))
        // Admin API
        .route("/api/admin/export_metadata", get(http::http_export_metadata))
        .route("/api/admin/user_stats", get(http::http_user_stats))
        // Recordings are several MB of audio; the default 2 MB body cap is
        // too small for them.
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
