//! Router assembly: HTTP endpoints, review store, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod error;
pub mod http;
pub mod reviews;

/// Build the application router with:
/// - question API under `/api/v1/...`
/// - review store under `/api/reviews/...` (JSON 405 for other methods)
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/topics", get(http::http_get_topics))
        .route("/api/v1/difficulties", get(http::http_get_difficulties))
        .route("/api/v1/questions", get(http::http_get_questions))
        .route("/api/v1/questions/generate", post(http::http_post_generate))
        .route("/api/v1/questions/review", post(http::http_post_question_review))
        .route("/api/v1/questions/export", get(http::http_get_export))
        .route("/api/v1/questions/import", post(http::http_post_import))
        .route("/api/v1/bank", get(http::http_get_bank))
        .route("/api/v1/bank/counts", get(http::http_get_bank_counts))
        .route(
            "/api/reviews/save",
            post(reviews::http_post_review).fallback(reviews::method_not_allowed),
        )
        .route(
            "/api/reviews/get",
            get(reviews::http_get_reviews).fallback(reviews::method_not_allowed),
        )
        .route(
            "/api/reviews/item",
            get(reviews::http_get_review).fallback(reviews::method_not_allowed),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
