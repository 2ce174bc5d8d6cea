pub mod health;
pub mod report;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{HttpMakeSpan, HttpOnResponse};

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(report::home))
        .route("/analyze_image", post(report::analyze_image))
        .route("/submit_report", post(report::submit_report))
        .route("/download_pdf", post(report::download_pdf))
        .route("/send_email", post(report::send_email))
        .route("/api/health", get(health::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(HttpMakeSpan)
                .on_response(HttpOnResponse),
        )
        .with_state(state)
}
