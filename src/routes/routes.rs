//! Defines every route of the service.
//!
//! - `POST /upload`  — multipart submission (photo, optional qr, payer fields)
//! - `GET  /healthz` — liveness
//! - `GET  /readyz`  — upload directory round-trip
//! - anything else   — front-end, except `/uploads/*` which is forbidden

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        static_handlers::serve_frontend,
        upload_handlers::upload_submission,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the application router with its state attached.
///
/// File size is governed per part by the upload policy, so the framework's
/// default body limit is disabled.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload", post(upload_submission))
        .fallback(serve_frontend)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
