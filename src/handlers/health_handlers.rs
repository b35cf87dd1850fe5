//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness (`{"ok":true}`)
//! - GET /readyz   -> readiness that checks the upload directory is writable

use crate::{services::storage_service::STAGING_PREFIX, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Always 200; never touches the disk.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { ok: true }))
}

/// `GET /readyz`
///
/// Writes, reads back and deletes a check file in the upload directory.
/// The check file uses the staging prefix so a crash mid-check leaves nothing
/// that startup cleanup would not remove.
///
/// HTTP 200 when the round-trip succeeds, HTTP 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let tmp_path = state
        .store
        .base_path
        .join(format!("{}readyz-{}", STAGING_PREFIX, Uuid::new_v4()));
    let disk_check = match fs::write(&tmp_path, b"readyz").await {
        Ok(_) => match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => match fs::remove_file(&tmp_path).await {
                Ok(_) => (true, None::<String>),
                Err(e) => (true, Some(format!("could not remove tmp file: {}", e))),
            },
            Ok(_) => {
                let _ = fs::remove_file(&tmp_path).await;
                (false, Some("file content mismatch".to_string()))
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                (false, Some(format!("could not read tmp file: {}", e)))
            }
        },
        Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
    };

    let ok = disk_check.0;
    let mut checks = HashMap::new();
    checks.insert(
        "disk",
        CheckStatus {
            ok,
            error: disk_check.1,
        },
    );

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ok, checks }))
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ReadyResponse {
    ok: bool,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
