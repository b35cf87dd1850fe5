//! Front-end serving.
//!
//! Every GET/HEAD that no route claims lands here: paths under `/uploads/`
//! are refused outright, existing files under the public directory are
//! streamed back, and anything else gets `index.html` so client-side routes
//! resolve.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;

/// Stored uploads are never served, nor listed.
pub const UPLOADS_PREFIX: &str = "/uploads/";

pub const INDEX_FILE: &str = "index.html";

pub async fn serve_frontend(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::not_found("Not Found"));
    }
    if uri.path().starts_with(UPLOADS_PREFIX) {
        return Ok((StatusCode::FORBIDDEN, "Forbidden").into_response());
    }

    let path = match resolve_asset(&state.public_dir, uri.path()).await {
        Some(asset) => asset,
        None => state.public_dir.join(INDEX_FILE),
    };
    let file = File::open(&path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            AppError::not_found("Not Found")
        } else {
            AppError::internal(err.to_string())
        }
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|err| AppError::internal(err.to_string()))?
        .len();

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(ReaderStream::new(file))
    };
    let mut response = Response::new(body);
    set_asset_headers(response.headers_mut(), &path, len);
    Ok(response)
}

/// Map a request path onto a regular file inside `root`.
///
/// Rejects dot segments, hidden entries, backslashes and control bytes
/// instead of trying to normalize them.
async fn resolve_asset(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut segments = 0usize;
    for segment in request_path.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('.')
            || segment
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b':')
        {
            return None;
        }
        path.push(segment);
        segments += 1;
    }
    if segments == 0 {
        return None;
    }
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Some(path),
        _ => None,
    }
}

fn set_asset_headers(headers: &mut HeaderMap, path: &Path, len: u64) {
    let content_type = HeaderValue::from_str(&content_type_for(path))
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

/// Content type guessed from the extension; text types are served as UTF-8.
fn content_type_for(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_().as_str() == "text" && mime.get_param("charset").is_none() {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.to_string()
    }
}
