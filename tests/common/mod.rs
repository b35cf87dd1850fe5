#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use receipt_drop::{
    config::UploadPolicy, routes::routes::routes, services::storage_service::UploadStore,
    state::AppState,
};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt; // for .oneshot()

pub const BOUNDARY: &str = "X-BOUNDARY";

pub struct TestApp {
    _dir: TempDir,
    pub uploads: PathBuf,
    pub public: PathBuf,
    pub router: Router,
}

impl TestApp {
    pub async fn new(policy: UploadPolicy) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = dir.path().join("uploads");
        let public = dir.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::write(public.join("index.html"), "<h1>front</h1>").unwrap();

        let store = UploadStore::new(&uploads);
        store.init().await.expect("init upload dir");
        let router = routes(AppState::new(store, policy, &public));

        Self {
            _dir: dir,
            uploads,
            public,
            router,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    pub async fn send_json(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.send(req).await;
        let json = serde_json::from_slice(&body)
            .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&body)));
        (status, json)
    }

    /// Sorted names of everything in the upload directory.
    pub fn upload_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.uploads)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    },
}

pub fn file<'a>(name: &'a str, filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Part<'a> {
    Part::File {
        name,
        filename,
        content_type: Some(content_type),
        data,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        match part {
            Part::Text(name, value) => {
                body.extend(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    )
                    .as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                if let Some(ct) = content_type {
                    body.extend(format!("Content-Type: {ct}\r\n").as_bytes());
                }
                body.extend(b"\r\n");
                body.extend_from_slice(data);
                body.extend(b"\r\n");
            }
        }
    }
    body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
