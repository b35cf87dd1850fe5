mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{BOUNDARY, Part, TestApp, file, multipart_body, upload_request};
use futures::future::join_all;
use receipt_drop::{config::UploadPolicy, services::ingest_service::MAX_TEXT_FIELD_BYTES};
use serde_json::{Value, json};
use std::collections::HashSet;

fn jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend((0..len.saturating_sub(4)).map(|i| (i % 251) as u8));
    data
}

fn is_stored_name(name: &str, ext: &str) -> bool {
    let Some((ts, rest)) = name.split_once('-') else {
        return false;
    };
    let Some(rand) = rest.strip_suffix(ext) else {
        return false;
    };
    ts.parse::<i64>().is_ok() && rand.len() == 12 && rand.bytes().all(|b| b.is_ascii_hexdigit())
}

#[tokio::test]
async fn strict_upload_stores_photo_and_sidecar() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let photo = jpeg(2048);

    let mut req = upload_request(&[
        file("photo", "cat.jpg", "image/jpeg", &photo),
        Part::Text("account", "acct-1"),
        Part::Text("payerPhone", " +15550100 "),
        Part::Text("latitude", "37.7"),
        Part::Text("longitude", "-122.4"),
    ]);
    req.headers_mut()
        .insert("user-agent", "upload-test/1.0".parse().unwrap());
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());

    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["qr"], Value::Null);

    let id = body["id"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));

    let photo_name = body["photo"].as_str().unwrap();
    assert!(is_stored_name(photo_name, ".jpg"), "{photo_name}");
    assert_eq!(std::fs::read(app.uploads.join(photo_name)).unwrap(), photo);

    let sidecar: Value =
        serde_json::from_slice(&std::fs::read(app.uploads.join(format!("{id}.json"))).unwrap())
            .unwrap();
    assert_eq!(sidecar["id"], json!(id));
    assert_eq!(sidecar["photoFilename"], json!(photo_name));
    assert_eq!(sidecar["qrFilename"], Value::Null);
    assert_eq!(sidecar["account"], json!("acct-1"));
    assert_eq!(sidecar["payerPhone"], json!("+15550100"));
    assert_eq!(sidecar["latitude"], json!(37.7));
    assert_eq!(sidecar["longitude"], json!(-122.4));
    assert_eq!(sidecar["ip"], json!("203.0.113.9"));
    assert_eq!(sidecar["userAgent"], json!("upload-test/1.0"));
    let ts = sidecar["timestamp"].as_str().unwrap();
    assert!(ts.ends_with('Z') && ts.len() == "2024-01-01T00:00:00.000Z".len(), "{ts}");

    let mut expected = vec![photo_name.to_string(), format!("{id}.json")];
    expected.sort();
    assert_eq!(app.upload_entries(), expected);
}

#[tokio::test]
async fn qr_is_stored_with_extension_from_mime() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let qr = b"\x89PNG\r\n\x1a\nqr-bytes".to_vec();

    let (status, body) = app
        .send_json(upload_request(&[
            file("qr", "code", "image/png", &qr),
            file("photo", "IMG_0001.JPG", "image/jpeg", &jpeg(64)),
            Part::Text("latitude", ""),
            Part::Text("longitude", "not-a-number"),
        ]))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let qr_name = body["qr"].as_str().unwrap();
    assert!(is_stored_name(qr_name, ".png"), "{qr_name}");
    assert!(is_stored_name(body["photo"].as_str().unwrap(), ".JPG"));
    assert_eq!(std::fs::read(app.uploads.join(qr_name)).unwrap(), qr);

    let id = body["id"].as_str().unwrap();
    let sidecar: Value =
        serde_json::from_slice(&std::fs::read(app.uploads.join(format!("{id}.json"))).unwrap())
            .unwrap();
    assert_eq!(sidecar["qrFilename"], json!(qr_name));
    assert_eq!(sidecar["latitude"], Value::Null);
    assert_eq!(sidecar["longitude"], Value::Null);
    assert_eq!(sidecar["account"], json!(""));
    assert_eq!(sidecar["ip"], Value::Null);
    assert_eq!(app.upload_entries().len(), 3);
}

#[tokio::test]
async fn missing_photo_is_rejected_and_nothing_is_kept() {
    let app = TestApp::new(UploadPolicy::strict()).await;

    let (status, body) = app
        .send_json(upload_request(&[
            file("qr", "code.png", "image/png", b"qr"),
            Part::Text("account", "acct-1"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false, "error": "photo is required" }));
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn non_multipart_request_is_missing_photo() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"account":"acct-1"}"#))
        .unwrap();

    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("photo is required"));
}

#[tokio::test]
async fn empty_file_input_counts_as_absent() {
    let app = TestApp::new(UploadPolicy::strict()).await;

    let (status, body) = app
        .send_json(upload_request(&[
            Part::File {
                name: "photo",
                filename: "",
                content_type: Some("application/octet-stream"),
                data: b"",
            },
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("photo is required"));
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn strict_rejects_non_images() {
    let app = TestApp::new(UploadPolicy::strict()).await;

    let (status, body) = app
        .send_json(upload_request(&[
            file("qr", "code.png", "image/png", b"qr"),
            file("photo", "notes.txt", "text/plain", b"hello"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false, "error": "Only image files are allowed" }));
    assert!(app.upload_entries().is_empty());

    // No declared type is treated as application/octet-stream.
    let (status, _) = app
        .send_json(upload_request(&[Part::File {
            name: "photo",
            filename: "cat.jpg",
            content_type: None,
            data: b"bytes",
        }]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn strict_rejects_oversized_files() {
    let policy = UploadPolicy {
        max_file_size_bytes: Some(1024),
        ..UploadPolicy::strict()
    };
    let app = TestApp::new(policy).await;

    let (status, body) = app
        .send_json(upload_request(&[
            file("qr", "code.png", "image/png", b"qr"),
            file("photo", "big.jpg", "image/jpeg", &jpeg(4096)),
        ]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "ok": false, "error": "File too large" }));
    assert!(app.upload_entries().is_empty());

    let (status, _) = app
        .send_json(upload_request(&[file("photo", "ok.jpg", "image/jpeg", &jpeg(1024))]))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn default_strict_limit_is_ten_mebibytes() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let big = jpeg(15 * 1024 * 1024);

    let (status, _) = app
        .send_json(upload_request(&[file("photo", "big.jpg", "image/jpeg", &big)]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn permissive_accepts_anything_and_echoes_location() {
    let app = TestApp::new(UploadPolicy::permissive()).await;
    let big = jpeg(15 * 1024 * 1024);

    let (status, body) = app
        .send_json(upload_request(&[
            file("photo", "scan.pdf", "application/pdf", &big),
            Part::Text("latitude", "37.7"),
            Part::Text("longitude", "-122.4"),
        ]))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], json!(true));
    assert!(body["message"].is_string());
    assert_eq!(
        body["receivedLocation"],
        json!({ "latitude": "37.7", "longitude": "-122.4" })
    );

    let entries = app.upload_entries();
    assert_eq!(entries.len(), 1);
    assert!(is_stored_name(&entries[0], ".pdf"), "{entries:?}");
    assert_eq!(std::fs::read(app.uploads.join(&entries[0])).unwrap().len(), big.len());
}

#[tokio::test]
async fn permissive_still_requires_photo() {
    let app = TestApp::new(UploadPolicy::permissive()).await;

    let (status, body) = app
        .send_json(upload_request(&[file("qr", "code.bin", "application/octet-stream", b"x")]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("photo is required"));
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn duplicate_or_unknown_file_fields_are_rejected() {
    let app = TestApp::new(UploadPolicy::strict()).await;

    let (status, body) = app
        .send_json(upload_request(&[
            file("photo", "a.jpg", "image/jpeg", b"a"),
            file("photo", "b.jpg", "image/jpeg", b"b"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Unexpected field: photo"));
    assert!(app.upload_entries().is_empty());

    let (status, body) = app
        .send_json(upload_request(&[
            file("photo", "a.jpg", "image/jpeg", b"a"),
            file("avatar", "b.jpg", "image/jpeg", b"b"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Unexpected field: avatar"));
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn concurrent_uploads_get_distinct_names() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let photo = jpeg(256);

    let requests = (0..50).map(|_| {
        app.send_json(upload_request(&[file("photo", "cat.jpg", "image/jpeg", &photo)]))
    });
    let results = join_all(requests).await;

    let mut photos = HashSet::new();
    let mut ids = HashSet::new();
    for (status, body) in results {
        assert_eq!(status, StatusCode::OK, "{body}");
        photos.insert(body["photo"].as_str().unwrap().to_string());
        ids.insert(body["id"].as_str().unwrap().to_string());
    }
    assert_eq!(photos.len(), 50);
    assert_eq!(ids.len(), 50);
    assert_eq!(app.upload_entries().len(), 100);
}

#[tokio::test]
async fn disk_failure_is_a_server_error() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    std::fs::remove_dir_all(&app.uploads).unwrap();

    let (status, body) = app
        .send_json(upload_request(&[file("photo", "cat.jpg", "image/jpeg", &jpeg(64))]))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], json!(false));
    let error = body["error"].as_str().unwrap();
    assert!(!error.is_empty());
    assert_eq!(body.as_object().unwrap().len(), 2, "{body}");
}

#[tokio::test]
async fn oversized_text_field_is_rejected() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let account = "a".repeat(MAX_TEXT_FIELD_BYTES + 1);

    let (status, body) = app
        .send_json(upload_request(&[
            file("photo", "cat.jpg", "image/jpeg", &jpeg(64)),
            Part::Text("account", &account),
        ]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "ok": false, "error": "Field value too long" }));
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn truncated_body_is_malformed() {
    let app = TestApp::new(UploadPolicy::strict()).await;
    let mut payload = multipart_body(&[
        file("qr", "code.png", "image/png", b"qr"),
        file("photo", "cat.jpg", "image/jpeg", &jpeg(512)),
    ]);
    // Cut inside the photo part so the closing boundary never arrives.
    payload.truncate(payload.len() - 200);

    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["ok"], json!(false));
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Malformed multipart body"), "{error}");
    assert!(app.upload_entries().is_empty());
}
