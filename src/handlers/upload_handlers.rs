//! `POST /upload`: accept a photo, an optional QR image and the payer
//! details, then answer with identifiers (metadata on) or an echo of the
//! location (metadata off).

use crate::{
    errors::AppError,
    handlers::client::ClientAddr,
    models::{
        metadata::MetadataRecord,
        submission::{ReceivedLocation, StoredFile, Submission},
    },
    services::{
        ingest_service::{self, UploadError},
        naming,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// Success body when a metadata sidecar was written.
#[derive(Debug, Serialize)]
pub struct StoredUploadResponse {
    pub ok: bool,
    pub id: String,
    pub photo: String,
    pub qr: Option<String>,
}

/// Success body when metadata persistence is off.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedUploadResponse {
    pub ok: bool,
    pub message: String,
    pub received_location: ReceivedLocation,
}

pub async fn upload_submission(
    State(state): State<AppState>,
    ClientAddr(client_ip): ClientAddr,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    // A body that is not multipart at all simply carries no photo.
    let multipart = multipart.map_err(|rejection| {
        debug!("upload without multipart body: {}", rejection.body_text());
        UploadError::MissingPhoto
    })?;

    let mut submission = ingest_service::ingest(&state.store, &state.policy, multipart).await?;
    submission.client_ip = client_ip;
    submission.user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(photo_name) = submission.photo.as_ref().map(|p| p.stored_name.clone()) else {
        ingest_service::discard(&state.store, &submission).await;
        return Err(UploadError::MissingPhoto.into());
    };

    if state.policy.persist_metadata {
        record_submission(&state, &submission, photo_name).await
    } else {
        acknowledge_submission(&state, &submission).await
    }
}

/// Stage the sidecar, then promote files and sidecar together.
async fn record_submission(
    state: &AppState,
    submission: &Submission,
    photo_name: String,
) -> Result<Response, AppError> {
    let id = naming::submission_id();
    let record = MetadataRecord::new(id.clone(), Utc::now(), photo_name, submission);

    let sidecar = match state.store.stage_metadata(&record).await {
        Ok(path) => path,
        Err(err) => {
            ingest_service::discard(&state.store, submission).await;
            return Err(err.into());
        }
    };
    let sidecar_name = record.file_name();
    let files: Vec<&StoredFile> = submission.files().collect();
    state
        .store
        .commit(&files, Some((sidecar.as_path(), sidecar_name.as_str())))
        .await?;

    for file in &files {
        debug!(
            field = file.field.as_str(),
            original = ?file.original_name,
            content_type = %file.content_type,
            size_bytes = file.size_bytes,
            "stored {}",
            file.stored_name
        );
    }
    info!(
        id = %record.id,
        photo = %record.photo_filename,
        qr = ?record.qr_filename,
        ip = ?record.ip,
        "accepted submission"
    );

    Ok(Json(StoredUploadResponse {
        ok: true,
        id,
        photo: record.photo_filename,
        qr: record.qr_filename,
    })
    .into_response())
}

/// Promote the files and log the submission without writing a sidecar.
async fn acknowledge_submission(
    state: &AppState,
    submission: &Submission,
) -> Result<Response, AppError> {
    let files: Vec<&StoredFile> = submission.files().collect();
    state.store.commit(&files, None).await?;

    for file in &files {
        info!(
            field = file.field.as_str(),
            stored = %file.stored_name,
            original = ?file.original_name,
            content_type = %file.content_type,
            size_bytes = file.size_bytes,
            "stored file"
        );
    }

    let fields = &submission.fields;
    info!(
        account = %fields.account(),
        payer_phone = %fields.payer_phone(),
        latitude = ?fields.latitude,
        longitude = ?fields.longitude,
        "received submission"
    );

    Ok(Json(ReceivedUploadResponse {
        ok: true,
        message: "Upload received successfully".into(),
        received_location: fields.received_location(),
    })
    .into_response())
}
