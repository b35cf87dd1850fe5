//! src/services/ingest_service.rs
//!
//! Reads a `multipart/form-data` body into a [`Submission`], streaming every
//! accepted file part into a staging entry of the [`UploadStore`]. Nothing
//! becomes visible under a final name here; that is the handler's job once
//! the submission validates.

use crate::{
    config::UploadPolicy,
    models::submission::{FileField, StoredFile, Submission},
    services::{
        naming,
        storage_service::{StorageError, UploadStore},
    },
};
use axum::extract::{Multipart, multipart::Field};
use thiserror::Error;
use tracing::debug;

/// Cap on a single text part.
pub const MAX_TEXT_FIELD_BYTES: usize = 1024 * 1024;

/// Declared type assumed for file parts that carry none.
const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("photo is required")]
    MissingPhoto,
    #[error("Only image files are allowed")]
    UnsupportedMediaType { field: String, content_type: String },
    #[error("Unexpected field: {0}")]
    UnexpectedField(String),
    #[error("Field value too long")]
    FieldTooLong(String),
    #[error("Malformed multipart body: {0}")]
    Multipart(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parse the whole multipart body under `policy`.
///
/// On error every file staged so far is removed before returning.
pub async fn ingest(
    store: &UploadStore,
    policy: &UploadPolicy,
    mut multipart: Multipart,
) -> Result<Submission, UploadError> {
    let mut submission = Submission::default();
    match read_parts(store, policy, &mut multipart, &mut submission).await {
        Ok(()) => Ok(submission),
        Err(err) => {
            discard(store, &submission).await;
            Err(err)
        }
    }
}

/// Remove every staging entry a submission holds.
pub async fn discard(store: &UploadStore, submission: &Submission) {
    for file in submission.files() {
        store.remove_quietly(&file.staging_path).await;
    }
}

async fn read_parts(
    store: &UploadStore,
    policy: &UploadPolicy,
    multipart: &mut Multipart,
    submission: &mut Submission,
) -> Result<(), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        // A part is a file exactly when it carries a filename.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = read_text(field, &name).await?;
            if !submission.fields.set(&name, value) {
                debug!("ignoring unknown text field `{}`", name);
            }
            continue;
        };

        let slot = FileField::from_name(&name)
            .ok_or_else(|| UploadError::UnexpectedField(name.clone()))?;

        // Browsers send an empty filename for an unfilled file input.
        if file_name.is_empty() {
            debug!("skipping empty `{}` file input", name);
            drain(field).await?;
            continue;
        }

        if submission.slot_mut(slot).is_some() {
            return Err(UploadError::UnexpectedField(name));
        }

        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_FILE_CONTENT_TYPE)
            .to_string();
        if policy.enforce_image_only && !is_image(&content_type) {
            return Err(UploadError::UnsupportedMediaType {
                field: name,
                content_type,
            });
        }

        let stored_name = naming::unique_file_name(Some(&file_name), Some(&content_type));
        let blob = store
            .stage_stream(field, policy.max_file_size_bytes)
            .await?;
        debug!(
            "staged `{}` ({} bytes) as {}",
            slot.as_str(),
            blob.size_bytes,
            stored_name
        );

        *submission.slot_mut(slot) = Some(StoredFile {
            field: slot,
            stored_name,
            staging_path: blob.path,
            original_name: Some(file_name),
            content_type,
            size_bytes: blob.size_bytes,
        });
    }
    Ok(())
}

fn is_image(content_type: &str) -> bool {
    content_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

async fn read_text(mut field: Field<'_>, name: &str) -> Result<String, UploadError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(UploadError::FieldTooLong(name.to_string()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn drain(mut field: Field<'_>) -> Result<(), UploadError> {
    while field
        .chunk()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
        .is_some()
    {}
    Ok(())
}
