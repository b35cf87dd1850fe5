//! src/services/storage_service.rs
//!
//! UploadStore: the on-disk side of an upload. Every payload is first
//! streamed to a `.tmp-{uuid}` staging entry inside the upload directory and
//! only renamed to its final name once the whole submission is accepted.
//! Staging and final entries share a directory, so promotion is a plain
//! same-filesystem rename.

use crate::models::{metadata::MetadataRecord, submission::StoredFile};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    fmt::Display,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of staging entries. Anything carrying it is incomplete.
pub const STAGING_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File too large")]
    TooLarge { limit: u64 },
    #[error("{0}")]
    Body(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of streaming one payload to a staging entry.
#[derive(Debug)]
pub struct StagedBlob {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    /// Directory accepted uploads and sidecars end up in.
    pub base_path: PathBuf,
}

impl UploadStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create the upload directory if needed and drop staging leftovers from
    /// an interrupted run. Safe to call repeatedly.
    pub async fn init(&self) -> StorageResult<()> {
        if !fs::try_exists(&self.base_path).await? {
            fs::create_dir_all(&self.base_path).await?;
            info!("Created upload directory at {}", self.base_path.display());
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(_) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("could not remove stale {}: {}", entry.path().display(), err),
            }
        }
        if removed > 0 {
            info!("Removed {} stale staging entries", removed);
        }
        Ok(())
    }

    /// Final path of an entry in the upload directory.
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn staging_path(&self) -> PathBuf {
        self.base_path
            .join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()))
    }

    /// Stream a payload to a fresh staging entry.
    ///
    /// - Writes chunks as they arrive, never buffering the whole body.
    /// - Fails with `TooLarge` as soon as `max_bytes` is exceeded.
    /// - Flushes and fsyncs before returning.
    ///
    /// The staging entry is removed on every error path.
    pub async fn stage_stream<S, E>(
        &self,
        stream: S,
        max_bytes: Option<u64>,
    ) -> StorageResult<StagedBlob>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let tmp_path = self.staging_path();
        match write_stream(&tmp_path, stream, max_bytes).await {
            Ok(size_bytes) => Ok(StagedBlob {
                path: tmp_path,
                size_bytes,
            }),
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(err)
            }
        }
    }

    /// Serialize a metadata record to a staging entry.
    pub async fn stage_metadata(&self, record: &MetadataRecord) -> StorageResult<PathBuf> {
        let json = serde_json::to_vec_pretty(record)?;
        let tmp_path = self.staging_path();
        if let Err(err) = write_all_synced(&tmp_path, &json).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        Ok(tmp_path)
    }

    /// Rename a staging entry to its final name.
    pub async fn promote(&self, staging: &Path, name: &str) -> StorageResult<PathBuf> {
        let final_path = self.final_path(name);
        fs::rename(staging, &final_path).await?;
        debug!("promoted {} -> {}", staging.display(), final_path.display());
        Ok(final_path)
    }

    /// Promote a submission atomically as far as readers can tell: files
    /// first, sidecar last. On failure everything is rolled back, promoted
    /// entries included.
    pub async fn commit(
        &self,
        files: &[&StoredFile],
        sidecar: Option<(&Path, &str)>,
    ) -> StorageResult<()> {
        let mut promoted: Vec<PathBuf> = Vec::new();

        let staged = files
            .iter()
            .map(|f| (f.staging_path.as_path(), f.stored_name.as_str()))
            .chain(sidecar);
        for (staging, name) in staged {
            match self.promote(staging, name).await {
                Ok(path) => promoted.push(path),
                Err(err) => {
                    for path in &promoted {
                        self.remove_quietly(path).await;
                    }
                    for f in files {
                        self.remove_quietly(&f.staging_path).await;
                    }
                    if let Some((path, _)) = sidecar {
                        self.remove_quietly(path).await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Best-effort removal of a staged or promoted entry.
    pub async fn remove_quietly(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(_) => debug!("removed {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove {}: {}", path.display(), err),
        }
    }
}

async fn write_stream<S, E>(path: &Path, stream: S, max_bytes: Option<u64>) -> StorageResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: u64 = 0;
    pin_mut!(stream);
    while let Some(chunk_res) = stream.next().await {
        let chunk = chunk_res.map_err(|err| StorageError::Body(err.to_string()))?;
        size_bytes += chunk.len() as u64;
        if let Some(limit) = max_bytes {
            if size_bytes > limit {
                return Err(StorageError::TooLarge { limit });
            }
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(size_bytes)
}

async fn write_all_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
