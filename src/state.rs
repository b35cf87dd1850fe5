//! Shared state handed to every handler.

use crate::{config::UploadPolicy, services::storage_service::UploadStore};
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Where accepted files and sidecars are written.
    pub store: UploadStore,

    /// What `POST /upload` accepts and records.
    pub policy: UploadPolicy,

    /// Root of the static front-end.
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(store: UploadStore, policy: UploadPolicy, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            policy,
            public_dir: public_dir.into(),
        }
    }
}
