use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr};

/// Default per-file cap in strict mode (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub public_dir: PathBuf,
    pub policy: UploadPolicy,
}

/// What the upload endpoint accepts and what it records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Reject file parts whose declared type is not `image/*`.
    pub enforce_image_only: bool,
    /// Per-file byte cap; `None` means unlimited.
    pub max_file_size_bytes: Option<u64>,
    /// Write a `{id}.json` sidecar and answer with identifiers.
    pub persist_metadata: bool,
}

impl UploadPolicy {
    pub fn strict() -> Self {
        Self {
            enforce_image_only: true,
            max_file_size_bytes: Some(DEFAULT_MAX_FILE_SIZE_BYTES),
            persist_metadata: true,
        }
    }

    pub fn permissive() -> Self {
        Self {
            enforce_image_only: false,
            max_file_size_bytes: None,
            persist_metadata: false,
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Preset the individual policy switches start from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Strict,
    Permissive,
}

impl UploadMode {
    fn policy(self) -> UploadPolicy {
        match self {
            Self::Strict => UploadPolicy::strict(),
            Self::Permissive => UploadPolicy::permissive(),
        }
    }
}

impl FromStr for UploadMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true).map_err(|e| anyhow::anyhow!(e))
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo + QR submission intake service")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory uploads and metadata are written to (overrides UPLOADS_DIR)
    #[arg(long)]
    pub uploads_dir: Option<PathBuf>,

    /// Directory holding the front-end (overrides PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// Policy preset (overrides UPLOAD_MODE)
    #[arg(long, value_enum)]
    pub mode: Option<UploadMode>,

    /// Per-file size cap in bytes, 0 for none (overrides MAX_FILE_SIZE_BYTES)
    #[arg(long)]
    pub max_file_size_bytes: Option<u64>,

    /// Accept image/* parts only (overrides ENFORCE_IMAGE_ONLY)
    #[arg(long)]
    pub enforce_image_only: Option<bool>,

    /// Write a JSON sidecar per submission (overrides PERSIST_METADATA)
    #[arg(long)]
    pub persist_metadata: Option<bool>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |key| env::var(key))
    }

    /// Merge CLI args over values read through `lookup`. CLI wins.
    pub fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = env_or(&lookup, "HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = env_parsed(&lookup, "PORT")?.unwrap_or(3000);
        let env_uploads = env_or(&lookup, "UPLOADS_DIR")?.unwrap_or_else(|| "./uploads".into());
        let env_public = env_or(&lookup, "PUBLIC_DIR")?.unwrap_or_else(|| "./public".into());

        let mode = match args.mode {
            Some(mode) => mode,
            None => env_parsed(&lookup, "UPLOAD_MODE")?.unwrap_or(UploadMode::Strict),
        };
        let mut policy = mode.policy();

        let max_size = match args.max_file_size_bytes {
            Some(v) => Some(v),
            None => env_parsed::<u64, _>(&lookup, "MAX_FILE_SIZE_BYTES")?,
        };
        if let Some(bytes) = max_size {
            policy.max_file_size_bytes = (bytes > 0).then_some(bytes);
        }
        let enforce_image_only = match args.enforce_image_only {
            Some(v) => Some(v),
            None => env_parsed(&lookup, "ENFORCE_IMAGE_ONLY")?,
        };
        if let Some(v) = enforce_image_only {
            policy.enforce_image_only = v;
        }
        let persist_metadata = match args.persist_metadata {
            Some(v) => Some(v),
            None => env_parsed(&lookup, "PERSIST_METADATA")?,
        };
        if let Some(v) = persist_metadata {
            policy.persist_metadata = v;
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            uploads_dir: args.uploads_dir.unwrap_or_else(|| env_uploads.into()),
            public_dir: args.public_dir.unwrap_or_else(|| env_public.into()),
            policy,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or<F>(lookup: &F, key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn env_parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let Some(value) = env_or(lookup, key)? else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("parsing {} value `{}`", key, value))
}
