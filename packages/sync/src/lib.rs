#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Publishes the catalog file to an S3-compatible bucket and fetches it
//! back.
//!
//! ## Fingerprints
//!
//! The remote `ETag` of the last published or fetched copy is cached next to
//! the catalog file in `<file>.etag`. Both directions use it to skip payload
//! transfers:
//!
//! * [`ArtifactSync::publish`] uploads only when the cache is missing, the
//!   remote object is missing or has a different `ETag`, or the local file
//!   no longer matches the remote content.
//! * [`ArtifactSync::fetch`] sends the cached `ETag` as `If-None-Match`, so
//!   an unchanged remote costs one `HEAD` and one empty `GET`.
//!
//! Every network call runs under a deadline and is not retried.

pub mod config;
pub mod s3;
pub mod store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use zone_catalog_database::paths;

pub use config::ArtifactLocation;
pub use s3::S3Store;
pub use store::{GetOutcome, ObjectStore, RemoteObject};

/// Errors that can occur while publishing or fetching.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or malformed setting.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },

    /// `HeadObject` failed.
    #[error("Failed to head s3://{bucket}/{key}: {source}")]
    Head {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `GetObject` failed.
    #[error("Failed to download s3://{bucket}/{key}: {source}")]
    Download {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A network call exceeded its deadline.
    #[error("{operation} s3://{bucket}/{key} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Deadline that was exceeded.
        after: Duration,
    },

    /// Local file error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl SyncError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// What a publish or fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The local file was uploaded.
    Uploaded {
        /// Payload size.
        bytes: u64,
    },
    /// The remote file was downloaded over the local one.
    Downloaded {
        /// Payload size.
        bytes: u64,
    },
    /// Local and remote already match; nothing was transferred.
    Unchanged,
    /// There is no remote object to fetch.
    NotFound,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_precision_loss)] // display-only MB value
        let mb = |bytes: u64| bytes as f64 / 1_048_576.0;
        match self {
            Self::Uploaded { bytes } => write!(f, "uploaded ({:.1} MB)", mb(*bytes)),
            Self::Downloaded { bytes } => write!(f, "downloaded ({:.1} MB)", mb(*bytes)),
            Self::Unchanged => f.write_str("unchanged"),
            Self::NotFound => f.write_str("not found"),
        }
    }
}

/// Moves one catalog file between the local disk and an [`ObjectStore`].
#[derive(Debug)]
pub struct ArtifactSync<S> {
    store: S,
    key: String,
    timeout: Duration,
}

impl<S: ObjectStore> ArtifactSync<S> {
    /// Syncs the object at `key` with [`config::DEFAULT_TIMEOUT`].
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            timeout: config::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the deadline applied to each network call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Uploads `local` unless the remote copy already matches it.
    ///
    /// # Errors
    ///
    /// * [`SyncError::Io`] if `local` or its fingerprint cannot be read or
    ///   the new fingerprint cannot be written.
    /// * [`SyncError::Head`] / [`SyncError::Upload`] / [`SyncError::Timeout`]
    ///   if the store fails.
    pub async fn publish(&self, local: &Path) -> Result<SyncOutcome, SyncError> {
        let metadata = tokio::fs::metadata(local)
            .await
            .map_err(|e| SyncError::io(local, e))?;

        log::info!(
            "Publishing {} -> s3://{}/{}",
            local.display(),
            self.store.bucket(),
            self.key
        );

        let cached = read_fingerprint(local).await?;
        let remote = self.bounded("head", self.store.head(&self.key)).await?;

        if let (Some(cached), Some(remote)) = (&cached, &remote)
            && remote.etag.as_deref() == Some(cached.as_str())
            && is_local_match(local, metadata.len(), remote).await?
        {
            log::info!("  skipped (unchanged)");
            return Ok(SyncOutcome::Unchanged);
        }

        let data = tokio::fs::read(local)
            .await
            .map_err(|e| SyncError::io(local, e))?;
        let bytes = data.len() as u64;

        let etag = self.bounded("upload", self.store.put(&self.key, data)).await?;
        let etag = match etag {
            Some(etag) => Some(etag),
            None => self
                .bounded("head", self.store.head(&self.key))
                .await?
                .and_then(|remote| remote.etag),
        };

        match etag {
            Some(etag) => write_fingerprint(local, &etag).await?,
            None => log::warn!("  store reported no ETag; the next publish will upload again"),
        }

        let outcome = SyncOutcome::Uploaded { bytes };
        log::info!("  {outcome}");
        Ok(outcome)
    }

    /// Replaces `local` with the remote copy if it has changed.
    ///
    /// A missing remote object is not an error; `local` is left as it is.
    /// Downloads are staged in `<local>.download` so an existing file is
    /// never truncated.
    ///
    /// # Errors
    ///
    /// * [`SyncError::Io`] if the download cannot be written or moved into
    ///   place.
    /// * [`SyncError::Head`] / [`SyncError::Download`] /
    ///   [`SyncError::Timeout`] if the store fails.
    pub async fn fetch(&self, local: &Path) -> Result<SyncOutcome, SyncError> {
        log::info!(
            "Fetching s3://{}/{} -> {}",
            self.store.bucket(),
            self.key,
            local.display()
        );

        let cached = if tokio::fs::try_exists(local).await.unwrap_or(false) {
            read_fingerprint(local).await?
        } else {
            None
        };

        let Some(remote) = self.bounded("head", self.store.head(&self.key)).await? else {
            log::warn!("  not found (nothing published yet?)");
            return Ok(SyncOutcome::NotFound);
        };

        let outcome = self
            .bounded("download", self.store.get(&self.key, cached.as_deref()))
            .await?;

        match outcome {
            GetOutcome::NotFound => {
                log::warn!("  not found (removed after HEAD?)");
                Ok(SyncOutcome::NotFound)
            }
            GetOutcome::NotModified => {
                log::info!("  skipped (unchanged)");
                Ok(SyncOutcome::Unchanged)
            }
            GetOutcome::Body { bytes, etag } => {
                let size = bytes.len() as u64;
                replace_file(local, &bytes).await?;

                if let Some(etag) = etag.or(remote.etag) {
                    write_fingerprint(local, &etag).await?;
                }

                let outcome = SyncOutcome::Downloaded { bytes: size };
                log::info!("  {outcome}");
                Ok(outcome)
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| SyncError::Timeout {
                operation,
                bucket: self.store.bucket().to_string(),
                key: self.key.clone(),
                after: self.timeout,
            })?
    }
}

/// Path of the fingerprint cache for `local`.
#[must_use]
pub fn fingerprint_path(local: &Path) -> PathBuf {
    paths::sidecar_path(local, "etag")
}

async fn read_fingerprint(local: &Path) -> Result<Option<String>, SyncError> {
    let path = fingerprint_path(local);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            let text = text.trim();
            Ok((!text.is_empty()).then(|| text.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(&path, e)),
    }
}

async fn write_fingerprint(local: &Path, etag: &str) -> Result<(), SyncError> {
    let path = fingerprint_path(local);
    tokio::fs::write(&path, etag)
        .await
        .map_err(|e| SyncError::io(&path, e))
}

/// Writes `bytes` next to `local` and renames it into place.
async fn replace_file(local: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = local.parent() {
        paths::ensure_dir(parent).map_err(|e| SyncError::io(parent, e))?;
    }

    let staging = paths::sidecar_path(local, "download");
    if let Err(e) = tokio::fs::write(&staging, bytes).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(SyncError::io(&staging, e));
    }

    tokio::fs::rename(&staging, local)
        .await
        .map_err(|e| SyncError::io(local, e))
}

/// Checks whether the local file still holds the remote content.
///
/// Sizes must agree. When the remote `ETag` is a plain MD5 digest (not a
/// multipart `ETag`, which contains a `-`), the local MD5 must match too.
async fn is_local_match(
    local: &Path,
    local_size: u64,
    remote: &RemoteObject,
) -> Result<bool, SyncError> {
    if local_size != remote.size {
        return Ok(false);
    }

    if let Some(etag) = &remote.etag {
        let clean = etag.trim_matches('"');
        if !clean.contains('-') && clean.len() == 32 {
            let local_md5 = compute_md5(local)
                .await
                .map_err(|e| SyncError::io(local, e))?;
            return Ok(local_md5 == clean);
        }
    }

    Ok(true)
}

async fn compute_md5(path: &Path) -> Result<String, std::io::Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || compute_md5_sync(&path))
        .await
        .map_err(std::io::Error::other)?
}

fn compute_md5_sync(path: &Path) -> Result<String, std::io::Error> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 256 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }
    Ok(format!("{:x}", context.finalize()))
}
