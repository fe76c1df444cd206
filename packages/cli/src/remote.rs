//! Publishing and fetching the catalog file.

use std::path::Path;
use std::time::Instant;

use zone_catalog_sync::config::{self, ArtifactLocation};
use zone_catalog_sync::{ArtifactSync, S3Store, SyncError, SyncOutcome};

use crate::RemoteArgs;

/// Resolves the remote location and credentials before any transfer.
fn connect(remote: RemoteArgs) -> Result<ArtifactSync<S3Store>, SyncError> {
    let location =
        ArtifactLocation::resolve(remote.region, remote.bucket, remote.key, config::env_lookup)?;
    let timeout = config::timeout(config::env_lookup)?;
    let store = S3Store::from_env(&location)?;

    log::debug!("Remote catalog: {location} (timeout {timeout:?})");

    Ok(ArtifactSync::new(store, location.key).with_timeout(timeout))
}

/// Uploads `db_path` if it differs from the published copy.
pub async fn publish(db_path: &Path, remote: RemoteArgs) -> Result<SyncOutcome, SyncError> {
    let sync = connect(remote)?;

    let start = Instant::now();
    let outcome = sync.publish(db_path).await?;
    log::info!(
        "Publish complete: {outcome} in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(outcome)
}

/// Replaces `db_path` with the published copy if it has changed.
pub async fn fetch(db_path: &Path, remote: RemoteArgs) -> Result<SyncOutcome, SyncError> {
    let sync = connect(remote)?;

    let start = Instant::now();
    let outcome = sync.fetch(db_path).await?;
    log::info!(
        "Fetch complete: {outcome} in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(outcome)
}
