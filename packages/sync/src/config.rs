//! Where the catalog artifact lives and how long a network call may take.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `ZONE_CATALOG_S3_REGION` | Yes* | Region of the bucket |
//! | `ZONE_CATALOG_S3_BUCKET` | Yes* | Bucket name |
//! | `ZONE_CATALOG_S3_KEY` | Yes* | Object key of the catalog file |
//! | `ZONE_CATALOG_SYNC_TIMEOUT_SECS` | No | Per-call deadline, default 300 |
//!
//! \* unless given explicitly, e.g. on the command line.

use std::time::Duration;

use crate::SyncError;

/// Region variable.
pub const REGION_ENV: &str = "ZONE_CATALOG_S3_REGION";
/// Bucket variable.
pub const BUCKET_ENV: &str = "ZONE_CATALOG_S3_BUCKET";
/// Key variable.
pub const KEY_ENV: &str = "ZONE_CATALOG_S3_KEY";
/// Deadline variable, in whole seconds.
pub const TIMEOUT_ENV: &str = "ZONE_CATALOG_SYNC_TIMEOUT_SECS";

/// Deadline applied to each network call when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Remote location of the catalog artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Bucket region.
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl ArtifactLocation {
    /// Builds a location from explicit values, filling the gaps from
    /// `lookup` (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] naming the first setting that is
    /// neither given nor set.
    pub fn resolve(
        region: Option<String>,
        bucket: Option<String>,
        key: Option<String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            region: setting(region, REGION_ENV, &lookup)?,
            bucket: setting(bucket, BUCKET_ENV, &lookup)?,
            key: setting(key, KEY_ENV, &lookup)?,
        })
    }

    /// Builds a location entirely from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if a variable is unset.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::resolve(None, None, None, env_lookup)
    }
}

impl std::fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{} ({})", self.bucket, self.key, self.region)
    }
}

/// Reads the per-call deadline from `lookup`.
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] if the value is not a positive
/// whole number of seconds.
pub fn timeout(lookup: impl Fn(&str) -> Option<String>) -> Result<Duration, SyncError> {
    let Some(raw) = lookup(TIMEOUT_ENV) else {
        return Ok(DEFAULT_TIMEOUT);
    };

    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(SyncError::Configuration {
            message: format!("{TIMEOUT_ENV} must be a positive number of seconds, got {raw:?}"),
        }),
    }
}

/// Looks a variable up in the process environment, treating empty values
/// as unset.
#[must_use]
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn require(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, SyncError> {
    lookup(name).ok_or_else(|| SyncError::Configuration {
        message: format!("missing environment variable {name}"),
    })
}

fn setting(
    given: Option<String>,
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, SyncError> {
    match given.filter(|v| !v.trim().is_empty()) {
        Some(value) => Ok(value),
        None => require(name, lookup),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let lookup = env(&[
            (REGION_ENV, "us-east-1"),
            (BUCKET_ENV, "env-bucket"),
            (KEY_ENV, "env/catalog.duckdb"),
        ]);
        let location =
            ArtifactLocation::resolve(None, Some("cli-bucket".to_string()), None, lookup).unwrap();

        assert_eq!(location.region, "us-east-1");
        assert_eq!(location.bucket, "cli-bucket");
        assert_eq!(location.key, "env/catalog.duckdb");
        assert_eq!(
            location.to_string(),
            "s3://cli-bucket/env/catalog.duckdb (us-east-1)"
        );
    }

    #[test]
    fn missing_setting_names_the_variable() {
        let lookup = env(&[(REGION_ENV, "us-east-1"), (KEY_ENV, "catalog.duckdb")]);
        let err = ArtifactLocation::resolve(None, Some("  ".to_string()), None, lookup).unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
        assert!(err.to_string().contains(BUCKET_ENV));
    }

    #[test]
    fn timeout_defaults_and_validates() {
        assert_eq!(timeout(env(&[])).unwrap(), DEFAULT_TIMEOUT);
        assert_eq!(
            timeout(env(&[(TIMEOUT_ENV, "30")])).unwrap(),
            Duration::from_secs(30)
        );
        assert!(timeout(env(&[(TIMEOUT_ENV, "0")])).is_err());
        assert!(timeout(env(&[(TIMEOUT_ENV, "soon")])).is_err());
    }
}
