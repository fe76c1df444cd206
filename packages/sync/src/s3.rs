//! [`ObjectStore`] backed by `aws-sdk-s3`.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `AWS_ACCESS_KEY_ID` | Yes | Access key |
//! | `AWS_SECRET_ACCESS_KEY` | Yes | Secret key |
//! | `AWS_SESSION_TOKEN` | No | Session token for temporary credentials |
//! | `AWS_ENDPOINT_URL` | No | Endpoint of an S3-compatible store (R2, `MinIO`) |

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;

use crate::SyncError;
use crate::config::{self, ArtifactLocation};
use crate::store::{GetOutcome, ObjectStore, RemoteObject};

const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";
const ENDPOINT_ENV: &str = "AWS_ENDPOINT_URL";

/// S3 client bound to one bucket.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    /// Creates a store for `location` with credentials from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if a credential is unset.
    pub fn from_env(location: &ArtifactLocation) -> Result<Self, SyncError> {
        Self::from_lookup(location, config::env_lookup)
    }

    /// Creates a store for `location` with credentials from `lookup`.
    ///
    /// No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if a credential is unset.
    pub fn from_lookup(
        location: &ArtifactLocation,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let access_key = config::require(ACCESS_KEY_ENV, &lookup)?;
        let secret_key = config::require(SECRET_KEY_ENV, &lookup)?;
        let session_token = lookup(SESSION_TOKEN_ENV);

        let creds = Credentials::new(
            &access_key,
            &secret_key,
            session_token,
            None,
            "zone-catalog-env",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .region(Region::new(location.region.clone()))
            .credentials_provider(creds)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());

        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            log::debug!("Using S3 endpoint {endpoint}");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: location.bucket.clone(),
        })
    }
}

fn status<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, SyncError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let size = output.content_length().unwrap_or(0);
                #[allow(clippy::cast_sign_loss)] // S3 content-length is non-negative
                let size = size as u64;
                Ok(Some(RemoteObject {
                    size,
                    etag: output.e_tag().map(str::to_string),
                }))
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Ok(None);
                }
                Err(SyncError::Head {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    async fn get(&self, key: &str, if_none_match: Option<&str>) -> Result<GetOutcome, SyncError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_if_none_match(if_none_match.map(str::to_string))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                    || status(&err) == Some(404)
                {
                    return Ok(GetOutcome::NotFound);
                }
                if status(&err) == Some(304) {
                    return Ok(GetOutcome::NotModified);
                }
                return Err(SyncError::Download {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    source: Box::new(err),
                });
            }
        };

        let etag = output.e_tag().map(str::to_string);
        let bytes = output.body.collect().await.map_err(|e| SyncError::Download {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            source: Box::new(e),
        })?;

        Ok(GetOutcome::Body {
            bytes: bytes.into_bytes().to_vec(),
            etag,
        })
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<Option<String>, SyncError> {
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type("application/octet-stream")
            .send()
            .await
            .map_err(|e| SyncError::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(output.e_tag().map(str::to_string))
    }
}
