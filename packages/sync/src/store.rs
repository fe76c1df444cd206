//! The remote side of the sync protocol.

use async_trait::async_trait;

use crate::SyncError;

/// Metadata of a remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Content length in bytes.
    pub size: u64,
    /// Opaque fingerprint. For single-part uploads S3 reports the quoted
    /// MD5 hex digest of the content.
    pub etag: Option<String>,
}

/// Result of a conditional read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    /// No object at the key.
    NotFound,
    /// The object still has the fingerprint the caller sent.
    NotModified,
    /// The object content.
    Body {
        /// Object bytes.
        bytes: Vec<u8>,
        /// Fingerprint of the returned content, if reported.
        etag: Option<String>,
    },
}

/// An S3-like key/value store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name, for error messages.
    fn bucket(&self) -> &str;

    /// Returns the object's metadata, or `None` if it does not exist.
    async fn head(&self, key: &str) -> Result<Option<RemoteObject>, SyncError>;

    /// Reads the object unless its fingerprint equals `if_none_match`.
    async fn get(&self, key: &str, if_none_match: Option<&str>) -> Result<GetOutcome, SyncError>;

    /// Writes the object, returning the new fingerprint if the store
    /// reports one.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<Option<String>, SyncError>;
}

/// Formats an MD5 digest the way S3 reports single-part `ETag`s.
#[must_use]
pub fn quoted_md5(data: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(data))
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// In-memory store that counts payload transfers.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub puts: AtomicUsize,
        pub bodies: AtomicUsize,
        pub delay: Option<Duration>,
    }

    impl MemoryStore {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn insert(&self, key: &str, data: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), data.to_vec());
        }

        pub fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub fn puts(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        pub fn bodies(&self) -> usize {
            self.bodies.load(Ordering::SeqCst)
        }

        async fn pause(&self) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        fn bucket(&self) -> &str {
            "memory"
        }

        async fn head(&self, key: &str) -> Result<Option<RemoteObject>, SyncError> {
            self.pause().await;
            Ok(self.object(key).map(|data| RemoteObject {
                size: data.len() as u64,
                etag: Some(quoted_md5(&data)),
            }))
        }

        async fn get(
            &self,
            key: &str,
            if_none_match: Option<&str>,
        ) -> Result<GetOutcome, SyncError> {
            self.pause().await;
            let Some(data) = self.object(key) else {
                return Ok(GetOutcome::NotFound);
            };
            let etag = quoted_md5(&data);
            if if_none_match == Some(etag.as_str()) {
                return Ok(GetOutcome::NotModified);
            }
            self.bodies.fetch_add(1, Ordering::SeqCst);
            Ok(GetOutcome::Body {
                bytes: data,
                etag: Some(etag),
            })
        }

        async fn put(&self, key: &str, data: Vec<u8>) -> Result<Option<String>, SyncError> {
            self.pause().await;
            self.puts.fetch_add(1, Ordering::SeqCst);
            let etag = quoted_md5(&data);
            self.insert(key, &data);
            Ok(Some(etag))
        }
    }
}
