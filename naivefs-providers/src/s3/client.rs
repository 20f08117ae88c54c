//! Boundary to the object store
//!
//! An [`ObjectClient`] talks to one endpoint and addresses objects by bucket
//! and key. Keys are `/`-separated and never start with a separator.
//! Absent keys must be reported as
//! [`FsError::NotFound`](naivefs_core::FsError::NotFound).

use async_trait::async_trait;
use bytes::Bytes;
use naivefs_core::FsResult;
use std::sync::Arc;

use super::S3Config;

/// Metadata returned by a stat or listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// One level of a `/`-delimited listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub objects: Vec<ObjectInfo>,
    /// Full prefixes including the trailing `/`
    pub common_prefixes: Vec<String>,
}

impl ObjectListing {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> FsResult<()>;
    async fn get_object(&self, bucket: &str, key: &str) -> FsResult<Bytes>;
    async fn stat_object(&self, bucket: &str, key: &str) -> FsResult<ObjectInfo>;
    async fn remove_object(&self, bucket: &str, key: &str) -> FsResult<()>;
    /// Objects and common prefixes directly under `prefix`, delimited by `/`
    async fn list_objects(&self, bucket: &str, prefix: &str) -> FsResult<ObjectListing>;
}

/// Builds a client from endpoint, credentials and TLS flag
#[async_trait]
pub trait ObjectConnector: Send + Sync {
    async fn connect(&self, config: &S3Config) -> FsResult<Arc<dyn ObjectClient>>;
}
