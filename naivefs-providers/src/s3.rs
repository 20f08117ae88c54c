//! S3-compatible object storage backend
//!
//! Works with AWS S3, MinIO and other S3-compatible stores. The store is
//! flat: keys are opaque strings, there are no directories, `mkdir` does
//! nothing and a key "is a directory" exactly when it exists. Use
//! [`FileSystem::supports_dir`] to tell this backend apart.
//!
//! The client is built on first use and shared by every later operation.

pub mod client;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use naivefs_core::{Capabilities, Entry, FileSystem, FsError, FsResult, FsType, PathResolver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub use client::{ObjectClient, ObjectConnector, ObjectInfo, ObjectListing};
pub use http::{HttpConnector, HttpObjectClient};

/// S3 backend configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// `host[:port]`, or a full URL which then overrides `use_ssl`
    pub endpoint: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,
    pub bucket: String,
    /// Key prefix relative names are resolved against
    #[serde(default)]
    pub base_dir: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_use_ssl() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "s3.amazonaws.com".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            use_ssl: default_use_ssl(),
            bucket: String::new(),
            base_dir: String::new(),
            region: default_region(),
        }
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("use_ssl", &self.use_ssl)
            .field("bucket", &self.bucket)
            .field("base_dir", &self.base_dir)
            .field("region", &self.region)
            .finish()
    }
}

impl S3Config {
    /// AWS S3 in `region`
    pub fn aws(
        bucket: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            endpoint: format!("s3.{}.amazonaws.com", region),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: bucket.into(),
            region,
            ..Default::default()
        }
    }

    /// Self-hosted MinIO, plain HTTP unless `use_ssl` is set afterwards
    pub fn minio(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            use_ssl: false,
            bucket: bucket.into(),
            ..Default::default()
        }
    }
}

/// S3 storage backend
pub struct S3Backend {
    config: S3Config,
    connector: Arc<dyn ObjectConnector>,
    client: OnceCell<Arc<dyn ObjectClient>>,
    resolver: PathResolver,
    capabilities: Capabilities,
}

impl S3Backend {
    pub fn new(config: S3Config) -> Self {
        Self::with_connector(config, Arc::new(HttpConnector))
    }

    pub fn with_connector(config: S3Config, connector: Arc<dyn ObjectConnector>) -> Self {
        Self {
            resolver: PathResolver::new(config.base_dir.clone()),
            config,
            connector,
            client: OnceCell::new(),
            capabilities: Capabilities::flat(),
        }
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Shared client, built by the first caller
    ///
    /// Concurrent first uses wait for a single construction. A failed
    /// construction is returned to its caller and retried by the next one.
    pub async fn client(&self) -> FsResult<&Arc<dyn ObjectClient>> {
        self.client
            .get_or_try_init(|| async {
                debug!(endpoint = %self.config.endpoint, bucket = %self.config.bucket, "building S3 client");
                self.connector.connect(&self.config).await
            })
            .await
    }

    fn key(&self, name: &str) -> String {
        self.resolver.to_object_key(name)
    }
}

#[async_trait]
impl FileSystem for S3Backend {
    fn fs_type(&self) -> FsType {
        FsType::S3
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn touch(&self, name: &str) -> FsResult<()> {
        if self.exists(name).await? {
            return Ok(());
        }
        let client = self.client().await?;
        client.put_object(&self.config.bucket, &self.key(name), Bytes::new()).await
    }

    async fn mkdir(&self, name: &str) -> FsResult<()> {
        debug!(name, "mkdir is a no-op on object storage");
        Ok(())
    }

    async fn remove(&self, name: &str) -> FsResult<()> {
        let client = self.client().await?;
        match client.remove_object(&self.config.bucket, &self.key(name)).await {
            Err(FsError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn write(&self, name: &str, data: Bytes) -> FsResult<()> {
        let client = self.client().await?;
        client.put_object(&self.config.bucket, &self.key(name), data).await
    }

    async fn read(&self, name: &str) -> FsResult<Bytes> {
        let client = self.client().await?;
        client
            .get_object(&self.config.bucket, &self.key(name))
            .await
            .map_err(|e| match e {
                FsError::NotFound(_) => FsError::NotFound(name.to_string()),
                e => e,
            })
    }

    async fn exists(&self, name: &str) -> FsResult<bool> {
        let client = self.client().await?;
        match client.stat_object(&self.config.bucket, &self.key(name)).await {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Same as [`exists`](Self::exists): any existing key counts.
    async fn is_dir(&self, name: &str) -> FsResult<bool> {
        self.exists(name).await
    }

    async fn is_file(&self, name: &str) -> FsResult<bool> {
        self.exists(name).await
    }

    async fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>> {
        let client = self.client().await?;
        let key = self.key(name);
        let at_root = key.is_empty();
        let prefix = if at_root { key } else { format!("{}/", key) };

        // the bucket root exists even when empty
        let listing = client.list_objects(&self.config.bucket, &prefix).await?;
        if listing.is_empty() && !at_root {
            return Err(FsError::NotFound(name.to_string()));
        }

        let mut entries: Vec<Entry> = listing
            .objects
            .into_iter()
            .filter_map(|object| {
                let child = object.key.strip_prefix(&prefix)?;
                (!child.is_empty()).then(|| Entry::file(child, object.size))
            })
            .chain(listing.common_prefixes.into_iter().filter_map(|common| {
                let child = common.strip_prefix(&prefix)?.trim_end_matches('/');
                (!child.is_empty()).then(|| Entry::directory(child))
            }))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
