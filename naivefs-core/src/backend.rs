//! The unified filesystem contract

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{
    entry::Entry,
    error::{FsError, FsResult},
};

/// Which concrete implementation backs a filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    #[default]
    Default,
    Local,
    Smb,
    S3,
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsType::Default => "default",
            FsType::Local => "local",
            FsType::Smb => "smb",
            FsType::S3 => "s3",
        };
        f.write_str(name)
    }
}

impl FromStr for FsType {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(FsType::Default),
            "local" => Ok(FsType::Local),
            "smb" | "samba" => Ok(FsType::Smb),
            "s3" | "minio" => Ok(FsType::S3),
            other => Err(FsError::Config(format!("unknown filesystem type: {}", other))),
        }
    }
}

/// Semantics a backend supports natively.
///
/// Callers branch on these flags instead of inspecting the backend type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Directories are real entries that can exist while empty.
    pub directories: bool,
    pub listing: bool,
}

impl Capabilities {
    pub fn hierarchical() -> Self {
        Self { directories: true, listing: true }
    }

    /// Flat key namespace: directories only exist implicitly as key prefixes.
    pub fn flat() -> Self {
        Self { directories: false, listing: true }
    }
}

/// The capability set every backend implements.
///
/// Paths are opaque strings interpreted by each backend: relative names are
/// resolved against the backend's base directory, absolute names are used
/// as given. `exists` and `is_dir` report absence as `Ok(false)`; an `Err`
/// from them always means the backend could not answer.
#[async_trait]
pub trait FileSystem: Send + Sync {
    fn fs_type(&self) -> FsType;
    fn capabilities(&self) -> &Capabilities;

    /// Create an empty file if nothing exists at `path`. Never truncates.
    async fn touch(&self, path: &str) -> FsResult<()>;

    /// Create `path` and any missing ancestors. Backends without directories
    /// accept the call and do nothing.
    async fn mkdir(&self, path: &str) -> FsResult<()>;

    /// Delete `path` and everything beneath it. Absent paths are not an error.
    async fn remove(&self, path: &str) -> FsResult<()>;

    /// Create or overwrite `path` with exactly `data`.
    async fn write(&self, path: &str, data: Bytes) -> FsResult<()>;

    async fn read(&self, path: &str) -> FsResult<Bytes>;
    async fn exists(&self, path: &str) -> FsResult<bool>;
    async fn is_dir(&self, path: &str) -> FsResult<bool>;

    /// Immediate children of the directory at `path`, sorted by name.
    async fn read_dir(&self, path: &str) -> FsResult<Vec<Entry>>;

    async fn is_file(&self, path: &str) -> FsResult<bool> {
        Ok(self.exists(path).await? && !self.is_dir(path).await?)
    }

    fn supports_dir(&self) -> bool {
        self.capabilities().directories
    }
}
