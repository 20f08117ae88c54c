//! File handles and cross-backend convenience operations

use bytes::Bytes;
use std::fmt;

use crate::{
    backend::{FileSystem, FsType},
    entry::Entry,
    error::{FsError, FsResult},
};

/// A path bound to the filesystem that interprets it.
///
/// The handle borrows its backend, so it can never outlive it. The path is
/// not validated here; each operation validates it when it runs.
#[derive(Clone)]
pub struct File<'fs> {
    fs: &'fs dyn FileSystem,
    path: String,
}

impl<'fs> File<'fs> {
    pub fn new(fs: &'fs dyn FileSystem, path: impl Into<String>) -> Self {
        Self { fs, path: path.into() }
    }

    pub fn fs(&self) -> &'fs dyn FileSystem {
        self.fs
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fs_type(&self) -> FsType {
        self.fs.fs_type()
    }

    pub async fn touch(&self) -> FsResult<()> {
        self.fs.touch(self.path()).await
    }

    pub async fn mkdir(&self) -> FsResult<()> {
        self.fs.mkdir(self.path()).await
    }

    pub async fn remove(&self) -> FsResult<()> {
        self.fs.remove(self.path()).await
    }

    pub async fn write(&self, data: impl Into<Bytes>) -> FsResult<()> {
        self.fs.write(self.path(), data.into()).await
    }

    pub async fn read(&self) -> FsResult<Bytes> {
        self.fs.read(self.path()).await
    }

    pub async fn exists(&self) -> FsResult<bool> {
        self.fs.exists(self.path()).await
    }

    pub async fn is_dir(&self) -> FsResult<bool> {
        self.fs.is_dir(self.path()).await
    }

    pub async fn is_file(&self) -> FsResult<bool> {
        self.fs.is_file(self.path()).await
    }

    pub async fn read_dir(&self) -> FsResult<Vec<Entry>> {
        self.fs.read_dir(self.path()).await
    }
}

impl fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("fs", &self.fs.fs_type())
            .field("path", &self.path())
            .finish()
    }
}

impl fmt::Display for File<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.fs.fs_type(), self.path())
    }
}

/// Read all of `src` and write it to `dst`.
///
/// Not atomic: a failure during the write can leave `dst` absent or
/// partially written.
pub async fn copy(src: &File<'_>, dst: &File<'_>) -> FsResult<()> {
    let data = src.read().await?;
    dst.write(data).await
}

/// Copy `src` to `dst`, then remove `src`.
///
/// If the removal fails the data exists at both locations and the error is
/// [`FsError::PartialMove`]; reconciling is up to the caller.
pub async fn move_file(src: &File<'_>, dst: &File<'_>) -> FsResult<()> {
    copy(src, dst).await?;
    src.remove().await.map_err(|e| {
        tracing::warn!(src = %src, dst = %dst, error = %e, "move left source in place");
        FsError::PartialMove {
            src: src.to_string(),
            dst: dst.to_string(),
            source: Box::new(e),
        }
    })
}
