//! Local filesystem backend

use async_trait::async_trait;
use bytes::Bytes;
use naivefs_core::{
    path, Capabilities, Entry, FileSystem, FsError, FsResult, FsType, PathResolver,
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::fs;

/// Mode for directories created by this backend (before umask).
#[cfg(unix)]
const DIR_MODE: u32 = 0o777;
/// Mode for files created by this backend (before umask).
#[cfg(unix)]
const FILE_MODE: u32 = 0o666;

/// Local backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory relative names are resolved against
    #[serde(default)]
    pub base_dir: String,
}

/// Local filesystem backend
pub struct LocalBackend {
    resolver: PathResolver,
    capabilities: Capabilities,
}

impl LocalBackend {
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            resolver: PathResolver::new(base_dir),
            capabilities: Capabilities::hierarchical(),
        }
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(config.base_dir.clone())
    }

    pub fn base_dir(&self) -> &str {
        self.resolver.base()
    }

    async fn stat(&self, real: &str) -> FsResult<Option<std::fs::Metadata>> {
        match fs::metadata(real).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir_all(&self, real: &str) -> FsResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(real).await?;
        Ok(())
    }

    async fn ensure_parent(&self, real: &str) -> FsResult<()> {
        let parent = path::parent(real);
        if self.stat(&parent).await?.is_none() {
            self.create_dir_all(&parent).await?;
        }
        Ok(())
    }
}

/// Map a native "not found" onto the path the caller asked for.
fn not_found_as(name: &str) -> impl FnOnce(std::io::Error) -> FsError + '_ {
    move |e| match e.kind() {
        ErrorKind::NotFound => FsError::NotFound(name.to_string()),
        _ => FsError::Io(e),
    }
}

#[async_trait]
impl FileSystem for LocalBackend {
    fn fs_type(&self) -> FsType {
        FsType::Local
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn touch(&self, name: &str) -> FsResult<()> {
        let real = self.resolver.resolve(name);
        if self.stat(&real).await?.is_some() {
            return Ok(());
        }
        self.ensure_parent(&real).await?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);
        options.open(&real).await?;
        Ok(())
    }

    async fn mkdir(&self, name: &str) -> FsResult<()> {
        let real = self.resolver.resolve(name);
        if self.stat(&real).await?.is_some() {
            return Ok(());
        }
        self.create_dir_all(&real).await
    }

    async fn remove(&self, name: &str) -> FsResult<()> {
        let real = self.resolver.resolve(name);
        let meta = match fs::symlink_metadata(&real).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let result = if meta.is_dir() {
            fs::remove_dir_all(&real).await
        } else {
            fs::remove_file(&real).await
        };
        match result {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn write(&self, name: &str, data: Bytes) -> FsResult<()> {
        let real = self.resolver.resolve(name);
        self.ensure_parent(&real).await?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);
        let mut file = options.open(&real).await?;

        use tokio::io::AsyncWriteExt;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(&self, name: &str) -> FsResult<Bytes> {
        let real = self.resolver.resolve(name);
        let data = fs::read(&real).await.map_err(not_found_as(name))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, name: &str) -> FsResult<bool> {
        let real = self.resolver.resolve(name);
        Ok(self.stat(&real).await?.is_some())
    }

    async fn is_dir(&self, name: &str) -> FsResult<bool> {
        let real = self.resolver.resolve(name);
        Ok(self.stat(&real).await?.is_some_and(|meta| meta.is_dir()))
    }

    async fn read_dir(&self, name: &str) -> FsResult<Vec<Entry>> {
        let real = self.resolver.resolve(name);
        match self.stat(&real).await? {
            None => return Err(FsError::NotFound(name.to_string())),
            Some(meta) if !meta.is_dir() => return Err(FsError::NotADirectory(name.to_string())),
            Some(_) => {}
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&real).await?;
        while let Some(child) = read_dir.next_entry().await? {
            let child_name = child.file_name().to_string_lossy().into_owned();
            let meta = child.metadata().await?;
            entries.push(if meta.is_dir() {
                Entry::directory(child_name)
            } else {
                Entry::file(child_name, meta.len())
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend() -> (TempDir, LocalBackend) {
        let dir = TempDir::new().unwrap();
        let fs = LocalBackend::new(dir.path().to_string_lossy());
        (dir, fs)
    }

    #[tokio::test]
    async fn test_touch_does_not_truncate() {
        let (_dir, fs) = backend();
        fs.write("keep.txt", Bytes::from_static(b"contents")).await.unwrap();
        fs.touch("keep.txt").await.unwrap();
        assert_eq!(fs.read("keep.txt").await.unwrap(), Bytes::from_static(b"contents"));
    }

    #[tokio::test]
    async fn test_touch_creates_parents() {
        let (dir, fs) = backend();
        fs.touch("a/b/c.txt").await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
        assert!(fs.is_file("a/b/c.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_absolute_path_bypasses_base() {
        let (_dir, fs) = backend();
        let other = TempDir::new().unwrap();
        let absolute = other.path().join("outside.txt");
        let absolute = absolute.to_string_lossy();

        fs.write(&absolute, Bytes::from_static(b"x")).await.unwrap();
        assert!(other.path().join("outside.txt").is_file());
        assert!(!fs.exists("outside.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, fs) = backend();
        let err = fs.read("nope.txt").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(ref p) if p == "nope.txt"));
    }

    #[tokio::test]
    async fn test_remove_directory_tree() {
        let (_dir, fs) = backend();
        fs.write("tree/a/b.txt", Bytes::from_static(b"1")).await.unwrap();
        fs.touch("tree/c.txt").await.unwrap();

        fs.remove("tree").await.unwrap();
        assert!(!fs.exists("tree").await.unwrap());
        fs.remove("tree").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_dir() {
        let (_dir, fs) = backend();
        fs.write("list/b.txt", Bytes::from_static(b"hello")).await.unwrap();
        fs.mkdir("list/a").await.unwrap();

        let entries = fs.read_dir("list").await.unwrap();
        assert_eq!(entries, vec![Entry::directory("a"), Entry::file("b.txt", 5)]);
    }

    #[tokio::test]
    async fn test_read_dir_on_file_fails() {
        let (_dir, fs) = backend();
        fs.touch("plain.txt").await.unwrap();

        let err = fs.read_dir("plain.txt").await.unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
        let err = fs.read_dir("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exists_propagates_permission_errors() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, fs) = backend();
        fs.touch("locked/inner.txt").await.unwrap();
        let locked = dir.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let denied = fs.exists("locked/inner.txt").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // root ignores directory permissions, so only assert when denied
        if let Err(err) = denied {
            assert!(!err.is_not_found());
        }
    }
}
