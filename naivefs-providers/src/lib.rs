//! Storage backends for naivefs
//!
//! Local disk, SMB shares and S3-compatible object stores behind the
//! [`FileSystem`] trait, plus a registry that builds them from
//! configuration.

pub mod config;
mod local;
pub mod memory;
pub mod smb;

#[cfg(feature = "s3")]
pub mod s3;

pub use config::{BackendConfig, FsConfig};
pub use local::{LocalBackend, LocalConfig};
pub use smb::{ScopedSession, ShareTransport, SmbAuth, SmbBackend, SmbConfig};

#[cfg(feature = "s3")]
pub use s3::{S3Backend, S3Config};

use naivefs_core::{FileSystem, FsError, FsResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of named storage backends
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn FileSystem>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self { backends: BTreeMap::new() }
    }

    /// Build every configured backend.
    ///
    /// SMB backends need `smb_transport`; there is no built-in wire client.
    pub fn from_config(
        config: &FsConfig,
        smb_transport: Option<Arc<dyn ShareTransport>>,
    ) -> FsResult<Self> {
        let mut registry = Self::new();
        for (name, backend) in &config.backends {
            let fs: Arc<dyn FileSystem> = match backend {
                BackendConfig::Local(local) => Arc::new(LocalBackend::from_config(local)),
                BackendConfig::Smb(smb) => {
                    let transport = smb_transport.clone().ok_or_else(|| {
                        FsError::Config(format!("backend {}: no SMB transport available", name))
                    })?;
                    Arc::new(SmbBackend::new(smb.clone(), transport))
                }
                #[cfg(feature = "s3")]
                BackendConfig::S3(s3) => Arc::new(S3Backend::new(s3.clone())),
            };
            tracing::debug!(name = %name, fs_type = %fs.fs_type(), "registered backend");
            registry.register(name.clone(), fs);
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn FileSystem>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FileSystem>> {
        self.backends.get(name).cloned()
    }

    pub fn get_or_err(&self, name: &str) -> FsResult<Arc<dyn FileSystem>> {
        self.get(name)
            .ok_or_else(|| FsError::Config(format!("unknown backend: {}", name)))
    }

    pub fn list(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn FileSystem>> {
        self.backends.remove(name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryShare;
    use naivefs_core::FsType;

    const CONFIG: &str = r#"
[backends.disk]
type = "local"
base_dir = "/tmp"

[backends.office]
type = "smb"
server = "fileserver"
share = "public"
"#;

    #[test]
    fn test_from_config_builds_backends() {
        let config = FsConfig::from_toml_str(CONFIG).unwrap();
        let share: Arc<dyn ShareTransport> = Arc::new(MemoryShare::new("public"));
        let registry = BackendRegistry::from_config(&config, Some(share)).unwrap();

        assert_eq!(registry.list(), vec!["disk", "office"]);
        assert_eq!(registry.get_or_err("disk").unwrap().fs_type(), FsType::Local);
        assert_eq!(registry.get_or_err("office").unwrap().fs_type(), FsType::Smb);
        assert!(matches!(registry.get_or_err("nope"), Err(FsError::Config(_))));
    }

    #[test]
    fn test_smb_without_transport_is_config_error() {
        let config = FsConfig::from_toml_str(CONFIG).unwrap();
        assert!(matches!(
            BackendRegistry::from_config(&config, None),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn test_register_and_remove() {
        let mut registry = BackendRegistry::default();
        registry.register("a", Arc::new(LocalBackend::new("/tmp")));
        assert!(registry.get("a").is_some());
        assert!(registry.remove("a").is_some());
        assert!(registry.list().is_empty());
    }
}
