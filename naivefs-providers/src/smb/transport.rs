//! Boundary to the SMB wire protocol
//!
//! The backend never speaks SMB itself. It drives an implementation of these
//! traits through connect → authenticate → mount, issues one operation on
//! the mounted tree, and releases everything in reverse order. Handles are
//! shared (`Arc`) and take `&self` so a teardown can run while an operation
//! is still in flight.
//!
//! Paths given to a [`ShareTree`] are share-relative and backslash-separated
//! (`dir\file.txt`); the share root is the empty string.

use async_trait::async_trait;
use bytes::Bytes;
use naivefs_core::{Entry, FsResult};
use std::sync::Arc;

/// SMB authentication
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SmbAuth {
    /// Anonymous/Guest access
    #[default]
    Anonymous,
    /// NTLM authentication
    Ntlm { username: String, password: String, domain: Option<String> },
}

impl std::fmt::Debug for SmbAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmbAuth::Anonymous => f.write_str("Anonymous"),
            SmbAuth::Ntlm { username, domain, .. } => f
                .debug_struct("Ntlm")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("domain", domain)
                .finish(),
        }
    }
}

/// SMB file attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmbFileAttributes(pub u32);

impl SmbFileAttributes {
    pub const READONLY: u32 = 0x0001;
    pub const HIDDEN: u32 = 0x0002;
    pub const SYSTEM: u32 = 0x0004;
    pub const DIRECTORY: u32 = 0x0010;
    pub const ARCHIVE: u32 = 0x0020;
    pub const NORMAL: u32 = 0x0080;

    pub fn is_directory(&self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    pub fn is_readonly(&self) -> bool {
        self.0 & Self::READONLY != 0
    }
}

/// What a stat or directory query reports for one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmbFileInfo {
    pub name: String,
    pub attributes: SmbFileAttributes,
    pub end_of_file: u64,
}

impl SmbFileInfo {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            attributes: SmbFileAttributes(SmbFileAttributes::ARCHIVE),
            end_of_file: size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: SmbFileAttributes(SmbFileAttributes::DIRECTORY),
            end_of_file: 0,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    pub fn to_entry(&self) -> Entry {
        if self.is_directory() {
            Entry::directory(self.name.clone())
        } else {
            Entry::file(self.name.clone(), self.end_of_file)
        }
    }
}

/// Opens transport connections to a server (`host:port`)
#[async_trait]
pub trait ShareTransport: Send + Sync {
    async fn connect(&self, addr: &str) -> FsResult<Arc<dyn ShareConnection>>;
}

/// An open transport connection, not yet authenticated
#[async_trait]
pub trait ShareConnection: Send + Sync {
    async fn authenticate(&self, auth: &SmbAuth) -> FsResult<Arc<dyn ShareSession>>;
    async fn close(&self) -> FsResult<()>;
}

/// An authenticated session
#[async_trait]
pub trait ShareSession: Send + Sync {
    async fn mount(&self, share: &str) -> FsResult<Arc<dyn ShareTree>>;
    async fn logoff(&self) -> FsResult<()>;
}

/// A mounted share.
///
/// Not-found conditions must be reported as
/// [`FsError::NotFound`](naivefs_core::FsError::NotFound).
#[async_trait]
pub trait ShareTree: Send + Sync {
    async fn stat(&self, path: &str) -> FsResult<SmbFileInfo>;
    /// Create or truncate a file. The parent must exist.
    async fn create(&self, path: &str, mode: u32) -> FsResult<()>;
    async fn mkdir_all(&self, path: &str, mode: u32) -> FsResult<()>;
    /// Recursive delete; absent paths succeed.
    async fn remove_all(&self, path: &str) -> FsResult<()>;
    async fn read_file(&self, path: &str) -> FsResult<Bytes>;
    async fn write_file(&self, path: &str, data: Bytes, mode: u32) -> FsResult<()>;
    async fn read_dir(&self, path: &str) -> FsResult<Vec<SmbFileInfo>>;
    async fn umount(&self) -> FsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes() {
        let attrs = SmbFileAttributes(SmbFileAttributes::DIRECTORY | SmbFileAttributes::HIDDEN);
        assert!(attrs.is_directory());
        assert!(attrs.is_hidden());
        assert!(!attrs.is_readonly());
    }

    #[test]
    fn test_to_entry() {
        assert_eq!(SmbFileInfo::file("a.txt", 3).to_entry(), Entry::file("a.txt", 3));
        assert_eq!(SmbFileInfo::directory("d").to_entry(), Entry::directory("d"));
    }

    #[test]
    fn test_auth_debug_redacts_password() {
        let auth = SmbAuth::Ntlm {
            username: "alice".into(),
            password: "hunter2".into(),
            domain: None,
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
