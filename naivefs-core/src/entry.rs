//! Directory listing entries

use serde::{Deserialize, Serialize};

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// A named child returned by [`FileSystem::read_dir`](crate::FileSystem::read_dir)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    /// Byte length for files; always 0 for directories.
    pub size: u64,
    pub kind: EntryKind,
}

impl Entry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), size, kind: EntryKind::File }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self { name: name.into(), size: 0, kind: EntryKind::Directory }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
