//! naivefs core
//!
//! Core traits, types, and abstractions for the unified filesystem interface.

pub mod backend;
pub mod entry;
pub mod error;
pub mod file;
pub mod path;

pub use backend::{Capabilities, FileSystem, FsType};
pub use entry::{Entry, EntryKind};
pub use error::{FsError, FsResult};
pub use file::{copy, move_file, File};
pub use path::PathResolver;
