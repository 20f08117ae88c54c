//! Error types for naivefs

use thiserror::Error;

/// Result type alias
pub type FsResult<T> = Result<T, FsError>;

/// Main error type
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider API error ({provider}): {message}")]
    ProviderApi { provider: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,

    /// The copy landed but the source could not be removed, so the data
    /// now lives at both `src` and `dst`.
    #[error("Move {src} -> {dst} copied but failed to remove source: {source}")]
    PartialMove {
        src: String,
        dst: String,
        #[source]
        source: Box<FsError>,
    },
}

impl FsError {
    /// Absence of the target, whether reported by this layer or by the OS.
    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::NotFound(_) => true,
            FsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            FsError::Network(_)
                | FsError::AuthFailed(_)
                | FsError::ProviderApi { .. }
                | FsError::Cancelled
        )
    }

    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        FsError::ProviderApi {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(FsError::NotFound("file.txt".into()).is_not_found());
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(FsError::from(io_err).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(!FsError::from(denied).is_not_found());
        assert!(!FsError::Network("connection reset".into()).is_not_found());
    }

    #[test]
    fn test_is_transport_error() {
        assert!(FsError::Network("connection refused".into()).is_transport_error());
        assert!(FsError::AuthFailed("bad password".into()).is_transport_error());
        assert!(FsError::provider("s3", "500").is_transport_error());
        assert!(FsError::Cancelled.is_transport_error());

        assert!(!FsError::NotFound("file.txt".into()).is_transport_error());
        assert!(!FsError::Config("missing bucket".into()).is_transport_error());
    }

    #[test]
    fn test_error_display() {
        let err = FsError::NotFound("/path/to/file".into());
        assert_eq!(format!("{}", err), "Path not found: /path/to/file");

        let err = FsError::provider("s3", "403 Forbidden");
        assert_eq!(format!("{}", err), "Provider API error (s3): 403 Forbidden");
    }

    #[test]
    fn test_partial_move_keeps_cause() {
        use std::error::Error as _;

        let err = FsError::PartialMove {
            src: "a.txt".into(),
            dst: "b.txt".into(),
            source: Box::new(FsError::Network("session dropped".into())),
        };
        assert!(format!("{}", err).contains("a.txt -> b.txt"));
        let cause = err.source().map(|s| s.to_string());
        assert_eq!(cause.as_deref(), Some("Network error: session dropped"));
    }
}
