//! Backend configuration
//!
//! ```toml
//! [backends.scratch]
//! type = "local"
//! base_dir = "/tmp/scratch"
//!
//! [backends.office]
//! type = "smb"
//! server = "fileserver"
//! share = "public"
//!
//! [backends.archive]
//! type = "s3"
//! endpoint = "minio:9000"
//! bucket = "archive"
//! use_ssl = false
//! ```

use naivefs_core::{FsError, FsResult, FsType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::local::LocalConfig;
use crate::smb::SmbConfig;

#[cfg(feature = "s3")]
use crate::s3::S3Config;

/// Configuration of a single backend, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local(LocalConfig),
    Smb(SmbConfig),
    #[cfg(feature = "s3")]
    S3(S3Config),
}

impl BackendConfig {
    pub fn fs_type(&self) -> FsType {
        match self {
            BackendConfig::Local(_) => FsType::Local,
            BackendConfig::Smb(_) => FsType::Smb,
            #[cfg(feature = "s3")]
            BackendConfig::S3(_) => FsType::S3,
        }
    }
}

/// Named backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsConfig {
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

impl FsConfig {
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        toml::from_str(s).map_err(|e| FsError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> FsResult<String> {
        toml::to_string(self).map_err(|e| FsError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[backends.scratch]
type = "local"
base_dir = "/tmp/scratch"

[backends.office]
type = "smb"
server = "fileserver"
username = "alice"
password = "secret"
share = "public"

[backends.archive]
type = "s3"
endpoint = "minio:9000"
bucket = "archive"
use_ssl = false
"#;

    #[test]
    fn test_parse_all_backend_types() {
        let config = FsConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.backends.len(), 3);

        match &config.backends["scratch"] {
            BackendConfig::Local(local) => assert_eq!(local.base_dir, "/tmp/scratch"),
            other => panic!("unexpected: {:?}", other),
        }
        match &config.backends["office"] {
            BackendConfig::Smb(smb) => {
                assert_eq!(smb.port, 445);
                assert_eq!(smb.share, "public");
                assert_eq!(smb.base_dir, "");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(config.backends["archive"].fs_type(), FsType::S3);
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let err = FsConfig::from_toml_str("[backends.x]\ntype = \"ftp\"\n").unwrap_err();
        assert!(matches!(err, FsError::Config(_)));
    }

    #[test]
    fn test_missing_required_field_is_config_error() {
        let err = FsConfig::from_toml_str("[backends.x]\ntype = \"smb\"\nserver = \"h\"\n")
            .unwrap_err();
        assert!(matches!(err, FsError::Config(_)));
    }

    #[test]
    fn test_empty_config() {
        assert!(FsConfig::from_toml_str("").unwrap().backends.is_empty());
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let config = FsConfig::from_toml_str(SAMPLE).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["backends"]["scratch"]["type"], "local");
        assert_eq!(json["backends"]["archive"]["use_ssl"], false);

        let again = FsConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(again.backends.len(), 3);
    }
}
