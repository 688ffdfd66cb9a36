use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::download::DEFAULT_DOWNLOAD_TIMEOUT;

pub const DEFAULT_STATES_PATH: &str = "states";
pub const DEFAULT_LOCAL_STORAGE_PATH: &str = "./storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("STORAGE_TYPE must be 'local' or 's3', got '{0}'")]
    UnknownStorageType(String),
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Environment-driven settings shared by the Lambda binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub storage: StorageKind,
    pub states_path: String,
    pub local_storage_path: PathBuf,
    pub state_bucket: Option<String>,
    pub download_bucket: Option<String>,
    pub download_timeout: Duration,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let storage = match value("STORAGE_TYPE").as_deref() {
            None | Some("local") => StorageKind::Local,
            Some("s3") => StorageKind::S3,
            Some(other) => return Err(ConfigError::UnknownStorageType(other.to_string())),
        };

        let state_bucket = value("AWS_S3_STATE_BUCKET");
        if storage == StorageKind::S3 && state_bucket.is_none() {
            return Err(ConfigError::Missing("AWS_S3_STATE_BUCKET"));
        }

        let download_timeout = match value("DOWNLOAD_TIMEOUT_SECS") {
            None => DEFAULT_DOWNLOAD_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "DOWNLOAD_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            storage,
            states_path: value("STATES_PATH")
                .map(|path| path.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_STATES_PATH.to_string()),
            local_storage_path: value("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_STORAGE_PATH)),
            state_bucket,
            download_bucket: value("DOWNLOAD_BUCKET"),
            download_timeout,
        })
    }

    pub fn require_download_bucket(&self) -> Result<&str, ConfigError> {
        self.download_bucket
            .as_deref()
            .ok_or(ConfigError::Missing("DOWNLOAD_BUCKET"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_local_storage() {
        let config = config(&[]).expect("empty env should be valid");
        assert_eq!(config.storage, StorageKind::Local);
        assert_eq!(config.states_path, "states");
        assert_eq!(config.local_storage_path, PathBuf::from("./storage"));
        assert_eq!(config.download_timeout, Duration::from_secs(30));
        assert_eq!(
            config.require_download_bucket(),
            Err(ConfigError::Missing("DOWNLOAD_BUCKET"))
        );
    }

    #[test]
    fn s3_storage_needs_a_bucket() {
        assert_eq!(
            config(&[("STORAGE_TYPE", "s3")]),
            Err(ConfigError::Missing("AWS_S3_STATE_BUCKET"))
        );

        let config = config(&[
            ("STORAGE_TYPE", "s3"),
            ("AWS_S3_STATE_BUCKET", "state-bucket"),
            ("STATES_PATH", "/workflows/states/"),
        ])
        .expect("s3 config should be valid");
        assert_eq!(config.storage, StorageKind::S3);
        assert_eq!(config.state_bucket.as_deref(), Some("state-bucket"));
        assert_eq!(config.states_path, "workflows/states");
    }

    #[test]
    fn rejects_unknown_storage_and_bad_timeout() {
        assert_eq!(
            config(&[("STORAGE_TYPE", "gcs")]),
            Err(ConfigError::UnknownStorageType("gcs".to_string()))
        );
        assert!(matches!(
            config(&[("DOWNLOAD_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            config(&[("DOWNLOAD_TIMEOUT_SECS", " 5 ")])
                .expect("timeout should parse")
                .download_timeout,
            Duration::from_secs(5)
        );
    }
}
