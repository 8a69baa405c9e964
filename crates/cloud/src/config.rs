//! Storage target configuration and validation.
//!
//! The parameter set is opaque key/value text so schedules and API requests
//! can carry it without knowing the target kind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Supported target kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    S3,
}

impl StorageKind {
    pub fn from_name(name: &str) -> Result<Self, StorageError> {
        match name {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(StorageError::InvalidConfig(format!(
                "Unknown storage kind '{other}'. Must be one of: local, s3"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl StorageConfig {
    pub fn local(base_path: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Local.name().to_string(),
            params: HashMap::from([("base_path".to_string(), base_path.into())]),
        }
    }

    /// Check that the parameters required by the kind are present.
    ///
    /// - `local`: requires `base_path`
    /// - `s3`: requires `bucket` and `region`; `endpoint`, `access_key` and
    ///   `secret_key` are optional, but the two keys go together
    pub fn validate(&self) -> Result<StorageKind, StorageError> {
        let kind = StorageKind::from_name(&self.kind)?;
        match kind {
            StorageKind::Local => {
                self.require("base_path")?;
            }
            StorageKind::S3 => {
                self.require("bucket")?;
                self.require("region")?;
                if self.param("access_key").is_some() != self.param("secret_key").is_some() {
                    return Err(StorageError::InvalidConfig(
                        "'access_key' and 'secret_key' must be given together".into(),
                    ));
                }
            }
        }
        Ok(kind)
    }

    /// Non-empty parameter value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, StorageError> {
        self.param(key).ok_or_else(|| {
            StorageError::InvalidConfig(format!(
                "Storage kind '{}' requires a non-empty '{key}' parameter",
                self.kind
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config(kind: &str, params: &[(&str, &str)]) -> StorageConfig {
        StorageConfig {
            kind: kind.into(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn local_requires_base_path() {
        assert_eq!(
            config("local", &[("base_path", "/var/backups")]).validate().unwrap(),
            StorageKind::Local
        );
        assert_matches!(
            config("local", &[("base_path", "  ")]).validate(),
            Err(StorageError::InvalidConfig(_))
        );
    }

    #[test]
    fn s3_requires_bucket_and_region() {
        assert!(config("s3", &[("bucket", "b"), ("region", "eu-west-1")])
            .validate()
            .is_ok());
        assert!(config("s3", &[("bucket", "b")]).validate().is_err());
        assert!(config("s3", &[("region", "r")]).validate().is_err());
    }

    #[test]
    fn s3_keys_go_together() {
        let c = config(
            "s3",
            &[("bucket", "b"), ("region", "r"), ("access_key", "AK")],
        );
        assert!(c.validate().is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(config("ftp", &[]).validate().is_err());
    }
}
