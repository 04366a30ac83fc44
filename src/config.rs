//! Configuration loading and types for the storage gateway.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct: a set of named backing stores, a set of buckets
//! referencing those stores, and an optional default bucket name.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::errors::StorageError;

/// Default admission-gate capacity per bucket.
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: usize = 100;

/// Default multipart part size (5 MiB).
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of parallel part uploads.
pub const DEFAULT_PART_CONCURRENCY: usize = 5;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Default bucket name to use when a request does not name one.
    #[serde(default)]
    pub default: String,

    /// Named backing-store endpoints referenced by bucket configs.
    #[serde(default)]
    pub stores: HashMap<String, StoreConfig>,

    /// Pre-configured bucket definitions.
    #[serde(default)]
    pub buckets: HashMap<String, BucketConfig>,
}

/// A named backing-store endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store kind: `s3` or `memory`.
    #[serde(default = "default_store_kind")]
    pub kind: String,

    /// AWS region (e.g. `us-east-1`).
    #[serde(default)]
    pub region: String,

    /// Custom S3-compatible endpoint URL (e.g. MinIO).  Leave empty for
    /// the default AWS endpoint.
    #[serde(default)]
    pub endpoint: String,

    /// Static credentials for the store.
    #[serde(default)]
    pub credentials: Credentials,

    /// Force path-style URL addressing (implied by a custom endpoint).
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            region: String::new(),
            endpoint: String::new(),
            credentials: Credentials::default(),
            force_path_style: false,
        }
    }
}

/// Static store credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    /// Access key ID.
    #[serde(default)]
    pub key: String,

    /// Secret access key.
    #[serde(default)]
    pub secret: String,

    /// Session token for temporary credentials (optional).
    #[serde(default)]
    pub token: String,
}

impl StoreConfig {
    /// Validate a store configuration under its name.
    pub fn validate(&self, name: &str) -> Result<(), StorageError> {
        match self.kind.as_str() {
            "memory" => Ok(()),
            "s3" => {
                if self.region.is_empty() {
                    return Err(StorageError::InvalidConfig {
                        reason: format!("store '{name}': region is required"),
                    });
                }
                if self.credentials.key.is_empty() {
                    return Err(StorageError::InvalidConfig {
                        reason: format!("store '{name}': credentials.key is required"),
                    });
                }
                if self.credentials.secret.is_empty() {
                    return Err(StorageError::InvalidConfig {
                        reason: format!("store '{name}': credentials.secret is required"),
                    });
                }
                Ok(())
            }
            other => Err(StorageError::InvalidConfig {
                reason: format!("store '{name}': unknown kind '{other}'"),
            }),
        }
    }
}

/// A single bucket configuration as supplied by the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketConfig {
    /// Name of the [`StoreConfig`] entry backing this bucket.
    #[serde(default)]
    pub store: String,

    /// The target bucket identifier in the backing store.
    #[serde(default)]
    pub bucket: String,

    /// Key prefix prepended verbatim to every caller-supplied path
    /// (e.g. `uploads/`).
    #[serde(default)]
    pub prefix: String,

    /// Default visibility: `public` or `private` (default `private`).
    #[serde(default)]
    pub visibility: String,

    /// Maximum concurrent operations per bucket; values <= 0 default
    /// to 100.
    #[serde(default)]
    pub max_concurrent_operations: i64,

    /// Multipart part size in bytes; values <= 0 default to 5 MiB.
    #[serde(default)]
    pub part_size: i64,

    /// Parallel part uploads; values <= 0 default to 5.
    #[serde(default)]
    pub part_concurrency: i64,
}

/// Validated, defaulted bucket settings.  Immutable once the bucket is
/// registered.
#[derive(Debug, Clone)]
pub struct BucketSettings {
    pub store: String,
    pub bucket: String,
    pub prefix: String,
    pub visibility: String,
    pub max_concurrent_operations: usize,
    pub part_size: u64,
    pub part_concurrency: usize,
}

impl BucketConfig {
    /// Validate this configuration and apply defaults, producing the
    /// settings the registry will hold.
    pub fn into_settings(&self) -> Result<BucketSettings, StorageError> {
        if self.store.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "store reference is required".to_string(),
            });
        }

        if self.bucket.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "bucket name is required".to_string(),
            });
        }

        if !self.visibility.is_empty()
            && self.visibility != "public"
            && self.visibility != "private"
        {
            return Err(StorageError::InvalidConfig {
                reason: format!(
                    "visibility must be 'public' or 'private', got '{}'",
                    self.visibility
                ),
            });
        }

        let visibility = if self.visibility.is_empty() {
            "private".to_string()
        } else {
            self.visibility.clone()
        };

        let max_concurrent_operations = if self.max_concurrent_operations <= 0 {
            DEFAULT_MAX_CONCURRENT_OPERATIONS
        } else {
            self.max_concurrent_operations as usize
        };

        let part_size = if self.part_size <= 0 {
            DEFAULT_PART_SIZE
        } else {
            self.part_size as u64
        };

        let part_concurrency = if self.part_concurrency <= 0 {
            DEFAULT_PART_CONCURRENCY
        } else {
            self.part_concurrency as usize
        };

        Ok(BucketSettings {
            store: self.store.clone(),
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            visibility,
            max_concurrent_operations,
            part_size,
            part_concurrency,
        })
    }
}

impl Config {
    /// Validate the full configuration.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.buckets.is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "at least one bucket must be configured".to_string(),
            });
        }

        for (name, store) in &self.stores {
            store.validate(name)?;
        }

        for (name, bucket) in &self.buckets {
            let settings = bucket.into_settings().map_err(|e| StorageError::InvalidConfig {
                reason: format!("bucket '{name}': {e}"),
            })?;
            if !self.stores.contains_key(&settings.store) {
                return Err(StorageError::InvalidConfig {
                    reason: format!(
                        "bucket '{name}': store '{}' is not configured",
                        settings.store
                    ),
                });
            }
        }

        if !self.default.is_empty() && !self.buckets.contains_key(&self.default) {
            return Err(StorageError::InvalidConfig {
                reason: format!("default bucket '{}' not found in configuration", self.default),
            });
        }

        Ok(())
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_store_kind() -> String {
    "s3".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn memory_store() -> StoreConfig {
        StoreConfig {
            kind: "memory".to_string(),
            ..StoreConfig::default()
        }
    }

    fn basic_bucket() -> BucketConfig {
        BucketConfig {
            store: "main".to_string(),
            bucket: "app-data".to_string(),
            ..BucketConfig::default()
        }
    }

    #[test]
    fn test_settings_defaults_applied() {
        let settings = basic_bucket().into_settings().unwrap();
        assert_eq!(settings.visibility, "private");
        assert_eq!(settings.max_concurrent_operations, 100);
        assert_eq!(settings.part_size, 5 * 1024 * 1024);
        assert_eq!(settings.part_concurrency, 5);
    }

    #[test]
    fn test_settings_explicit_values_kept() {
        let cfg = BucketConfig {
            visibility: "public".to_string(),
            max_concurrent_operations: 2,
            part_size: 1024,
            part_concurrency: 3,
            ..basic_bucket()
        };
        let settings = cfg.into_settings().unwrap();
        assert_eq!(settings.visibility, "public");
        assert_eq!(settings.max_concurrent_operations, 2);
        assert_eq!(settings.part_size, 1024);
        assert_eq!(settings.part_concurrency, 3);
    }

    #[test]
    fn test_bucket_missing_fields_rejected() {
        let no_store = BucketConfig {
            store: String::new(),
            ..basic_bucket()
        };
        assert!(no_store.into_settings().is_err());

        let no_bucket = BucketConfig {
            bucket: String::new(),
            ..basic_bucket()
        };
        assert!(no_bucket.into_settings().is_err());
    }

    #[test]
    fn test_bad_visibility_rejected() {
        let cfg = BucketConfig {
            visibility: "internal".to_string(),
            ..basic_bucket()
        };
        let err = cfg.into_settings().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("internal"));
    }

    #[test]
    fn test_s3_store_requires_region_and_credentials() {
        let empty = StoreConfig::default();
        assert!(empty.validate("s").is_err());

        let with_region = StoreConfig {
            region: "us-east-1".to_string(),
            ..StoreConfig::default()
        };
        assert!(with_region.validate("s").is_err());

        let full = StoreConfig {
            region: "us-east-1".to_string(),
            credentials: Credentials {
                key: "ak".to_string(),
                secret: "sk".to_string(),
                token: String::new(),
            },
            ..StoreConfig::default()
        };
        assert!(full.validate("s").is_ok());
    }

    #[test]
    fn test_memory_store_needs_nothing() {
        assert!(memory_store().validate("m").is_ok());
    }

    #[test]
    fn test_unknown_store_kind_rejected() {
        let cfg = StoreConfig {
            kind: "ftp".to_string(),
            ..StoreConfig::default()
        };
        let err = cfg.validate("legacy").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_config_requires_buckets() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_unresolved_store_reference() {
        let mut config = Config::default();
        config.buckets.insert("b".to_string(), basic_bucket());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_config_default_must_exist() {
        let mut config = Config::default();
        config.stores.insert("main".to_string(), memory_store());
        config.buckets.insert("b".to_string(), basic_bucket());
        config.default = "missing".to_string();
        assert!(config.validate().is_err());

        config.default = "b".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_yaml() {
        let yaml = r#"
default: uploads
stores:
  main:
    kind: memory
buckets:
  uploads:
    store: main
    bucket: app-uploads
    prefix: "uploads/"
    visibility: public
    max_concurrent_operations: 10
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default, "uploads");
        assert_eq!(config.stores["main"].kind, "memory");

        let settings = config.buckets["uploads"].into_settings().unwrap();
        assert_eq!(settings.bucket, "app-uploads");
        assert_eq!(settings.prefix, "uploads/");
        assert_eq!(settings.visibility, "public");
        assert_eq!(settings.max_concurrent_operations, 10);
        assert!(config.validate().is_ok());
    }
}
