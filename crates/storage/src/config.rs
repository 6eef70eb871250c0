//! Configuration for the registry storage facade.
//!
//! [`RegistryConfig`] holds the backend-independent settings: where in the
//! bucket the registry lives, how module archives are named and how long
//! presigned URLs stay valid. Backend connection settings (bucket, region,
//! endpoint) belong to the backend crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{StorageError, StorageResult},
    keys::{DEFAULT_MODULE_ARCHIVE_FORMAT, KeyScheme},
};

/// Default validity of presigned download URLs (30 seconds).
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(30);

/// Longest presigned URL validity accepted (7 days, the SigV4 limit).
pub const MAX_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settings for [`RegistryStorage`](crate::RegistryStorage).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use registry_storage::RegistryConfig;
///
/// let config = RegistryConfig::builder()
///     .prefix("terraform")
///     .module_archive_format("zip")
///     .signed_url_expiry(Duration::from_secs(300))
///     .build()?;
///
/// assert_eq!(config.prefix(), "terraform");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Key prefix inside the bucket (no leading or trailing `/`).
    #[serde(default)]
    prefix: String,

    /// Module archive extension, e.g. `tar.gz` or `zip`.
    #[serde(default = "default_module_archive_format")]
    module_archive_format: String,

    /// Validity of presigned URLs.
    #[serde(with = "humantime_serde", default = "default_signed_url_expiry")]
    signed_url_expiry: Duration,
}

fn default_module_archive_format() -> String {
    DEFAULT_MODULE_ARCHIVE_FORMAT.to_owned()
}

fn default_signed_url_expiry() -> Duration {
    DEFAULT_SIGNED_URL_EXPIRY
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            module_archive_format: default_module_archive_format(),
            signed_url_expiry: DEFAULT_SIGNED_URL_EXPIRY,
        }
    }
}

#[bon::bon]
impl RegistryConfig {
    /// Creates a validated configuration.
    ///
    /// # Optional Fields
    ///
    /// * `prefix` - Key prefix inside the bucket (default: bucket root).
    /// * `module_archive_format` - Module archive extension (default: `tar.gz`).
    /// * `signed_url_expiry` - Presigned URL validity (default: 30 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the archive format is empty,
    /// starts with `.` or contains `/`, or if the expiry is zero or longer
    /// than [`MAX_SIGNED_URL_EXPIRY`].
    #[builder]
    pub fn new(
        #[builder(into, default)] prefix: String,
        #[builder(into, default = default_module_archive_format())] module_archive_format: String,
        #[builder(default = DEFAULT_SIGNED_URL_EXPIRY)] signed_url_expiry: Duration,
    ) -> StorageResult<Self> {
        let config = Self {
            prefix: prefix.trim_matches('/').to_owned(),
            module_archive_format,
            signed_url_expiry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Call this after deserializing a configuration.
    ///
    /// # Errors
    ///
    /// See [`RegistryConfig::builder`].
    pub fn validate(&self) -> StorageResult<()> {
        let format = &self.module_archive_format;
        if format.is_empty() {
            return Err(StorageError::config("module_archive_format cannot be empty"));
        }
        if format.starts_with('.') || format.contains('/') {
            return Err(StorageError::config(format!(
                "module_archive_format must be a bare extension like 'tar.gz', got '{format}'"
            )));
        }
        if self.signed_url_expiry.is_zero() {
            return Err(StorageError::config("signed_url_expiry must be positive"));
        }
        if self.signed_url_expiry > MAX_SIGNED_URL_EXPIRY {
            return Err(StorageError::config(format!(
                "signed_url_expiry cannot exceed {}s",
                MAX_SIGNED_URL_EXPIRY.as_secs()
            )));
        }
        Ok(())
    }

    /// Returns the normalized key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the module archive format.
    #[must_use]
    pub fn module_archive_format(&self) -> &str {
        &self.module_archive_format
    }

    /// Returns the presigned URL validity.
    #[must_use]
    pub fn signed_url_expiry(&self) -> Duration {
        self.signed_url_expiry
    }

    /// Builds the key scheme for this configuration.
    #[must_use]
    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme::new(&self.prefix, self.module_archive_format.clone())
    }
}
