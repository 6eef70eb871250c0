//! Configuration for the S3 storage backend.
//!
//! [`S3BackendConfig`] names the bucket and tells the SDK where to find it.
//! Credentials always come from the standard AWS provider chain.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, S3StorageError};

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-operation timeout (30 seconds).
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`S3Backend`](crate::S3Backend).
///
/// # Example
///
/// ```
/// use registry_storage_s3::S3BackendConfig;
///
/// // MinIO running locally
/// let config = S3BackendConfig::builder()
///     .bucket("registry")
///     .region("us-east-1")
///     .endpoint("http://localhost:9000")
///     .force_path_style(true)
///     .build()?;
///
/// assert_eq!(config.bucket(), "registry");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3BackendConfig {
    /// Bucket holding the registry.
    pub(crate) bucket: String,

    /// AWS region. When absent the SDK default chain is used, and if that
    /// has none either the bucket's own region is looked up.
    #[serde(default)]
    pub(crate) region: Option<String>,

    /// Custom endpoint URL for S3-compatible stores.
    #[serde(default)]
    pub(crate) endpoint: Option<String>,

    /// Use `endpoint/bucket/key` addressing instead of virtual-hosted buckets.
    #[serde(default)]
    pub(crate) force_path_style: bool,

    /// Connection timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub(crate) connect_timeout: Duration,

    /// Per-operation timeout, including retries.
    #[serde(with = "humantime_serde", default = "default_operation_timeout")]
    pub(crate) operation_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

#[bon::bon]
impl S3BackendConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Arguments
    ///
    /// * `bucket` - Bucket name. Must be non-empty and contain no `/`.
    ///
    /// # Optional Fields
    ///
    /// * `region` - AWS region (default: SDK provider chain, then the
    ///   bucket's region).
    /// * `endpoint` - Custom `http://` or `https://` endpoint (default: AWS).
    /// * `force_path_style` - Path-style addressing (default: false).
    /// * `connect_timeout` - Connection timeout (default: 5 seconds).
    /// * `operation_timeout` - Per-operation timeout (default: 30 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`S3StorageError::Config`] if a field is invalid.
    #[builder]
    pub fn new(
        #[builder(into)] bucket: String,
        #[builder(into)] region: Option<String>,
        #[builder(into)] endpoint: Option<String>,
        #[builder(default)] force_path_style: bool,
        #[builder(default = DEFAULT_CONNECT_TIMEOUT)] connect_timeout: Duration,
        #[builder(default = DEFAULT_OPERATION_TIMEOUT)] operation_timeout: Duration,
    ) -> Result<Self> {
        let config =
            Self { bucket, region, endpoint, force_path_style, connect_timeout, operation_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// # Errors
    ///
    /// Returns [`S3StorageError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(S3StorageError::Config("bucket cannot be empty".into()));
        }
        if self.bucket.contains('/') {
            return Err(S3StorageError::Config(format!(
                "bucket must not contain '/': {}",
                self.bucket
            )));
        }
        if matches!(&self.region, Some(region) if region.is_empty()) {
            return Err(S3StorageError::Config("region cannot be empty when set".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(S3StorageError::Config(format!(
                    "endpoint must start with http:// or https://, got '{endpoint}'"
                )));
            }
        }
        if self.connect_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(S3StorageError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the configured region, if any.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns the custom endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns whether path-style addressing is forced.
    #[must_use]
    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the per-operation timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = S3BackendConfig::builder().bucket("registry").build().unwrap();
        assert_eq!(config.bucket(), "registry");
        assert!(config.region().is_none());
        assert!(config.endpoint().is_none());
        assert!(!config.force_path_style());
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.operation_timeout(), DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            S3BackendConfig::builder().bucket("").build(),
            Err(S3StorageError::Config(_))
        ));
        assert!(S3BackendConfig::builder().bucket("a/b").build().is_err());
        assert!(S3BackendConfig::builder().bucket("b").region("").build().is_err());
        assert!(S3BackendConfig::builder().bucket("b").endpoint("localhost:9000").build().is_err());
        assert!(
            S3BackendConfig::builder()
                .bucket("b")
                .operation_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_deserialization() {
        let json = r#"{
            "bucket": "registry",
            "endpoint": "http://minio:9000",
            "force_path_style": true,
            "operation_timeout": "1m"
        }"#;
        let config: S3BackendConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.endpoint(), Some("http://minio:9000"));
        assert!(config.force_path_style());
        assert_eq!(config.operation_timeout(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_deserialization_rejects_unknown_fields() {
        let result: std::result::Result<S3BackendConfig, _> =
            serde_json::from_str(r#"{"bucket": "b", "prefix": "x"}"#);
        assert!(result.is_err());
    }
}
