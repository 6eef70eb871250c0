//! S3 implementation of [`StorageBackend`].

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig, timeout::TimeoutConfig};
use aws_sdk_s3::{Client, presigning::PresigningConfig, primitives::ByteStream};
use bytes::Bytes;
use registry_storage::{ListPage, StorageBackend, StorageError, StorageResult};

use crate::{
    config::S3BackendConfig,
    error::{Result, S3StorageError, is_not_found, sdk_error_to_storage_error},
};

/// Region used to look up a bucket's location when none is configured.
const BOOTSTRAP_REGION: &str = "us-east-1";

/// Response header naming the region a bucket lives in.
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Object store backend for AWS S3 and S3-compatible services (MinIO, R2,
/// Ceph RGW).
///
/// Cloning is cheap; clones share the SDK client and its connection pool.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend").field("bucket", &self.bucket).finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Creates a backend, resolving credentials and region through the
    /// standard AWS provider chain.
    ///
    /// When neither the configuration nor the environment names a region,
    /// the bucket's own region is looked up with a `HeadBucket` request.
    ///
    /// # Errors
    ///
    /// Returns [`S3StorageError::Config`] if the configuration is invalid or
    /// the bucket's region cannot be determined.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use registry_storage_s3::{S3Backend, S3BackendConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = S3BackendConfig::builder().bucket("registry").region("eu-west-1").build()?;
    /// let backend = S3Backend::new(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: S3BackendConfig) -> Result<Self> {
        config.validate()?;

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout)
            .operation_timeout(config.operation_timeout)
            .build();
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let mut shared = loader.load().await;
        if shared.region().is_none() {
            let region = discover_bucket_region(&shared, &config).await?;
            tracing::info!(bucket = %config.bucket, %region, "discovered bucket region");
            shared = shared.to_builder().region(Region::new(region)).build();
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = ?shared.region(),
            endpoint = ?config.endpoint,
            force_path_style = config.force_path_style,
            "S3 backend configured"
        );
        Ok(Self::from_client(s3_client(&shared, &config), config.bucket))
    }

    /// Creates a backend from an existing SDK client.
    #[must_use]
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn s3_client(shared: &SdkConfig, config: &S3BackendConfig) -> Client {
    let mut builder =
        aws_sdk_s3::config::Builder::from(shared).force_path_style(config.force_path_style);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }
    Client::from_conf(builder.build())
}

/// Asks the store where `config.bucket` lives, using a client pinned to
/// [`BOOTSTRAP_REGION`].
///
/// A bucket in another region answers with a redirect error that still
/// carries the region header, so both outcomes are inspected.
async fn discover_bucket_region(shared: &SdkConfig, config: &S3BackendConfig) -> Result<String> {
    let bootstrap = shared.to_builder().region(Region::from_static(BOOTSTRAP_REGION)).build();
    let client = s3_client(&bootstrap, config);

    let (modeled, header) = match client.head_bucket().bucket(&config.bucket).send().await {
        Ok(output) => (output.bucket_region().map(str::to_owned), None),
        Err(e) => {
            let header = e
                .raw_response()
                .and_then(|response| response.headers().get(BUCKET_REGION_HEADER))
                .map(str::to_owned);
            if header.is_none() {
                tracing::warn!(
                    bucket = %config.bucket,
                    error = %aws_sdk_s3::error::DisplayErrorContext(&e),
                    "bucket region lookup failed"
                );
            }
            (None, header)
        },
    };

    resolve_bucket_region(modeled.as_deref(), header.as_deref()).ok_or_else(|| {
        S3StorageError::Config(format!(
            "no region configured and the region of bucket '{}' could not be determined",
            config.bucket
        ))
    })
}

/// Picks the bucket region from a `HeadBucket` outcome: the modeled field of
/// a successful response, else the [`BUCKET_REGION_HEADER`] of the raw
/// response.
pub(crate) fn resolve_bucket_region(
    modeled: Option<&str>,
    header: Option<&str>,
) -> Option<String> {
    modeled
        .or(header)
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_owned)
}

/// `CopySource` value for `key` in `bucket`: the URL-encoded `bucket/key`.
pub(crate) fn copy_source(bucket: &str, key: &str) -> String {
    urlencoding::encode(&format!("{bucket}/{key}")).into_owned()
}

#[async_trait]
impl StorageBackend for S3Backend {
    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(sdk_error_to_storage_error("head", key, e)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| sdk_error_to_storage_error("list", prefix, e))?;

        let keys = output.contents().iter().filter_map(|o| o.key().map(str::to_owned)).collect();
        let continuation = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_owned)
        } else {
            None
        };
        Ok(ListPage { keys, continuation })
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error_to_storage_error("get", key, e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend_with_source("get", key, e))?;
        Ok(body.into_bytes())
    }

    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    async fn put(&self, key: &str, body: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error_to_storage_error("put", key, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn copy(&self, source: &str, destination: &str) -> StorageResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, source))
            .key(destination)
            .send()
            .await
            .map_err(|e| sdk_error_to_storage_error("copy", source, e))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn presign(&self, key: &str, expiry: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(expiry).map_err(S3StorageError::from)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| sdk_error_to_storage_error("presign", key, e))?;
        Ok(request.uri().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_region_prefers_modeled_field() {
        assert_eq!(
            resolve_bucket_region(Some("eu-central-1"), Some("us-west-2")).as_deref(),
            Some("eu-central-1")
        );
    }

    #[test]
    fn test_bucket_region_from_redirect_header() {
        // A 301 from the bootstrap region only carries the header.
        assert_eq!(
            resolve_bucket_region(None, Some("ap-southeast-2")).as_deref(),
            Some("ap-southeast-2")
        );
        assert_eq!(resolve_bucket_region(None, Some(" eu-west-1 ")).as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_bucket_region_unknown() {
        assert_eq!(resolve_bucket_region(None, None), None);
        assert_eq!(resolve_bucket_region(Some(""), None), None);
        assert_eq!(resolve_bucket_region(None, Some("  ")), None);
    }

    #[test]
    fn test_copy_source_is_url_encoded() {
        assert_eq!(
            copy_source("registry", "modules/acme/vpc/aws/1.0.0/vpc.tar.gz"),
            "registry%2Fmodules%2Facme%2Fvpc%2Faws%2F1.0.0%2Fvpc.tar.gz"
        );
        assert_eq!(copy_source("b", "providers/a b/x+y.zip"), "b%2Fproviders%2Fa%20b%2Fx%2By.zip");
    }
}
