//! S3-compatible object store backend for the registry storage engine.
//!
//! [`S3Backend`] implements [`registry_storage::StorageBackend`] on top of
//! the AWS SDK. It works against AWS S3 and against S3-compatible services
//! (MinIO, Cloudflare R2, Ceph RGW) via a custom endpoint and path-style
//! addressing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use registry_storage::{RegistryConfig, RegistryStorage};
//! use registry_storage_s3::{S3Backend, S3BackendConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = S3Backend::new(
//!     S3BackendConfig::builder()
//!         .bucket("registry")
//!         .region("us-east-1")
//!         .endpoint("http://localhost:9000")
//!         .force_path_style(true)
//!         .build()?,
//! )
//! .await?;
//!
//! let config = RegistryConfig::builder().prefix("registry").build()?;
//! let storage = RegistryStorage::new(Arc::new(backend), &config);
//! # Ok(())
//! # }
//! ```
//!
//! # Error mapping
//!
//! | SDK outcome              | [`StorageError`](registry_storage::StorageError) |
//! |--------------------------|--------------------------------------------------|
//! | HTTP 404                 | `NotFound` (`exists` returns `Ok(false)`)        |
//! | HTTP 404 `NoSuchBucket`  | `Backend`                                        |
//! | SDK timeout              | `Timeout`                                        |
//! | anything else            | `Backend`                                        |

#![deny(unsafe_code)]

mod backend;
mod config;
mod error;

pub use backend::S3Backend;
pub use config::S3BackendConfig;
pub use error::{Result, S3StorageError};
