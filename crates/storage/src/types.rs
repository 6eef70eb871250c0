//! Registry entities reconstructed from object keys.
//!
//! None of these types are persisted as-is. A [`Module`] or [`Provider`] is
//! rebuilt from the keys (and, for providers, the checksum manifest) every
//! time it is requested; download URLs are presigned at read time.

use serde::{Deserialize, Serialize};

/// A module version and the URL its archive can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Publisher namespace.
    pub namespace: String,
    /// Module name.
    pub name: String,
    /// Target provider of the module (e.g. `aws`).
    pub provider: String,
    /// Module version.
    pub version: String,
    /// Presigned archive URL.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub download_url: String,
}

/// One platform build of a provider version, with everything a client needs
/// to download and verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct Provider {
    /// Publisher namespace.
    pub namespace: String,
    /// Provider name (without the `terraform-provider-` prefix).
    pub name: String,
    /// Provider version.
    pub version: String,
    /// Target operating system.
    pub os: String,
    /// Target CPU architecture.
    pub arch: String,
    /// Archive filename, `terraform-provider-<name>_<version>_<os>_<arch>.zip`.
    pub filename: String,
    /// Hex SHA-256 digest of the archive, taken from the shasums manifest.
    #[builder(default)]
    pub shasum: String,
    /// Presigned archive URL.
    #[builder(default)]
    pub download_url: String,
    /// Presigned URL of the version's `SHA256SUMS` manifest.
    #[builder(default)]
    pub shasums_url: String,
    /// Presigned URL of the manifest's detached signature.
    #[builder(default)]
    pub shasums_signature_url: String,
    /// Keys that may have signed the manifest.
    #[builder(default)]
    pub signing_keys: SigningKeys,
}

impl Provider {
    /// Returns the platform this artifact was built for.
    #[must_use]
    pub fn platform(&self) -> Platform {
        Platform::new(&self.os, &self.arch)
    }
}

/// An (operating system, architecture) build target.
///
/// Ordering is by `os`, then `arch`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// CPU architecture, e.g. `amd64`.
    pub arch: String,
}

impl Platform {
    /// Creates a platform pair.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self { os: os.into(), arch: arch.into() }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// A provider version with the platforms it was published for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVersion {
    /// Provider version.
    pub version: String,
    /// Platforms, deduplicated and sorted by `(os, arch)`.
    pub platforms: Vec<Platform>,
}

/// The public keys trusted to sign provider releases in one namespace.
///
/// Serialized in the registry protocol's shape:
///
/// ```json
/// {"gpg_public_keys": [{"key_id": "51852D87348FFC4C", "ascii_armor": "-----BEGIN PGP ..."}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeys {
    /// GPG public keys.
    pub gpg_public_keys: Vec<GpgPublicKey>,
}

/// A single ASCII-armored GPG public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpgPublicKey {
    /// Upper-case hex key ID.
    pub key_id: String,
    /// ASCII-armored public key block.
    pub ascii_armor: String,
    /// Optional trust signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_signature: Option<String>,
    /// Optional name of the key's issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Optional URL describing the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}
