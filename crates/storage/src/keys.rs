//! Mapping between registry coordinates and object keys.
//!
//! All registry state lives in object keys, so this module is the data model.
//! Keys are built from an optional bucket prefix, an entity-kind segment and
//! the coordinate segments, in this order:
//!
//! | Entity | Key |
//! |--------|-----|
//! | Module archive | `<prefix>/modules/<namespace>/<name>/<provider>/<version>/<name>.<format>` |
//! | Provider release file | `<prefix>/providers/<namespace>/<name>/<filename>` |
//! | Signing keys | `<prefix>/providers/<namespace>/signing-keys.json` |
//!
//! Provider archives are named `terraform-provider-<name>_<version>_<os>_<arch>.zip`
//! and sit next to `terraform-provider-<name>_<version>_SHA256SUMS` and its
//! `.sig`.
//!
//! # Legacy Layout
//!
//! Before the current layout, coordinates were stored as hive-style
//! `field=value` segments:
//!
//! ```text
//! <prefix>/modules/namespace=<ns>/name=<name>/provider=<p>/version=<v>/<ns>-<name>-<p>-<v>.<format>
//! <prefix>/providers/namespace=<ns>/name=<name>/version=<v>/os=<os>/arch=<arch>/<archive>.zip
//! <prefix>/providers/namespace=<ns>/name=<name>/version=<v>/<shasums file>
//! <prefix>/providers/namespace=<ns>/signing-keys.json
//! ```
//!
//! Legacy keys are only read by [`migration`](crate::migration). Coordinates
//! and filenames may not contain `=`, so no current-layout key is ever
//! mistaken for a legacy one.
//!
//! # Parsing
//!
//! Reverse parsers return `None` instead of an error: listings routinely
//! contain objects that are not registry artifacts, and those are skipped.

use crate::error::{StorageError, StorageResult};

/// Top-level segment for module archives.
pub const MODULES_SEGMENT: &str = "modules";

/// Top-level segment for provider release files and signing keys.
pub const PROVIDERS_SEGMENT: &str = "providers";

/// Filename of a namespace's signing keys document.
pub const SIGNING_KEYS_FILENAME: &str = "signing-keys.json";

/// Prefix of every provider binary name.
pub const PROVIDER_BINARY_PREFIX: &str = "terraform-provider-";

/// Module archive format used when none is configured.
pub const DEFAULT_MODULE_ARCHIVE_FORMAT: &str = "tar.gz";

const PROVIDER_ARCHIVE_EXTENSION: &str = ".zip";
const SHASUMS_SUFFIX: &str = "_SHA256SUMS";
const SIGNATURE_EXTENSION: &str = ".sig";
const HIVE_SEPARATOR: char = '=';

/// Ordered coordinate fields of a key layout.
///
/// The same table drives key construction, reverse parsing and legacy
/// detection, so every layout has exactly one definition.
struct Layout {
    kind: &'static str,
    fields: &'static [&'static str],
}

const MODULE_LAYOUT: Layout =
    Layout { kind: MODULES_SEGMENT, fields: &["namespace", "name", "provider", "version"] };

const PROVIDER_LAYOUT: Layout = Layout { kind: PROVIDERS_SEGMENT, fields: &["namespace", "name"] };

const LEGACY_PROVIDER_FIELDS: &[&str] = &["namespace", "name", "version", "os", "arch"];

/// Coordinates recovered from a module key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCoordinates {
    /// Publisher namespace.
    pub namespace: String,
    /// Module name.
    pub name: String,
    /// Target provider.
    pub provider: String,
    /// Module version.
    pub version: String,
}

/// Coordinates recovered from a provider archive key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderArchive {
    /// Publisher namespace.
    pub namespace: String,
    /// Provider name.
    pub name: String,
    /// Provider version.
    pub version: String,
    /// Target operating system.
    pub os: String,
    /// Target architecture.
    pub arch: String,
    /// Archive filename.
    pub filename: String,
}

/// The three keys that make up one platform release of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReleaseKeys {
    /// The `.zip` archive.
    pub archive: String,
    /// The version's `SHA256SUMS` manifest.
    pub shasums: String,
    /// The manifest's detached signature.
    pub signature: String,
}

/// Parts of a provider archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFilename<'a> {
    /// Binary name, e.g. `terraform-provider-random`.
    pub binary: &'a str,
    /// Version.
    pub version: &'a str,
    /// Operating system.
    pub os: &'a str,
    /// Architecture.
    pub arch: &'a str,
}

/// Builds and parses object keys under one bucket prefix.
///
/// Cheap to clone; holds only the normalized prefix and the module archive
/// format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    prefix: String,
    archive_format: String,
}

impl KeyScheme {
    /// Creates a scheme for `prefix` (surrounding `/` are trimmed; empty
    /// means the bucket root) and a module archive format such as `tar.gz`.
    #[must_use]
    pub fn new(prefix: &str, archive_format: impl Into<String>) -> Self {
        Self { prefix: prefix.trim_matches('/').to_owned(), archive_format: archive_format.into() }
    }

    /// Returns the normalized bucket prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the module archive format.
    #[must_use]
    pub fn archive_format(&self) -> &str {
        &self.archive_format
    }

    /// Joins the bucket prefix and `segments` with `/`.
    fn join(&self, segments: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for segment in segments {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(segment);
        }
        key
    }

    /// Strips the bucket prefix, returning the remainder of `key`.
    fn strip_prefix<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
    }

    /// Splits `key` into segments after the kind segment, requiring exactly
    /// `count` non-empty segments.
    fn segments<'a>(&self, key: &'a str, kind: &str, count: usize) -> Option<Vec<&'a str>> {
        let rest = self.strip_prefix(key)?;
        let mut parts = rest.split('/');
        if parts.next()? != kind {
            return None;
        }
        let segments: Vec<&str> = parts.collect();
        if segments.len() != count || segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(segments)
    }

    /// Key prefix covering every module key.
    #[must_use]
    pub fn modules_root(&self) -> String {
        format!("{}/", self.join(&[MODULES_SEGMENT]))
    }

    /// Key prefix covering every provider and signing keys key.
    #[must_use]
    pub fn providers_root(&self) -> String {
        format!("{}/", self.join(&[PROVIDERS_SEGMENT]))
    }

    /// Key of a module archive.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if a coordinate is empty or
    /// contains `/` or `=`.
    pub fn module_key(
        &self,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
    ) -> StorageResult<String> {
        let values = [namespace, name, provider, version];
        for (field, value) in MODULE_LAYOUT.fields.iter().zip(values) {
            validate_segment(*field, value)?;
        }
        let filename = format!("{name}.{}", self.archive_format);
        Ok(self.join(&[MODULE_LAYOUT.kind, namespace, name, provider, version, &filename]))
    }

    /// Listing prefix for every version of a module.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if a coordinate is empty or
    /// contains `/` or `=`.
    pub fn module_prefix(
        &self,
        namespace: &str,
        name: &str,
        provider: &str,
    ) -> StorageResult<String> {
        for (field, value) in MODULE_LAYOUT.fields.iter().zip([namespace, name, provider]) {
            validate_segment(*field, value)?;
        }
        Ok(format!("{}/", self.join(&[MODULE_LAYOUT.kind, namespace, name, provider])))
    }

    /// Recovers module coordinates from a key, or `None` if the key is not a
    /// module archive in the current layout.
    #[must_use]
    pub fn parse_module_key(&self, key: &str) -> Option<ModuleCoordinates> {
        let segments = self.segments(key, MODULE_LAYOUT.kind, MODULE_LAYOUT.fields.len() + 1)?;
        if !is_current_layout(&segments) {
            return None;
        }
        let [namespace, name, provider, version, filename] = segments[..] else {
            return None;
        };
        let stem = filename.strip_suffix(self.archive_format.as_str())?.strip_suffix('.')?;
        if stem != name {
            return None;
        }
        Some(ModuleCoordinates {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            provider: provider.to_owned(),
            version: version.to_owned(),
        })
    }

    /// Key of a provider release file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if a coordinate or the filename is
    /// empty or contains `/` or `=`.
    pub fn provider_key(&self, namespace: &str, name: &str, filename: &str) -> StorageResult<String> {
        validate_segment("namespace", namespace)?;
        validate_segment("name", name)?;
        validate_segment("filename", filename)?;
        Ok(self.join(&[PROVIDER_LAYOUT.kind, namespace, name, filename]))
    }

    /// Listing prefix for every release file of a provider.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if a coordinate is empty or
    /// contains `/` or `=`.
    pub fn provider_prefix(&self, namespace: &str, name: &str) -> StorageResult<String> {
        validate_segment("namespace", namespace)?;
        validate_segment("name", name)?;
        Ok(format!("{}/", self.join(&[PROVIDER_LAYOUT.kind, namespace, name])))
    }

    /// Keys of the archive, manifest and signature for one platform release.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if a coordinate is empty, contains
    /// `/`, or (for version, os and arch) contains `_`.
    pub fn provider_release_keys(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> StorageResult<ProviderReleaseKeys> {
        validate_filename_part("version", version)?;
        validate_filename_part("os", os)?;
        validate_filename_part("arch", arch)?;
        let shasums = shasums_filename(name, version);
        Ok(ProviderReleaseKeys {
            archive: self.provider_key(namespace, name, &archive_filename(name, version, os, arch))?,
            signature: self.provider_key(
                namespace,
                name,
                &format!("{shasums}{SIGNATURE_EXTENSION}"),
            )?,
            shasums: self.provider_key(namespace, name, &shasums)?,
        })
    }

    /// Recovers provider coordinates from a release file key, or `None` if
    /// the key is not a provider archive in the current layout.
    #[must_use]
    pub fn parse_provider_key(&self, key: &str) -> Option<ProviderArchive> {
        let segments =
            self.segments(key, PROVIDER_LAYOUT.kind, PROVIDER_LAYOUT.fields.len() + 1)?;
        if !is_current_layout(&segments) {
            return None;
        }
        let [namespace, name, filename] = segments[..] else {
            return None;
        };
        let parts = parse_archive_filename(filename)?;
        if parts.binary.strip_prefix(PROVIDER_BINARY_PREFIX) != Some(name) {
            return None;
        }
        Some(ProviderArchive {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            version: parts.version.to_owned(),
            os: parts.os.to_owned(),
            arch: parts.arch.to_owned(),
            filename: filename.to_owned(),
        })
    }

    /// Key of a namespace's signing keys document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if the namespace is empty or
    /// contains `/` or `=`.
    pub fn signing_keys_key(&self, namespace: &str) -> StorageResult<String> {
        validate_segment("namespace", namespace)?;
        Ok(self.join(&[PROVIDERS_SEGMENT, namespace, SIGNING_KEYS_FILENAME]))
    }

    /// Returns the current-layout key a legacy module key migrates to, or
    /// `None` if `key` is not a legacy module key.
    #[must_use]
    pub fn legacy_module_target(&self, key: &str) -> Option<String> {
        let segments = self.segments(key, MODULES_SEGMENT, MODULE_LAYOUT.fields.len() + 1)?;
        let (hive, filename) = segments.split_at(MODULE_LAYOUT.fields.len());
        let values = hive_values(hive, MODULE_LAYOUT.fields)?;
        if !filename[0].ends_with(&format!(".{}", self.archive_format)) {
            return None;
        }
        let [namespace, name, provider, version] = values[..] else {
            return None;
        };
        self.module_key(namespace, name, provider, version).ok()
    }

    /// Returns `true` if `key` is a module key in the legacy layout.
    #[must_use]
    pub fn is_legacy_module_key(&self, key: &str) -> bool {
        self.legacy_module_target(key).is_some()
    }

    /// Returns the current-layout key a legacy provider key migrates to, or
    /// `None` if `key` is not a legacy provider key.
    ///
    /// Archives (`namespace/name/version/os/arch`) and manifests
    /// (`namespace/name/version`) move next to each other under
    /// `providers/<namespace>/<name>/`; the signing keys document
    /// (`namespace` only) moves to `providers/<namespace>/`.
    #[must_use]
    pub fn legacy_provider_target(&self, key: &str) -> Option<String> {
        let rest = self.strip_prefix(key)?;
        let mut parts = rest.split('/');
        if parts.next()? != PROVIDERS_SEGMENT {
            return None;
        }
        let segments: Vec<&str> = parts.collect();
        let (filename, hive) = segments.split_last()?;
        if filename.is_empty() || filename.contains(HIVE_SEPARATOR) {
            return None;
        }
        let values = hive_values(hive, &LEGACY_PROVIDER_FIELDS[..hive.len().min(5)])?;
        match values[..] {
            [namespace] if *filename == SIGNING_KEYS_FILENAME => {
                self.signing_keys_key(namespace).ok()
            },
            [namespace, name, _version] => self.provider_key(namespace, name, filename).ok(),
            [namespace, name, _version, _os, _arch]
                if filename.ends_with(PROVIDER_ARCHIVE_EXTENSION) =>
            {
                self.provider_key(namespace, name, filename).ok()
            },
            _ => None,
        }
    }

    /// Returns `true` if `key` is a provider key in the legacy layout.
    #[must_use]
    pub fn is_legacy_provider_key(&self, key: &str) -> bool {
        self.legacy_provider_target(key).is_some()
    }
}

/// Reads `field=value` segments, requiring the field names to match
/// `fields` in order and every value to be non-empty.
fn hive_values<'a>(segments: &[&'a str], fields: &[&str]) -> Option<Vec<&'a str>> {
    if segments.len() != fields.len() || segments.is_empty() {
        return None;
    }
    segments
        .iter()
        .zip(fields)
        .map(|(segment, field)| {
            let (name, value) = segment.split_once(HIVE_SEPARATOR)?;
            (name == *field && !value.is_empty()).then_some(value)
        })
        .collect()
}

fn validate_segment(field: &'static str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::validation(field, "must not be empty"));
    }
    if value.contains('/') {
        return Err(StorageError::validation(field, format!("must not contain '/': {value}")));
    }
    // `=` marks a legacy hive segment.
    if value.contains(HIVE_SEPARATOR) {
        return Err(StorageError::validation(field, format!("must not contain '=': {value}")));
    }
    Ok(())
}

/// Returns `true` if no segment of a current-layout key uses the legacy
/// `field=value` form.
fn is_current_layout(segments: &[&str]) -> bool {
    !segments.iter().any(|segment| segment.contains(HIVE_SEPARATOR))
}

fn validate_filename_part(field: &'static str, value: &str) -> StorageResult<()> {
    validate_segment(field, value)?;
    if value.contains('_') {
        return Err(StorageError::validation(field, format!("must not contain '_': {value}")));
    }
    Ok(())
}

/// Archive filename for one platform build.
#[must_use]
pub fn archive_filename(name: &str, version: &str, os: &str, arch: &str) -> String {
    format!("{PROVIDER_BINARY_PREFIX}{name}_{version}_{os}_{arch}{PROVIDER_ARCHIVE_EXTENSION}")
}

/// Manifest filename for a provider version.
#[must_use]
pub fn shasums_filename(name: &str, version: &str) -> String {
    format!("{PROVIDER_BINARY_PREFIX}{name}_{version}{SHASUMS_SUFFIX}")
}

/// Splits `<binary>_<version>_<os>_<arch>.zip`.
///
/// The binary name may itself contain `_`; version, os and arch may not.
#[must_use]
pub fn parse_archive_filename(filename: &str) -> Option<ArchiveFilename<'_>> {
    let stem = filename.strip_suffix(PROVIDER_ARCHIVE_EXTENSION)?;
    let mut parts = stem.rsplitn(4, '_');
    let arch = parts.next()?;
    let os = parts.next()?;
    let version = parts.next()?;
    let binary = parts.next()?;
    if [binary, version, os, arch].iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(ArchiveFilename { binary, version, os, arch })
}
