//! Grouping of provider artifacts into version records.
//!
//! A listing yields one key per platform archive. [`ProviderVersionCollection`]
//! folds those into one [`ProviderVersion`] per version string, with each
//! platform recorded once.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use crate::{
    keys::ProviderArchive,
    types::{Platform, Provider, ProviderVersion},
};

/// Accumulates platform artifacts per version.
///
/// # Example
///
/// ```
/// use registry_storage::{Platform, ProviderVersionCollection};
///
/// let mut versions = ProviderVersionCollection::new();
/// versions.add("1.10.0", Platform::new("linux", "amd64"));
/// versions.add("1.2.0", Platform::new("linux", "amd64"));
/// versions.add("1.2.0", Platform::new("darwin", "arm64"));
/// versions.add("1.2.0", Platform::new("linux", "amd64"));
///
/// let listed = versions.list();
/// assert_eq!(listed[0].version, "1.2.0");
/// assert_eq!(listed[0].platforms.len(), 2);
/// assert_eq!(listed[1].version, "1.10.0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProviderVersionCollection {
    versions: BTreeMap<String, BTreeSet<Platform>>,
}

impl ProviderVersionCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `platform` under `version`. Adding a platform twice is a no-op.
    pub fn add(&mut self, version: impl Into<String>, platform: Platform) {
        self.versions.entry(version.into()).or_default().insert(platform);
    }

    /// Records the platform of a parsed archive key.
    pub fn add_archive(&mut self, archive: &ProviderArchive) {
        self.add(archive.version.as_str(), Platform::new(&archive.os, &archive.arch));
    }

    /// Records the platform of a provider artifact.
    pub fn add_provider(&mut self, provider: &Provider) {
        self.add(provider.version.as_str(), provider.platform());
    }

    /// Number of distinct versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns `true` if nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Returns every version in [`compare_versions`] order, platforms sorted
    /// by `(os, arch)`.
    #[must_use]
    pub fn list(&self) -> Vec<ProviderVersion> {
        let mut versions: Vec<ProviderVersion> = self
            .versions
            .iter()
            .map(|(version, platforms)| ProviderVersion {
                version: version.clone(),
                platforms: platforms.iter().cloned().collect(),
            })
            .collect();
        versions.sort_by(|a, b| compare_versions(&a.version, &b.version));
        versions
    }
}

impl<'a> Extend<&'a ProviderArchive> for ProviderVersionCollection {
    fn extend<I: IntoIterator<Item = &'a ProviderArchive>>(&mut self, iter: I) {
        for archive in iter {
            self.add_archive(archive);
        }
    }
}

impl<'a> FromIterator<&'a ProviderArchive> for ProviderVersionCollection {
    fn from_iter<I: IntoIterator<Item = &'a ProviderArchive>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

/// A version split into its numeric core and optional pre-release tag.
struct ParsedVersion<'a> {
    core: Vec<u64>,
    pre: Option<&'a str>,
}

fn parse_version(version: &str) -> Option<ParsedVersion<'_>> {
    let version = version.strip_prefix('v').unwrap_or(version);
    // Build metadata never affects precedence.
    let version = version.split_once('+').map_or(version, |(v, _)| v);
    let (core, pre) = match version.split_once('-') {
        Some((core, pre)) if !pre.is_empty() => (core, Some(pre)),
        Some(_) => return None,
        None => (version, None),
    };
    let core = core
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u64>().ok()
        })
        .collect::<Option<Vec<_>>>()?;
    Some(ParsedVersion { core, pre })
}

fn compare_core(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0).cmp(&b.get(i).copied().unwrap_or(0)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_pre(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let mut left = a.split('.');
            let mut right = b.split('.');
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(x), Some(y)) => {
                        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                            (Ok(x), Ok(y)) => x.cmp(&y),
                            (Ok(_), Err(_)) => Ordering::Less,
                            (Err(_), Ok(_)) => Ordering::Greater,
                            (Err(_), Err(_)) => x.cmp(y),
                        };
                        if ordering.is_ne() {
                            return ordering;
                        }
                    },
                }
            }
        },
    }
}

/// Orders version strings component-wise.
///
/// - Dot-separated numeric components compare numerically (`1.10.0 > 1.2.0`);
///   missing trailing components count as zero.
/// - A pre-release (`1.0.0-beta`) sorts before the release with the same core.
/// - Build metadata (`+build`) and a leading `v` are ignored.
/// - Malformed versions sort after every valid one.
///
/// Ties are broken by plain string order, so the result is a total order that
/// returns `Equal` only for identical strings.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let ordering = match (parse_version(a), parse_version(b)) {
        (Some(x), Some(y)) => {
            compare_core(&x.core, &y.core).then_with(|| compare_pre(x.pre, y.pre))
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    ordering.then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn versions(collection: &ProviderVersionCollection) -> Vec<String> {
        collection.list().into_iter().map(|v| v.version).collect()
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert_eq!(compare_versions("1.10.0", "1.2.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0", "10.0.0"), Ordering::Less);
    }

    #[test]
    fn test_prerelease_sorts_before_release() {
        assert_eq!(compare_versions("1.0.0-beta", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-rc.2", "1.0.0-rc.10"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-beta", "0.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_malformed_sorts_last() {
        assert_eq!(compare_versions("latest", "999.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.x", "0.0.1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_ties_fall_back_to_string_order() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("v1.0.0", "1.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_platforms_deduplicated_and_sorted() {
        let mut collection = ProviderVersionCollection::new();
        collection.add("1.2.0", Platform::new("linux", "amd64"));
        collection.add("1.2.0", Platform::new("darwin", "arm64"));
        collection.add("1.2.0", Platform::new("linux", "amd64"));
        collection.add("1.0.0", Platform::new("linux", "amd64"));

        let listed = collection.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].version, "1.0.0");
        assert_eq!(listed[1].version, "1.2.0");
        assert_eq!(
            listed[1].platforms,
            [Platform::new("darwin", "arm64"), Platform::new("linux", "amd64")]
        );
    }

    #[test]
    fn test_collects_from_archives() {
        let archive = |version: &str, os: &str| ProviderArchive {
            namespace: "acme".into(),
            name: "foo".into(),
            version: version.into(),
            os: os.into(),
            arch: "amd64".into(),
            filename: format!("terraform-provider-foo_{version}_{os}_amd64.zip"),
        };
        let archives = [archive("0.9.0", "linux"), archive("0.10.0", "linux"), archive("0.9.0", "windows")];

        let collection: ProviderVersionCollection = archives.iter().collect();
        assert_eq!(versions(&collection), ["0.9.0", "0.10.0"]);
    }

    #[test]
    fn test_empty_collection() {
        let collection = ProviderVersionCollection::new();
        assert!(collection.is_empty());
        assert!(collection.list().is_empty());
    }

    fn any_version() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..20, 0u32..20, 0u32..20).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
            (0u32..20, 0u32..20, "[a-z]{1,5}").prop_map(|(a, b, p)| format!("{a}.{b}.0-{p}")),
            "[a-z.]{1,6}",
        ]
    }

    proptest! {
        /// The comparison is antisymmetric and only equal for identical strings.
        #[test]
        fn compare_is_antisymmetric(a in any_version(), b in any_version()) {
            prop_assert_eq!(compare_versions(&a, &b), compare_versions(&b, &a).reverse());
            prop_assert_eq!(compare_versions(&a, &b) == Ordering::Equal, a == b);
        }

        /// Listing is independent of insertion order and never emits a
        /// malformed version before a valid one.
        #[test]
        fn list_is_deterministic(mut input in prop::collection::vec(any_version(), 0..20)) {
            let mut forward = ProviderVersionCollection::new();
            for v in &input {
                forward.add(v.as_str(), Platform::new("linux", "amd64"));
            }
            input.reverse();
            let mut backward = ProviderVersionCollection::new();
            for v in &input {
                backward.add(v.as_str(), Platform::new("linux", "amd64"));
            }

            let listed = versions(&forward);
            prop_assert_eq!(&listed, &versions(&backward));

            let first_malformed = listed.iter().position(|v| parse_version(v).is_none());
            if let Some(index) = first_malformed {
                prop_assert!(listed[index..].iter().all(|v| parse_version(v).is_none()));
            }
        }
    }
}
