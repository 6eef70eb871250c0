//! `SHA256SUMS` manifest parsing and archive verification.
//!
//! A manifest holds one `<64 hex digits><two spaces><filename>` entry per
//! line. Line order is irrelevant and blank lines are ignored.

use sha2::{Digest, Sha256};

use crate::error::{StorageError, StorageResult};

const DIGEST_HEX_LEN: usize = 64;
const SEPARATOR: &str = "  ";

/// Returns the digest recorded for `filename` in `manifest`.
///
/// Every line is validated, so a manifest with a malformed entry is rejected
/// even when the requested filename appears on a valid line.
///
/// # Errors
///
/// - [`StorageError::Format`] if the manifest is not UTF-8 or a line is not a
///   valid `<digest>  <filename>` entry.
/// - [`StorageError::NotFound`] if no entry names `filename`.
pub fn find_digest(manifest: &[u8], filename: &str) -> StorageResult<String> {
    let text = std::str::from_utf8(manifest)
        .map_err(|e| StorageError::format(format!("manifest is not UTF-8: {e}")))?;

    let mut found = None;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (digest, entry) = parse_line(line)
            .ok_or_else(|| StorageError::format(format!("line {}: {line:?}", index + 1)))?;
        if entry == filename && found.is_none() {
            found = Some(digest.to_ascii_lowercase());
        }
    }

    found.ok_or_else(|| StorageError::not_found(filename))
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (digest, filename) = line.split_once(SEPARATOR)?;
    let valid_digest =
        digest.len() == DIGEST_HEX_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit());
    (valid_digest && !filename.trim().is_empty()).then_some((digest, filename))
}

/// Hex SHA-256 digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checks that `data` hashes to `expected` (hex, case-insensitive).
///
/// # Errors
///
/// Returns [`StorageError::ChecksumMismatch`] on mismatch.
pub fn verify_sha256(filename: &str, data: &[u8], expected: &str) -> StorageResult<()> {
    let actual = sha256_hex(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(StorageError::ChecksumMismatch {
            filename: filename.to_owned(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}
