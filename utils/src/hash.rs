//! SHA-256 content fingerprints.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Compare a caller-supplied hash against a computed one.
///
/// Surrounding whitespace and hex case are ignored.
#[must_use]
pub fn hashes_match(supplied: &str, actual: &str) -> bool {
    supplied.trim().eq_ignore_ascii_case(actual.trim())
}
