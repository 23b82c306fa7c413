// crates/trustplane-core/src/core/hashing.rs
// ============================================================================
// Module: Trustplane Canonical Hashing
// Description: RFC 8785 JSON canonicalization and algorithm-agile hashing.
// Purpose: Provide deterministic digests for decisions, chains, and ledgers.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every hash in Trustplane is computed over RFC 8785 (JCS) canonical JSON:
//! keys sorted lexicographically, no insignificant whitespace, UTF-8, numbers
//! in shortest round-trip form. The algorithm is pluggable (SHA-256 default)
//! and tagged hashes carry an `algo:hexdigest` prefix so chains can migrate
//! algorithms without breaking existing SHA-256 records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use sha2::Sha384;
use sha2::Sha512;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for Trustplane artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing (default, backward compatible with existing chains).
    #[default]
    Sha256,
    /// SHA-384 hashing.
    Sha384,
    /// SHA-512 hashing.
    Sha512,
}

impl HashAlgorithm {
    /// Returns the canonical lowercase identifier used in tagged hashes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Parses an algorithm identifier (as used in tagged hashes).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Default hash algorithm for Trustplane.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// A tagged hash carried an unknown algorithm identifier.
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
}

// ============================================================================
// SECTION: Canonical Hashing
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes the canonical JSON form of a value and returns a lowercase hex digest.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn stable_hash<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes a value and prefixes the digest with its algorithm identifier.
///
/// Returns `"algo:hexdigest"` (e.g. `"sha256:a1b2..."`). Use this for new
/// chain formats where algorithm migration must be detectable without
/// out-of-band metadata.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn stable_hash_tagged<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<String, HashError> {
    let digest = stable_hash(algorithm, value)?;
    Ok(format!("{}:{digest}", algorithm.as_str()))
}

/// Verifies an algorithm-tagged hash against a value.
///
/// Untagged input is treated as a legacy SHA-256 digest.
///
/// # Errors
///
/// Returns [`HashError`] when serialization fails or the tag names an
/// unsupported algorithm.
pub fn verify_tagged_hash<T: Serialize + ?Sized>(
    value: &T,
    tagged: &str,
) -> Result<bool, HashError> {
    match tagged.split_once(':') {
        Some((name, expected)) => {
            let algorithm = HashAlgorithm::parse(name)
                .ok_or_else(|| HashError::UnknownAlgorithm(name.to_string()))?;
            Ok(stable_hash(algorithm, value)? == expected)
        }
        None => Ok(stable_hash(HashAlgorithm::Sha256, value)? == tagged),
    }
}

/// Hashes raw bytes and returns a lowercase hex digest.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => hex_encode(&Sha256::digest(bytes)),
        HashAlgorithm::Sha384 => hex_encode(&Sha384::digest(bytes)),
        HashAlgorithm::Sha512 => hex_encode(&Sha512::digest(bytes)),
    }
}

/// Hashes the raw UTF-8 bytes of a text value.
#[must_use]
pub fn hash_text(algorithm: HashAlgorithm, text: &str) -> String {
    hash_bytes(algorithm, text.as_bytes())
}

/// Returns the last `n` characters of a hash, stripping any algorithm tag.
///
/// Used for human-facing confirm tokens bound to gate payload hashes.
#[must_use]
pub fn hash_suffix(hash: &str, n: usize) -> String {
    let digest = hash.split_once(':').map_or(hash, |(_, rest)| rest);
    let start = digest.len().saturating_sub(n);
    digest[start..].to_string()
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
