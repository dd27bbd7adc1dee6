// crates/trestle-core/src/core/hashing.rs
// ============================================================================
// Module: Canonical Schema Hashing
// Description: RFC 8785 JSON canonicalization and fingerprint helpers.
// Purpose: Produce stable schema fingerprints used for migration detection.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Schema fingerprints must be invariant under re-serialization of an
//! equivalent schema: two schemas that differ only in attribute-key ordering
//! hash identically. Canonicalization uses RFC 8785 (JCS) so key order never
//! leaks into the digest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while canonicalizing a value for hashing.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Computes the hex-encoded SHA-256 fingerprint of a value's canonical JSON.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_hex(&bytes))
}

/// Hashes raw bytes into a lowercase hex SHA-256 digest.
#[must_use]
pub fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
