// crates/trestle-core/src/core/timeuuid.rs
// ============================================================================
// Module: Time Identifiers
// Description: v1 timeuuid minting, validation, and the sortable rewrite.
// Purpose: Make timeuuid text compare lexicographically in time order.
// Dependencies: rand, thiserror, uuid
// ============================================================================

//! ## Overview
//! Version-1 UUIDs encode their timestamp low-bits-first, so the canonical
//! text form does not sort chronologically. On write the 36-char canonical
//! form `tl-tm-thv-cs-node` is re-ordered to `th-tm-tl-cs-node` with the
//! version nibble stripped from `th`; fixed field widths then make plain
//! string comparison agree with the embedded time. The nibble is re-inserted
//! on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use uuid::Context;
use uuid::Timestamp;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// 100-ns ticks between the Gregorian epoch (1582-10-15) and the Unix epoch.
const GREGORIAN_OFFSET_TICKS: u64 = 0x01B2_1DD2_1381_4000;
/// Canonical form length (`tl-tm-thv-cs-node`).
const CANONICAL_LEN: usize = 36;
/// Sorted form length (version nibble stripped).
const SORTED_LEN: usize = 35;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised for malformed time identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeuuidError {
    /// Input is not a well-formed identifier.
    #[error("malformed timeuuid: {0}")]
    Malformed(String),
    /// Input is well-formed but not a version-1 identifier.
    #[error("not a version 1 timeuuid: {0}")]
    NotVersion1(String),
}

// ============================================================================
// SECTION: Minting
// ============================================================================

/// Per-process clock-sequence context.
static CONTEXT: OnceLock<Context> = OnceLock::new();
/// Per-process node identifier with the multicast bit set.
static NODE: OnceLock<[u8; 6]> = OnceLock::new();

/// Mints a new canonical v1 time identifier.
#[must_use]
pub fn mint() -> String {
    let context = CONTEXT.get_or_init(|| Context::new(rand::random::<u16>()));
    let node = NODE.get_or_init(|| {
        let mut node: [u8; 6] = rand::random();
        node[0] |= 0x01;
        node
    });
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let timestamp = Timestamp::from_unix(context, now.as_secs(), now.subsec_nanos());
    Uuid::new_v1(timestamp, node).to_string()
}

/// Builds the smallest canonical identifier for a wall-clock millisecond.
///
/// Used to form range-predicate bounds over versioning keys.
#[must_use]
pub fn from_millis_floor(millis: i64) -> String {
    let ticks = u64::try_from(millis.max(0))
        .unwrap_or(0)
        .saturating_mul(10_000)
        .saturating_add(GREGORIAN_OFFSET_TICKS);
    let time_low = ticks & 0xFFFF_FFFF;
    let time_mid = (ticks >> 32) & 0xFFFF;
    let time_hi = (ticks >> 48) & 0x0FFF;
    format!("{time_low:08x}-{time_mid:04x}-1{time_hi:03x}-0000-000000000000")
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates the canonical 36-char lowercase v1 form.
fn check_canonical(raw: &str) -> Result<(), TimeuuidError> {
    let bytes = raw.as_bytes();
    if bytes.len() != CANONICAL_LEN {
        return Err(TimeuuidError::Malformed(raw.to_string()));
    }
    for (position, byte) in bytes.iter().enumerate() {
        match position {
            8 | 13 | 18 | 23 => {
                if *byte != b'-' {
                    return Err(TimeuuidError::Malformed(raw.to_string()));
                }
            }
            _ => {
                if !byte.is_ascii_hexdigit() {
                    return Err(TimeuuidError::Malformed(raw.to_string()));
                }
            }
        }
    }
    if bytes[14] != b'1' {
        return Err(TimeuuidError::NotVersion1(raw.to_string()));
    }
    Ok(())
}

/// Validates the sorted 35-char form.
fn check_sorted(raw: &str) -> Result<(), TimeuuidError> {
    let bytes = raw.as_bytes();
    if bytes.len() != SORTED_LEN {
        return Err(TimeuuidError::Malformed(raw.to_string()));
    }
    for (position, byte) in bytes.iter().enumerate() {
        match position {
            3 | 8 | 17 | 22 => {
                if *byte != b'-' {
                    return Err(TimeuuidError::Malformed(raw.to_string()));
                }
            }
            _ => {
                if !byte.is_ascii_hexdigit() {
                    return Err(TimeuuidError::Malformed(raw.to_string()));
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Rewrite
// ============================================================================

/// Rewrites a canonical identifier into the sortable storage form.
///
/// # Errors
///
/// Returns [`TimeuuidError`] for malformed or non-v1 input.
pub fn to_sorted(canonical: &str) -> Result<String, TimeuuidError> {
    check_canonical(canonical)?;
    let lower = canonical.to_ascii_lowercase();
    let time_low = &lower[0 .. 8];
    let time_mid = &lower[9 .. 13];
    let time_hi = &lower[15 .. 18];
    let tail = &lower[19 ..];
    Ok(format!("{time_hi}-{time_mid}-{time_low}-{tail}"))
}

/// Rewrites a sorted storage form back into the canonical identifier.
///
/// # Errors
///
/// Returns [`TimeuuidError`] for malformed input.
pub fn from_sorted(sorted: &str) -> Result<String, TimeuuidError> {
    check_sorted(sorted)?;
    let time_hi = &sorted[0 .. 3];
    let time_mid = &sorted[4 .. 8];
    let time_low = &sorted[9 .. 17];
    let tail = &sorted[18 ..];
    Ok(format!("{time_low}-{time_mid}-1{time_hi}-{tail}"))
}

// ============================================================================
// SECTION: Embedded Time
// ============================================================================

/// Extracts the embedded wall-clock time in unix milliseconds.
///
/// # Errors
///
/// Returns [`TimeuuidError`] for malformed or non-v1 input.
pub fn unix_millis(canonical: &str) -> Result<i64, TimeuuidError> {
    check_canonical(canonical)?;
    let parse = |range: std::ops::Range<usize>| {
        u64::from_str_radix(&canonical[range], 16)
            .map_err(|_| TimeuuidError::Malformed(canonical.to_string()))
    };
    let time_low = parse(0 .. 8)?;
    let time_mid = parse(9 .. 13)?;
    let time_hi = parse(15 .. 18)?;
    let ticks = (time_hi << 48) | (time_mid << 32) | time_low;
    let unix_ticks = ticks.saturating_sub(GREGORIAN_OFFSET_TICKS);
    Ok(i64::try_from(unix_ticks / 10_000).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
