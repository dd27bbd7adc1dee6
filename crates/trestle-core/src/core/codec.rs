// crates/trestle-core/src/core/codec.rs
// ============================================================================
// Module: Value Codecs
// Description: Per-type read/write conversion between JSON values and the
//              physical scalar representation.
// Purpose: Keep every encoding decision (timeuuid rewrite, sets as JSON
//          blobs, decimal canonicalization) in one place.
// Dependencies: crate::core::{timeuuid, types}, chrono, rust_decimal,
//               serde_json, thiserror
// ============================================================================

//! ## Overview
//! The codec layer is the only place that knows how declared types map onto
//! SQL scalars: booleans become integers, sets become JSON-encoded blobs,
//! timeuuids are rewritten into the sortable storage form, decimals
//! canonicalize through their textual form. `read(write(v))` round-trips for
//! every admissible value modulo the documented canonicalizations (set
//! deduplication and ordering, decimal normalization, blob byte buffers).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

use crate::core::timeuuid;
use crate::core::timeuuid::TimeuuidError;
use crate::core::types::AttributeType;

// ============================================================================
// SECTION: Physical Scalars
// ============================================================================

/// Physical scalar exchanged with the backing SQL engine.
///
/// This is the seam between the backend-agnostic model and a concrete
/// engine: backends convert it to their native parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlScalar {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Codec conversion failures. All map to `bad_request`.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Value does not fit the declared type.
    #[error("expected {expected} value, got {got}")]
    TypeMismatch {
        /// Declared type name.
        expected: String,
        /// Short description of the offending value.
        got: String,
    },
    /// Malformed time identifier.
    #[error(transparent)]
    Timeuuid(#[from] TimeuuidError),
    /// Malformed timestamp.
    #[error("malformed timestamp: {0}")]
    InvalidTimestamp(String),
    /// Malformed decimal.
    #[error("malformed decimal: {0}")]
    InvalidDecimal(String),
    /// Malformed UUID.
    #[error("malformed uuid: {0}")]
    InvalidUuid(String),
    /// JSON (de)serialization failed.
    #[error("malformed json payload: {0}")]
    InvalidJson(String),
    /// Malformed set payload.
    #[error("malformed set payload: {0}")]
    InvalidSet(String),
}

/// Builds a type-mismatch error for a JSON value.
fn mismatch(expected: &AttributeType, value: &Value) -> CodecError {
    let got = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    CodecError::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

/// Builds a type-mismatch error for a physical scalar.
fn read_mismatch(expected: &AttributeType, scalar: &SqlScalar) -> CodecError {
    let got = match scalar {
        SqlScalar::Null => "null",
        SqlScalar::Integer(_) => "integer",
        SqlScalar::Real(_) => "real",
        SqlScalar::Text(_) => "text",
        SqlScalar::Blob(_) => "blob",
    };
    CodecError::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

// ============================================================================
// SECTION: Write Conversion
// ============================================================================

/// Converts a JSON value to its physical form for the declared type.
///
/// # Errors
///
/// Returns [`CodecError`] when the value does not fit the declared type.
pub fn write_value(declared: &AttributeType, value: &Value) -> Result<SqlScalar, CodecError> {
    if value.is_null() {
        return Ok(SqlScalar::Null);
    }
    match declared {
        AttributeType::String => match value {
            Value::String(text) => Ok(SqlScalar::Text(text.clone())),
            Value::Bool(flag) => Ok(SqlScalar::Text(flag.to_string())),
            Value::Number(number) => Ok(SqlScalar::Text(number.to_string())),
            _ => Err(mismatch(declared, value)),
        },
        AttributeType::Blob => blob_bytes(value)
            .map(SqlScalar::Blob)
            .ok_or_else(|| mismatch(declared, value)),
        AttributeType::Boolean => match value {
            Value::Bool(flag) => Ok(SqlScalar::Integer(i64::from(*flag))),
            _ => Err(mismatch(declared, value)),
        },
        AttributeType::Int | AttributeType::Varint => value
            .as_i64()
            .map(SqlScalar::Integer)
            .ok_or_else(|| mismatch(declared, value)),
        AttributeType::Float | AttributeType::Double => value
            .as_f64()
            .map(SqlScalar::Real)
            .ok_or_else(|| mismatch(declared, value)),
        AttributeType::Decimal => {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                _ => return Err(mismatch(declared, value)),
            };
            let decimal = Decimal::from_str(&text)
                .map_err(|err| CodecError::InvalidDecimal(format!("{text}: {err}")))?;
            Ok(SqlScalar::Text(decimal.normalize().to_string()))
        }
        AttributeType::Timestamp => match value {
            Value::Number(_) => value
                .as_i64()
                .map(SqlScalar::Integer)
                .ok_or_else(|| mismatch(declared, value)),
            Value::String(text) => {
                let parsed = DateTime::parse_from_rfc3339(text)
                    .map_err(|err| CodecError::InvalidTimestamp(format!("{text}: {err}")))?;
                Ok(SqlScalar::Integer(parsed.timestamp_millis()))
            }
            _ => Err(mismatch(declared, value)),
        },
        AttributeType::Uuid => match value {
            Value::String(text) => {
                let parsed = uuid::Uuid::parse_str(text)
                    .map_err(|_| CodecError::InvalidUuid(text.clone()))?;
                Ok(SqlScalar::Text(parsed.to_string()))
            }
            _ => Err(mismatch(declared, value)),
        },
        AttributeType::Timeuuid => match value {
            Value::String(text) => Ok(SqlScalar::Text(timeuuid::to_sorted(text)?)),
            _ => Err(mismatch(declared, value)),
        },
        AttributeType::Json => serde_json::to_vec(value)
            .map(SqlScalar::Blob)
            .map_err(|err| CodecError::InvalidJson(err.to_string())),
        AttributeType::Set(element) => write_set(element, value),
    }
}

/// Canonicalizes a JSON value to a byte buffer.
fn blob_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(text) => Some(text.clone().into_bytes()),
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let byte = item.as_u64().filter(|byte| *byte <= 255)?;
                bytes.push(byte as u8);
            }
            Some(bytes)
        }
        _ => None,
    }
}

/// Encodes a set as a JSON-serialized array of written element forms.
///
/// Empty sets and null are equivalent and stored as SQL NULL.
fn write_set(element: &AttributeType, value: &Value) -> Result<SqlScalar, CodecError> {
    let Value::Array(items) = value else {
        return Err(mismatch(&AttributeType::Set(Box::new(element.clone())), value));
    };
    if items.is_empty() {
        return Ok(SqlScalar::Null);
    }
    let mut encoded = Vec::with_capacity(items.len());
    for item in items {
        let written = write_value(element, item)?;
        encoded.push(scalar_to_carrier(&written)?);
    }
    serde_json::to_vec(&encoded)
        .map(SqlScalar::Blob)
        .map_err(|err| CodecError::InvalidSet(err.to_string()))
}

/// Represents a written scalar as a JSON carrier value for set encoding.
fn scalar_to_carrier(scalar: &SqlScalar) -> Result<Value, CodecError> {
    match scalar {
        SqlScalar::Null => Ok(Value::Null),
        SqlScalar::Integer(number) => Ok(Value::Number((*number).into())),
        SqlScalar::Real(number) => Number::from_f64(*number)
            .map(Value::Number)
            .ok_or_else(|| CodecError::InvalidSet("non-finite number".to_string())),
        SqlScalar::Text(text) => Ok(Value::String(text.clone())),
        SqlScalar::Blob(bytes) => Ok(match String::from_utf8(bytes.clone()) {
            Ok(text) => Value::String(text),
            Err(_) => Value::Array(
                bytes.iter().map(|byte| Value::Number((*byte).into())).collect(),
            ),
        }),
    }
}

/// Converts a JSON carrier value back to a physical scalar for set decoding.
fn carrier_to_scalar(value: &Value) -> Result<SqlScalar, CodecError> {
    match value {
        Value::Null => Ok(SqlScalar::Null),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(SqlScalar::Integer(integer))
            } else {
                number
                    .as_f64()
                    .map(SqlScalar::Real)
                    .ok_or_else(|| CodecError::InvalidSet(number.to_string()))
            }
        }
        Value::String(text) => Ok(SqlScalar::Text(text.clone())),
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let byte = item
                    .as_u64()
                    .filter(|byte| *byte <= 255)
                    .ok_or_else(|| CodecError::InvalidSet(item.to_string()))?;
                bytes.push(byte as u8);
            }
            Ok(SqlScalar::Blob(bytes))
        }
        _ => Err(CodecError::InvalidSet("unsupported set element".to_string())),
    }
}

// ============================================================================
// SECTION: Read Conversion
// ============================================================================

/// Converts a physical scalar back to its JSON form for the declared type.
///
/// # Errors
///
/// Returns [`CodecError`] when the stored scalar does not fit the declared
/// type.
pub fn read_value(declared: &AttributeType, scalar: &SqlScalar) -> Result<Value, CodecError> {
    if matches!(scalar, SqlScalar::Null) {
        return Ok(Value::Null);
    }
    match declared {
        AttributeType::String => match scalar {
            SqlScalar::Text(text) => Ok(Value::String(text.clone())),
            SqlScalar::Integer(number) => Ok(Value::String(number.to_string())),
            SqlScalar::Real(number) => Ok(Value::String(number.to_string())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Blob => match scalar {
            SqlScalar::Blob(bytes) => Ok(bytes_to_value(bytes)),
            SqlScalar::Text(text) => Ok(Value::String(text.clone())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Boolean => match scalar {
            SqlScalar::Integer(number) => Ok(Value::Bool(*number != 0)),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Int | AttributeType::Varint => match scalar {
            SqlScalar::Integer(number) => Ok(Value::Number((*number).into())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Float | AttributeType::Double => {
            let number = match scalar {
                SqlScalar::Real(number) => *number,
                #[allow(clippy::cast_precision_loss)]
                SqlScalar::Integer(number) => *number as f64,
                _ => return Err(read_mismatch(declared, scalar)),
            };
            Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| read_mismatch(declared, scalar))
        }
        AttributeType::Decimal => match scalar {
            SqlScalar::Text(text) => Ok(Value::String(text.clone())),
            SqlScalar::Integer(number) => Ok(Value::String(number.to_string())),
            SqlScalar::Real(number) => Ok(Value::String(number.to_string())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Timestamp => match scalar {
            SqlScalar::Integer(number) => Ok(Value::Number((*number).into())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Uuid => match scalar {
            SqlScalar::Text(text) => Ok(Value::String(text.clone())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Timeuuid => match scalar {
            SqlScalar::Text(text) => Ok(Value::String(timeuuid::from_sorted(text)?)),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Json => match scalar {
            SqlScalar::Blob(bytes) => serde_json::from_slice(bytes)
                .map_err(|err| CodecError::InvalidJson(err.to_string())),
            SqlScalar::Text(text) => serde_json::from_str(text)
                .map_err(|err| CodecError::InvalidJson(err.to_string())),
            _ => Err(read_mismatch(declared, scalar)),
        },
        AttributeType::Set(element) => read_set(element, scalar),
    }
}

/// Reads blob bytes back as text when valid UTF-8, else as a byte array.
fn bytes_to_value(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Array(bytes.iter().map(|byte| Value::Number((*byte).into())).collect()),
    }
}

/// Decodes a stored set: deserialize, convert elements, deduplicate, and
/// return a stable order (numeric ascending for numeric element types,
/// lexicographic over the JSON form otherwise).
fn read_set(element: &AttributeType, scalar: &SqlScalar) -> Result<Value, CodecError> {
    let carriers: Vec<Value> = match scalar {
        SqlScalar::Blob(bytes) => serde_json::from_slice(bytes)
            .map_err(|err| CodecError::InvalidSet(err.to_string()))?,
        SqlScalar::Text(text) => serde_json::from_str(text)
            .map_err(|err| CodecError::InvalidSet(err.to_string()))?,
        _ => {
            return Err(read_mismatch(&AttributeType::Set(Box::new(element.clone())), scalar));
        }
    };

    let mut items = Vec::with_capacity(carriers.len());
    for carrier in &carriers {
        let stored = carrier_to_scalar(carrier)?;
        items.push(read_value(element, &stored)?);
    }

    if element.is_numeric() {
        items.sort_by(|left, right| match (left.as_i64(), right.as_i64()) {
            (Some(left), Some(right)) => left.cmp(&right),
            _ => {
                let left = left.as_f64().unwrap_or(f64::NEG_INFINITY);
                let right = right.as_f64().unwrap_or(f64::NEG_INFINITY);
                left.partial_cmp(&right).unwrap_or(std::cmp::Ordering::Equal)
            }
        });
    } else {
        items.sort_by_key(|item| item.to_string());
    }
    items.dedup();
    Ok(Value::Array(items))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
