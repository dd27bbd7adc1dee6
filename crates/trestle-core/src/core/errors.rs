// crates/trestle-core/src/core/errors.rs
// ============================================================================
// Module: Error Taxonomy
// Description: Caller-facing error kinds and their wire representation.
// Purpose: Map every failure to a status code and a typed error body.
// Dependencies: crate::core::{codec, hashing, info, schema, timeuuid},
//               serde_json, thiserror
// ============================================================================

//! ## Overview
//! Four error kinds cover the whole engine surface: `bad_request` for
//! validation, predicate, ordering, and unsupported-migration failures;
//! `notfound` for missing schemas; `engine` for wrapped SQL failures; and
//! `busy` for lock contention that exhausted its retries. Each carries a
//! status code and serializes as `{type, title}` in the response body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::codec::CodecError;
use crate::core::hashing::HashError;
use crate::core::info::InfoError;
use crate::core::schema::SchemaError;
use crate::core::timeuuid::TimeuuidError;

// ============================================================================
// SECTION: Table Error
// ============================================================================

/// Caller-facing engine error.
#[derive(Debug, Error)]
pub enum TableError {
    /// Validation, predicate, ordering, or migration failure.
    #[error("bad request: {title}")]
    BadRequest {
        /// Human-readable failure description.
        title: String,
    },
    /// No schema is registered for the requested table.
    #[error("not found: {title}")]
    NotFound {
        /// Human-readable failure description.
        title: String,
    },
    /// Wrapped failure from the backing SQL engine.
    #[error("engine error: {title}")]
    Engine {
        /// Human-readable failure description.
        title: String,
    },
    /// Lock contention survived every bounded retry.
    #[error("database busy: {title}")]
    Busy {
        /// Human-readable failure description.
        title: String,
    },
}

impl TableError {
    /// Creates a `bad_request` error.
    #[must_use]
    pub fn bad_request(title: impl Into<String>) -> Self {
        Self::BadRequest {
            title: title.into(),
        }
    }

    /// Creates a `notfound` error.
    #[must_use]
    pub fn not_found(title: impl Into<String>) -> Self {
        Self::NotFound {
            title: title.into(),
        }
    }

    /// Creates an `engine` error.
    #[must_use]
    pub fn engine(title: impl Into<String>) -> Self {
        Self::Engine {
            title: title.into(),
        }
    }

    /// Stable error kind used in the response body.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound { .. } => "notfound",
            Self::Engine { .. } => "engine",
            Self::Busy { .. } => "busy",
        }
    }

    /// HTTP-style status code for the error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Engine { .. } | Self::Busy { .. } => 500,
        }
    }

    /// Wire body `{type, title}` for the error.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let title = match self {
            Self::BadRequest { title }
            | Self::NotFound { title }
            | Self::Engine { title }
            | Self::Busy { title } => title,
        };
        json!({ "type": self.kind(), "title": title })
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

impl From<SchemaError> for TableError {
    fn from(error: SchemaError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<CodecError> for TableError {
    fn from(error: CodecError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<TimeuuidError> for TableError {
    fn from(error: TimeuuidError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<HashError> for TableError {
    fn from(error: HashError) -> Self {
        Self::engine(error.to_string())
    }
}

impl From<InfoError> for TableError {
    fn from(error: InfoError) -> Self {
        match error {
            InfoError::Schema(inner) => inner.into(),
            InfoError::Hash(inner) => inner.into(),
        }
    }
}
