// crates/trestle-core/src/core/types.rs
// ============================================================================
// Module: Attribute and Index Types
// Description: Declared attribute types and index element definitions.
// Purpose: Model the wide-column type lattice and its physical SQL mapping.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Logical schemas declare attributes with wide-column types (`string`,
//! `timeuuid`, `set<int>`, …) and an ordered index of hash/range/static
//! elements. This module defines both vocabularies plus the mapping from each
//! declared type to the physical SQL column type used by the backing engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use thiserror::Error;

// ============================================================================
// SECTION: Attribute Types
// ============================================================================

/// Declared type of a logical attribute.
///
/// The textual wire form matches the schema language: lowercase scalar names
/// and `set<T>` for typed sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// UTF-8 text.
    String,
    /// Raw byte buffer.
    Blob,
    /// Boolean stored as 0/1.
    Boolean,
    /// 64-bit signed integer.
    Int,
    /// Arbitrary-width integer (stored as 64-bit).
    Varint,
    /// Exact decimal, canonicalized through its textual form.
    Decimal,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Millisecond-precision timestamp.
    Timestamp,
    /// v1-style time identifier with sortable textual rewrite.
    Timeuuid,
    /// Random UUID in canonical text form.
    Uuid,
    /// Arbitrary JSON document.
    Json,
    /// Set of a scalar element type.
    Set(Box<AttributeType>),
}

impl AttributeType {
    /// Returns the physical SQL column type for this declared type.
    #[must_use]
    pub fn physical_type(&self) -> &'static str {
        match self {
            Self::String | Self::Uuid | Self::Timeuuid => "text",
            Self::Blob | Self::Json | Self::Set(_) => "blob",
            Self::Boolean | Self::Int | Self::Varint | Self::Decimal | Self::Timestamp => {
                "integer"
            }
            Self::Float | Self::Double => "real",
        }
    }

    /// Returns the element type when this is a set type.
    #[must_use]
    pub fn element_type(&self) -> Option<&AttributeType> {
        match self {
            Self::Set(element) => Some(element),
            _ => None,
        }
    }

    /// Returns true when set elements of this type compare numerically.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Int
                | Self::Varint
                | Self::Float
                | Self::Double
                | Self::Timestamp
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Blob => f.write_str("blob"),
            Self::Boolean => f.write_str("boolean"),
            Self::Int => f.write_str("int"),
            Self::Varint => f.write_str("varint"),
            Self::Decimal => f.write_str("decimal"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Timeuuid => f.write_str("timeuuid"),
            Self::Uuid => f.write_str("uuid"),
            Self::Json => f.write_str("json"),
            Self::Set(element) => write!(f, "set<{element}>"),
        }
    }
}

/// Error raised for unrecognized attribute type names.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown attribute type: {0}")]
pub struct UnknownAttributeType(pub String);

impl FromStr for AttributeType {
    type Err = UnknownAttributeType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if let Some(inner) = raw.strip_prefix("set<").and_then(|rest| rest.strip_suffix('>')) {
            let element = inner.trim().parse::<Self>()?;
            if matches!(element, Self::Set(_)) {
                return Err(UnknownAttributeType(raw.to_string()));
            }
            return Ok(Self::Set(Box::new(element)));
        }
        match raw {
            "string" => Ok(Self::String),
            "blob" => Ok(Self::Blob),
            "boolean" => Ok(Self::Boolean),
            "int" => Ok(Self::Int),
            "varint" => Ok(Self::Varint),
            "decimal" => Ok(Self::Decimal),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "timestamp" => Ok(Self::Timestamp),
            "timeuuid" => Ok(Self::Timeuuid),
            "uuid" => Ok(Self::Uuid),
            "json" => Ok(Self::Json),
            other => Err(UnknownAttributeType(other.to_string())),
        }
    }
}

impl Serialize for AttributeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttributeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

// ============================================================================
// SECTION: Index Elements
// ============================================================================

/// Sort order of a range key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword for this order.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Returns the opposite order.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Role of an attribute within an index declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Partition key component.
    Hash,
    /// Clustering key component with a sort order.
    Range,
    /// Per-partition value stored in the static sidecar.
    Static,
    /// Non-key projected attribute (secondary indexes only).
    Proj,
}

/// Single element of an index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexElement {
    /// Attribute the element refers to.
    pub attribute: String,
    /// Role of the attribute in the index.
    #[serde(rename = "type")]
    pub kind: IndexKind,
    /// Sort order; meaningful for range elements only. Defaults to `desc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl IndexElement {
    /// Creates a hash element.
    #[must_use]
    pub fn hash(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            kind: IndexKind::Hash,
            order: None,
        }
    }

    /// Creates a range element with an explicit order.
    #[must_use]
    pub fn range(attribute: &str, order: SortOrder) -> Self {
        Self {
            attribute: attribute.to_string(),
            kind: IndexKind::Range,
            order: Some(order),
        }
    }

    /// Creates a static element.
    #[must_use]
    pub fn fixed(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            kind: IndexKind::Static,
            order: None,
        }
    }

    /// Creates a projection element.
    #[must_use]
    pub fn proj(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            kind: IndexKind::Proj,
            order: None,
        }
    }

    /// Returns the effective sort order for a range element.
    #[must_use]
    pub fn effective_order(&self) -> SortOrder {
        self.order.unwrap_or(SortOrder::Desc)
    }

    /// Returns true when the element is part of the primary key.
    #[must_use]
    pub const fn is_key(&self) -> bool {
        matches!(self.kind, IndexKind::Hash | IndexKind::Range)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
