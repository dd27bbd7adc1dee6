// crates/trestle-core/src/core/envelope.rs
// ============================================================================
// Module: Request and Response Envelope
// Description: Typed get/put/delete requests, predicates, and results.
// Purpose: Give each operation a structured payload with stable wire forms.
// Dependencies: crate::core::{errors, types}, serde, serde_json
// ============================================================================

//! ## Overview
//! Requests arrive as JSON bodies scoped by a logical domain and table.
//! Predicates are either a bare value (equality) or an operator object with
//! exactly one of `eq`, `lt`, `gt`, `le`, `ge`, `between`; projections are
//! `'*'`, a single column, or a column list; a conditional put carries either
//! the literal `"not exists"` or a predicate map. Unknown body fields are
//! ignored. Responses use HTTP-style status codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::core::errors::TableError;
use crate::core::types::SortOrder;

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Condition on a single key attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Equality with a bare value.
    Eq(Value),
    /// Strictly less than.
    Lt(Value),
    /// Strictly greater than.
    Gt(Value),
    /// Less than or equal.
    Le(Value),
    /// Greater than or equal.
    Ge(Value),
    /// Inclusive two-sided bound.
    Between(Value, Value),
}

/// Recognized operator keys.
const OPERATOR_KEYS: [&str; 6] = ["eq", "lt", "gt", "le", "ge", "between"];

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if let Value::Object(object) = &raw
            && object.len() == 1
            && let Some((key, value)) = object.iter().next()
            && OPERATOR_KEYS.contains(&key.as_str())
        {
            return match key.as_str() {
                "eq" => Ok(Self::Eq(value.clone())),
                "lt" => Ok(Self::Lt(value.clone())),
                "gt" => Ok(Self::Gt(value.clone())),
                "le" => Ok(Self::Le(value.clone())),
                "ge" => Ok(Self::Ge(value.clone())),
                _ => {
                    let Value::Array(bounds) = value else {
                        return Err(D::Error::custom("between expects a two-element array"));
                    };
                    if bounds.len() != 2 {
                        return Err(D::Error::custom("between expects a two-element array"));
                    }
                    Ok(Self::Between(bounds[0].clone(), bounds[1].clone()))
                }
            };
        }
        Ok(Self::Eq(raw))
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Eq(value) => value.serialize(serializer),
            Self::Lt(value) => single_entry(serializer, "lt", value),
            Self::Gt(value) => single_entry(serializer, "gt", value),
            Self::Le(value) => single_entry(serializer, "le", value),
            Self::Ge(value) => single_entry(serializer, "ge", value),
            Self::Between(low, high) => {
                single_entry(serializer, "between", &json!([low, high]))
            }
        }
    }
}

/// Serializes a one-entry operator object.
fn single_entry<S: Serializer>(
    serializer: S,
    key: &str,
    value: &Value,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

// ============================================================================
// SECTION: Projection
// ============================================================================

/// Requested projection of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every declared attribute (`'*'`).
    All,
    /// A single column.
    One(String),
    /// An explicit column list.
    Columns(Vec<String>),
}

impl<'de> Deserialize<'de> for Projection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(column) if column == "*" => Ok(Self::All),
            Value::String(column) => Ok(Self::One(column)),
            Value::Array(columns) => {
                let mut names = Vec::with_capacity(columns.len());
                for column in columns {
                    match column {
                        Value::String(name) => names.push(name),
                        _ => return Err(D::Error::custom("projection entries must be strings")),
                    }
                }
                Ok(Self::Columns(names))
            }
            _ => Err(D::Error::custom("projection must be '*', a column, or a column list")),
        }
    }
}

impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("*"),
            Self::One(column) => serializer.serialize_str(column),
            Self::Columns(columns) => columns.serialize(serializer),
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Structured read request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetRequest {
    /// Logical table name.
    pub table: String,
    /// Key predicates.
    #[serde(default)]
    pub attributes: BTreeMap<String, Predicate>,
    /// Requested projection; defaults to every declared attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proj: Option<Projection>,
    /// Requested ordering per range key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub order: BTreeMap<String, SortOrder>,
    /// Maximum number of rows to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Offset-style paging cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    /// Secondary index to route through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Deduplicate the projected rows.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub distinct: bool,
}

/// Condition attached to a put.
#[derive(Debug, Clone, PartialEq)]
pub enum PutCondition {
    /// Insert only when no row exists for the primary key.
    NotExists,
    /// Update only when the predicates match the existing row.
    If(BTreeMap<String, Predicate>),
}

impl<'de> Deserialize<'de> for PutCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(literal) if literal == "not exists" => Ok(Self::NotExists),
            Value::Object(object) => {
                let mut predicates = BTreeMap::new();
                for (attribute, condition) in object {
                    let predicate = Predicate::deserialize(condition)
                        .map_err(|err| D::Error::custom(err.to_string()))?;
                    predicates.insert(attribute, predicate);
                }
                Ok(Self::If(predicates))
            }
            _ => Err(D::Error::custom("if must be 'not exists' or a predicate object")),
        }
    }
}

impl Serialize for PutCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NotExists => serializer.serialize_str("not exists"),
            Self::If(predicates) => predicates.serialize(serializer),
        }
    }
}

/// Structured write request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    /// Logical table name.
    pub table: String,
    /// Attribute values to write. May carry the `_ttl` pseudo-attribute.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Optional write condition.
    #[serde(
        default,
        rename = "if",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<PutCondition>,
}

/// Structured delete request. Deletes are hard deletes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Logical table name.
    pub table: String,
    /// Key predicates selecting the rows to delete.
    #[serde(default)]
    pub attributes: BTreeMap<String, Predicate>,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Read result envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Number of returned rows.
    pub count: usize,
    /// Returned rows with codec-decoded attribute values.
    pub items: Vec<Map<String, Value>>,
    /// Monotonic offset cursor, present when the request paged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
}

/// HTTP-style response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP-style status code.
    pub status: u16,
    /// Response headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Optional JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// 201 for successful creates, puts, and migrations.
    #[must_use]
    pub fn created() -> Self {
        Self {
            status: 201,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// 204 for successful deletes and drops.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Read response: 200 with the result set, or 404 with an empty item
    /// list when nothing matched.
    #[must_use]
    pub fn for_get(result: ResultSet) -> Self {
        let status = if result.items.is_empty() { 404 } else { 200 };
        Self {
            status,
            headers: BTreeMap::new(),
            body: serde_json::to_value(result).ok(),
        }
    }

    /// Schema response with an `etag` header when a version tid is known.
    #[must_use]
    pub fn for_schema(schema: Value, tid: Option<String>) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(tid) = tid {
            headers.insert("etag".to_string(), tid);
        }
        Self {
            status: 200,
            headers,
            body: Some(schema),
        }
    }

    /// Error response carrying the `{type, title}` body.
    #[must_use]
    pub fn for_error(error: &TableError) -> Self {
        let mut body = error.to_body();
        // Missing tables read as empty; keep the envelope shape for callers
        // that iterate items unconditionally.
        if matches!(error, TableError::NotFound { .. })
            && let Value::Object(object) = &mut body
        {
            object.insert("count".to_string(), json!(0));
            object.insert("items".to_string(), json!([]));
        }
        Self {
            status: error.status(),
            headers: BTreeMap::new(),
            body: Some(body),
        }
    }
}
