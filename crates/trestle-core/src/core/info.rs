// crates/trestle-core/src/core/info.rs
// ============================================================================
// Module: Derived Schema Info
// Description: Physical-layout view computed from a normalized schema.
// Purpose: Provide key lists, bookkeeping attributes, fingerprint, and
//          secondary-index sub-schemas to the query compiler.
// Dependencies: crate::core::{hashing, schema, types}, serde, thiserror
// ============================================================================

//! ## Overview
//! Schema-info is the engine's working view of a logical table: the ordered
//! primary-key attribute list (`i_keys`), injected bookkeeping attributes
//! (`_tid` versioning key, `_exist_until` soft-delete deadline), a stable
//! content fingerprint used to detect migrations, and one sub-schema per
//! secondary index. Derivation is idempotent: deriving from an
//! already-injected schema changes nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashError;
use crate::core::hashing::canonical_fingerprint;
use crate::core::schema::SchemaError;
use crate::core::schema::TableSchema;
use crate::core::types::AttributeType;
use crate::core::types::IndexElement;
use crate::core::types::IndexKind;
use crate::core::types::SortOrder;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Injected versioning key name when the schema lacks a timeuuid range tail.
pub const TID_ATTRIBUTE: &str = "_tid";
/// Injected soft-delete deadline attribute (milliseconds since epoch).
pub const EXIST_UNTIL_ATTRIBUTE: &str = "_exist_until";
/// Request-level TTL pseudo-attribute consumed by the write path.
pub const TTL_ATTRIBUTE: &str = "_ttl";
/// Optional bookkeeping column stripped from read results when present.
pub const DOMAIN_ATTRIBUTE: &str = "_domain";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while deriving schema-info.
#[derive(Debug, Error)]
pub enum InfoError {
    /// Schema validation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Fingerprint computation failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Secondary Index Info
// ============================================================================

/// Derived sub-schema for one secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryIndexInfo {
    /// Key elements: declared hash/range keys augmented by the parent's
    /// hash/range keys (except the versioning key) for uniqueness.
    pub elements: Vec<IndexElement>,
    /// Non-key projected attributes.
    pub proj: Vec<String>,
    /// Key attribute names in element order.
    pub i_keys: Vec<String>,
    /// Key attribute name to its element.
    pub i_key_map: BTreeMap<String, IndexElement>,
}

// ============================================================================
// SECTION: Schema Info
// ============================================================================

/// Derived view of a logical table used by the compiler and write pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Normalized schema with bookkeeping attributes injected.
    pub schema: TableSchema,
    /// Hash and range key attributes in declared order.
    pub i_keys: Vec<String>,
    /// Key attribute name to its index element.
    pub i_key_map: BTreeMap<String, IndexElement>,
    /// Name of the versioning timeuuid range key.
    pub tid: String,
    /// Stable content fingerprint of the normalized schema.
    pub hash: String,
    /// Secondary index name to derived sub-schema.
    pub secondary_indexes: BTreeMap<String, SecondaryIndexInfo>,
}

impl SchemaInfo {
    /// Derives schema-info from an author-supplied schema.
    ///
    /// # Errors
    ///
    /// Returns [`InfoError`] when validation or fingerprinting fails.
    pub fn derive(schema: TableSchema) -> Result<Self, InfoError> {
        let mut schema = schema.normalize()?;

        let tid = match versioning_tail(&schema) {
            Some(attribute) => attribute,
            None => {
                schema
                    .attributes
                    .insert(TID_ATTRIBUTE.to_string(), AttributeType::Timeuuid);
                schema.index.push(IndexElement::range(TID_ATTRIBUTE, SortOrder::Desc));
                TID_ATTRIBUTE.to_string()
            }
        };
        schema
            .attributes
            .entry(EXIST_UNTIL_ATTRIBUTE.to_string())
            .or_insert(AttributeType::Timestamp);

        let i_keys: Vec<String> = schema
            .index
            .iter()
            .filter(|element| element.is_key())
            .map(|element| element.attribute.clone())
            .collect();
        let i_key_map: BTreeMap<String, IndexElement> = schema
            .index
            .iter()
            .filter(|element| element.is_key())
            .map(|element| (element.attribute.clone(), element.clone()))
            .collect();

        let hash = canonical_fingerprint(&schema)?;

        let mut secondary_indexes = BTreeMap::new();
        for (name, declared) in &schema.secondary_indexes {
            secondary_indexes
                .insert(name.clone(), derive_secondary(declared, &i_key_map, &i_keys, &tid));
        }

        Ok(Self {
            schema,
            i_keys,
            i_key_map,
            tid,
            hash,
            secondary_indexes,
        })
    }

    /// Returns the declared type of an attribute.
    #[must_use]
    pub fn column_type(&self, attribute: &str) -> Option<&AttributeType> {
        self.schema.attributes.get(attribute)
    }

    /// Returns true when the attribute is declared static.
    #[must_use]
    pub fn is_static(&self, attribute: &str) -> bool {
        self.schema
            .index
            .iter()
            .any(|element| element.kind == IndexKind::Static && element.attribute == attribute)
    }

    /// Hash key attribute names in declared order.
    #[must_use]
    pub fn hash_keys(&self) -> Vec<&str> {
        self.schema
            .index
            .iter()
            .filter(|element| element.kind == IndexKind::Hash)
            .map(|element| element.attribute.as_str())
            .collect()
    }

    /// Range key elements in declared order.
    #[must_use]
    pub fn range_elements(&self) -> Vec<&IndexElement> {
        self.schema.index.iter().filter(|element| element.kind == IndexKind::Range).collect()
    }

    /// Columns of the data table: every attribute except statics.
    #[must_use]
    pub fn data_columns(&self) -> Vec<&str> {
        self.schema
            .attributes
            .keys()
            .map(String::as_str)
            .filter(|attribute| !self.is_static(attribute))
            .collect()
    }

    /// Columns of the static sidecar: hash keys then static attributes.
    #[must_use]
    pub fn static_columns(&self) -> Vec<&str> {
        let mut columns = self.hash_keys();
        columns.extend(
            self.schema
                .index
                .iter()
                .filter(|element| element.kind == IndexKind::Static)
                .map(|element| element.attribute.as_str()),
        );
        columns
    }

    /// Primary key of the secondary-index sidecar: parent keys minus the
    /// versioning key.
    #[must_use]
    pub fn secondary_primary_key(&self) -> Vec<&str> {
        self.i_keys
            .iter()
            .map(String::as_str)
            .filter(|attribute| *attribute != self.tid)
            .collect()
    }

    /// Columns of the secondary-index sidecar: the sidecar primary key plus
    /// the union of all declared index keys and projections, first
    /// occurrence wins.
    #[must_use]
    pub fn secondary_table_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.secondary_primary_key();
        for info in self.secondary_indexes.values() {
            for key in &info.i_keys {
                if !columns.contains(&key.as_str()) {
                    columns.push(key.as_str());
                }
            }
            for proj in &info.proj {
                if !columns.contains(&proj.as_str()) {
                    columns.push(proj.as_str());
                }
            }
        }
        columns
    }

    /// Attributes read results expose: everything declared except
    /// bookkeeping columns.
    #[must_use]
    pub fn visible_columns(&self) -> Vec<&str> {
        self.schema
            .attributes
            .keys()
            .map(String::as_str)
            .filter(|attribute| {
                *attribute != EXIST_UNTIL_ATTRIBUTE && *attribute != DOMAIN_ATTRIBUTE
            })
            .collect()
    }
}

/// Returns the attribute name of an existing descending timeuuid range tail.
fn versioning_tail(schema: &TableSchema) -> Option<String> {
    let tail = schema.index.last()?;
    if tail.kind != IndexKind::Range || tail.effective_order() != SortOrder::Desc {
        return None;
    }
    match schema.attributes.get(&tail.attribute) {
        Some(AttributeType::Timeuuid) => Some(tail.attribute.clone()),
        _ => None,
    }
}

/// Builds the sub-schema for one secondary index.
fn derive_secondary(
    declared: &[IndexElement],
    parent_key_map: &BTreeMap<String, IndexElement>,
    parent_keys: &[String],
    tid: &str,
) -> SecondaryIndexInfo {
    let mut elements: Vec<IndexElement> =
        declared.iter().filter(|element| element.is_key()).cloned().collect();
    for parent_key in parent_keys {
        if parent_key == tid {
            continue;
        }
        if elements.iter().any(|element| &element.attribute == parent_key) {
            continue;
        }
        let Some(parent) = parent_key_map.get(parent_key) else {
            continue;
        };
        // Parent hash keys join the sub-schema as ascending range keys so the
        // augmented key stays order-able.
        let element = match parent.kind {
            IndexKind::Range => parent.clone(),
            _ => IndexElement::range(parent_key, SortOrder::Asc),
        };
        elements.push(element);
    }

    let proj: Vec<String> = declared
        .iter()
        .filter(|element| element.kind == IndexKind::Proj)
        .map(|element| element.attribute.clone())
        .collect();
    let i_keys: Vec<String> = elements.iter().map(|element| element.attribute.clone()).collect();
    let i_key_map: BTreeMap<String, IndexElement> = elements
        .iter()
        .map(|element| (element.attribute.clone(), element.clone()))
        .collect();

    SecondaryIndexInfo {
        elements,
        proj,
        i_keys,
        i_key_map,
    }
}
