// crates/trestle-core/src/core/schema.rs
// ============================================================================
// Module: Logical Table Schema
// Description: Author-supplied schema model with validation and defaults.
// Purpose: Normalize user schemas into a canonical, hashable form.
// Dependencies: crate::core::types, serde, thiserror
// ============================================================================

//! ## Overview
//! A logical schema names its attributes, declares an ordered primary index
//! of hash/range/static elements, and may attach secondary indexes and a
//! revision retention policy. Normalization fills defaults (range order,
//! empty secondary-index map, retention `all`) and rejects malformed input
//! before any physical layout is derived.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::AttributeType;
use crate::core::types::IndexElement;
use crate::core::types::IndexKind;
use crate::core::types::SortOrder;

// ============================================================================
// SECTION: Retention Policy
// ============================================================================

/// Revision retention policy applied after each write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every revision.
    All,
    /// Keep the newest `count` revisions per hash-key group.
    Latest {
        /// Number of live revisions to retain.
        count: u32,
        /// Grace period in seconds before superseded revisions are purged.
        #[serde(default)]
        grace_ttl: u64,
    },
    /// Like `latest`, but superseded revisions are physically deleted.
    LatestHash {
        /// Number of live revisions to retain.
        count: u32,
        /// Grace period in seconds before superseded revisions are purged.
        #[serde(default)]
        grace_ttl: u64,
    },
    /// Keep the newest `count` revisions per time bucket.
    Interval {
        /// Number of live revisions to retain per bucket.
        count: u32,
        /// Grace period in seconds before superseded revisions are purged.
        #[serde(default)]
        grace_ttl: u64,
        /// Bucket width in seconds.
        interval: u64,
    },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::All
    }
}

impl RetentionPolicy {
    /// Validates policy parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidRetention`] for zero counts or intervals.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Self::All => Ok(()),
            Self::Latest { count, .. } | Self::LatestHash { count, .. } => {
                if *count == 0 {
                    return Err(SchemaError::InvalidRetention(
                        "retention count must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Interval {
                count, interval, ..
            } => {
                if *count == 0 {
                    return Err(SchemaError::InvalidRetention(
                        "retention count must be greater than zero".to_string(),
                    ));
                }
                if *interval == 0 {
                    return Err(SchemaError::InvalidRetention(
                        "retention interval must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Table Options
// ============================================================================

/// Advisory durability level for a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Relaxed durability.
    Low,
    /// Standard durability.
    #[default]
    Standard,
}

/// Advisory per-table options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Advisory durability level.
    #[serde(default)]
    pub durability: Durability,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema validation failures. All map to `bad_request`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Schema version must be at least 1.
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),
    /// The primary index is empty.
    #[error("table {0} has an empty index")]
    EmptyIndex(String),
    /// No hash element was declared.
    #[error("table {0} declares no hash key")]
    MissingHashKey(String),
    /// An index element names an undeclared attribute.
    #[error("index {index} references unknown attribute {attribute}")]
    UnknownIndexAttribute {
        /// Index name (`primary` for the table index).
        index: String,
        /// Offending attribute name.
        attribute: String,
    },
    /// An attribute appears twice in one index.
    #[error("index {index} repeats attribute {attribute}")]
    DuplicateIndexAttribute {
        /// Index name.
        index: String,
        /// Offending attribute name.
        attribute: String,
    },
    /// A projection element appeared in the primary index.
    #[error("primary index cannot project attribute {0}")]
    ProjInPrimaryIndex(String),
    /// A static element appeared in a secondary index.
    #[error("secondary index {index} cannot declare static attribute {attribute}")]
    StaticInSecondaryIndex {
        /// Index name.
        index: String,
        /// Offending attribute name.
        attribute: String,
    },
    /// An attribute used a reserved name.
    #[error("attribute name {0} is reserved")]
    ReservedAttribute(String),
    /// Retention policy parameters are out of range.
    #[error("invalid retention policy: {0}")]
    InvalidRetention(String),
}

// ============================================================================
// SECTION: Table Schema
// ============================================================================

/// Default schema version.
const fn default_schema_version() -> u32 {
    1
}

/// Author-supplied logical table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Logical table name.
    pub table: String,
    /// Attribute name to declared type.
    pub attributes: BTreeMap<String, AttributeType>,
    /// Ordered primary index elements.
    pub index: Vec<IndexElement>,
    /// Secondary index name to its element sequence.
    #[serde(default)]
    pub secondary_indexes: BTreeMap<String, Vec<IndexElement>>,
    /// Revision retention policy. Defaults to keeping every revision.
    #[serde(default)]
    pub revision_retention_policy: RetentionPolicy,
    /// Schema version; monotonic across migrations.
    #[serde(default = "default_schema_version")]
    pub version: u32,
    /// Advisory options.
    #[serde(default)]
    pub options: TableOptions,
}

impl TableSchema {
    /// Validates the schema and fills defaults, producing the canonical form.
    ///
    /// Range elements without an explicit order become `desc`; non-range
    /// elements lose any stray order so equivalent schemas canonicalize
    /// identically.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the schema is malformed.
    pub fn normalize(mut self) -> Result<Self, SchemaError> {
        if self.version == 0 {
            return Err(SchemaError::UnsupportedVersion(self.version));
        }
        if self.index.is_empty() {
            return Err(SchemaError::EmptyIndex(self.table.clone()));
        }
        if self.attributes.contains_key("_ttl") {
            return Err(SchemaError::ReservedAttribute("_ttl".to_string()));
        }
        self.revision_retention_policy.validate()?;

        normalize_elements("primary", &mut self.index, &self.attributes)?;
        if !self.index.iter().any(|element| element.kind == IndexKind::Hash) {
            return Err(SchemaError::MissingHashKey(self.table.clone()));
        }
        if let Some(element) =
            self.index.iter().find(|element| element.kind == IndexKind::Proj)
        {
            return Err(SchemaError::ProjInPrimaryIndex(element.attribute.clone()));
        }

        for (name, elements) in &mut self.secondary_indexes {
            normalize_elements(name, elements, &self.attributes)?;
            if !elements.iter().any(|element| element.kind == IndexKind::Hash) {
                return Err(SchemaError::MissingHashKey(name.clone()));
            }
            if let Some(element) =
                elements.iter().find(|element| element.kind == IndexKind::Static)
            {
                return Err(SchemaError::StaticInSecondaryIndex {
                    index: name.clone(),
                    attribute: element.attribute.clone(),
                });
            }
        }
        Ok(self)
    }

    /// Returns the attributes declared static in the primary index.
    #[must_use]
    pub fn static_attributes(&self) -> Vec<&IndexElement> {
        self.index.iter().filter(|element| element.kind == IndexKind::Static).collect()
    }

    /// Returns true when any primary index element is static.
    #[must_use]
    pub fn has_static_attributes(&self) -> bool {
        self.index.iter().any(|element| element.kind == IndexKind::Static)
    }
}

/// Normalizes one element sequence: fills range defaults, strips stray
/// orders, and checks attribute references and duplicates.
fn normalize_elements(
    index_name: &str,
    elements: &mut [IndexElement],
    attributes: &BTreeMap<String, AttributeType>,
) -> Result<(), SchemaError> {
    let mut seen = BTreeSet::new();
    for element in elements {
        if !attributes.contains_key(&element.attribute) {
            return Err(SchemaError::UnknownIndexAttribute {
                index: index_name.to_string(),
                attribute: element.attribute.clone(),
            });
        }
        if !seen.insert(element.attribute.clone()) {
            return Err(SchemaError::DuplicateIndexAttribute {
                index: index_name.to_string(),
                attribute: element.attribute.clone(),
            });
        }
        element.order = match element.kind {
            IndexKind::Range => Some(element.order.unwrap_or(SortOrder::Desc)),
            IndexKind::Hash | IndexKind::Static | IndexKind::Proj => None,
        };
    }
    Ok(())
}
