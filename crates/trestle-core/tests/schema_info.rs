// crates/trestle-core/tests/schema_info.rs
// ============================================================================
// Module: Schema and Schema-Info Tests
// Description: Validate schema normalization, fingerprints, and derivation.
// Purpose: Ensure the derived physical view honors the schema contract.
// ============================================================================

//! Conformance tests for schema validation, fingerprint stability, and
//! schema-info derivation (key lists, bookkeeping injection, secondary
//! sub-schemas).

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::json;
use trestle_core::AttributeType;
use trestle_core::IndexElement;
use trestle_core::IndexKind;
use trestle_core::SchemaError;
use trestle_core::SchemaInfo;
use trestle_core::SortOrder;
use trestle_core::TableSchema;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn simple_schema() -> TableSchema {
    serde_json::from_value(json!({
        "table": "simple",
        "attributes": {
            "key": "string",
            "tid": "timeuuid",
            "body": "blob"
        },
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "tid", "type": "range", "order": "desc"}
        ]
    }))
    .expect("schema json")
}

// ============================================================================
// SECTION: Validation Tests
// ============================================================================

#[test]
fn range_order_defaults_to_desc() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "defaults",
        "attributes": {"key": "string", "rank": "int"},
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "rank", "type": "range"}
        ]
    }))
    .unwrap();
    let normalized = schema.normalize().unwrap();
    assert_eq!(normalized.index[1].order, Some(SortOrder::Desc));
}

#[test]
fn empty_index_is_rejected() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "broken",
        "attributes": {"key": "string"},
        "index": []
    }))
    .unwrap();
    assert!(matches!(schema.normalize(), Err(SchemaError::EmptyIndex(_))));
}

#[test]
fn missing_hash_key_is_rejected() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "broken",
        "attributes": {"rank": "int"},
        "index": [{"attribute": "rank", "type": "range"}]
    }))
    .unwrap();
    assert!(matches!(schema.normalize(), Err(SchemaError::MissingHashKey(_))));
}

#[test]
fn unknown_index_attribute_is_rejected() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "broken",
        "attributes": {"key": "string"},
        "index": [{"attribute": "missing", "type": "hash"}]
    }))
    .unwrap();
    assert!(matches!(
        schema.normalize(),
        Err(SchemaError::UnknownIndexAttribute { .. })
    ));
}

#[test]
fn zero_version_is_rejected() {
    let mut schema = simple_schema();
    schema.version = 0;
    assert!(matches!(schema.normalize(), Err(SchemaError::UnsupportedVersion(0))));
}

#[test]
fn zero_retention_count_is_rejected() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "broken",
        "attributes": {"key": "string"},
        "index": [{"attribute": "key", "type": "hash"}],
        "revisionRetentionPolicy": {"type": "latest", "count": 0}
    }))
    .unwrap();
    assert!(matches!(schema.normalize(), Err(SchemaError::InvalidRetention(_))));
}

// ============================================================================
// SECTION: Derivation Tests
// ============================================================================

#[test]
fn declared_timeuuid_tail_becomes_the_versioning_key() {
    let info = SchemaInfo::derive(simple_schema()).unwrap();
    assert_eq!(info.tid, "tid");
    assert_eq!(info.i_keys, vec!["key".to_string(), "tid".to_string()]);
    assert!(info.schema.attributes.contains_key("_exist_until"));
    assert!(!info.schema.attributes.contains_key("_tid"));
}

#[test]
fn versioning_key_is_injected_when_absent() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "bare",
        "attributes": {"key": "string"},
        "index": [{"attribute": "key", "type": "hash"}]
    }))
    .unwrap();
    let info = SchemaInfo::derive(schema).unwrap();
    assert_eq!(info.tid, "_tid");
    assert_eq!(info.i_keys, vec!["key".to_string(), "_tid".to_string()]);
    let tail = info.schema.index.last().unwrap();
    assert_eq!(tail.attribute, "_tid");
    assert_eq!(tail.kind, IndexKind::Range);
    assert_eq!(tail.order, Some(SortOrder::Desc));
}

#[test]
fn derivation_is_idempotent() {
    let first = SchemaInfo::derive(simple_schema()).unwrap();
    let second = SchemaInfo::derive(first.schema.clone()).unwrap();
    assert_eq!(first.hash, second.hash);
    assert_eq!(first.schema, second.schema);
}

#[test]
fn fingerprint_is_stable_under_key_reordering() {
    let left: TableSchema = serde_json::from_str(
        r#"{
            "table": "stable",
            "attributes": {"a": "string", "b": "int", "key": "string"},
            "index": [{"attribute": "key", "type": "hash"}]
        }"#,
    )
    .unwrap();
    let right: TableSchema = serde_json::from_str(
        r#"{
            "table": "stable",
            "attributes": {"key": "string", "b": "int", "a": "string"},
            "index": [{"attribute": "key", "type": "hash"}]
        }"#,
    )
    .unwrap();
    let left = SchemaInfo::derive(left).unwrap();
    let right = SchemaInfo::derive(right).unwrap();
    assert_eq!(left.hash, right.hash);
}

#[test]
fn fingerprint_tracks_index_changes() {
    let base = SchemaInfo::derive(simple_schema()).unwrap();
    let mut changed = simple_schema();
    changed.index.insert(1, IndexElement::fixed("body"));
    let changed = SchemaInfo::derive(changed).unwrap();
    assert_ne!(base.hash, changed.hash);
}

#[test]
fn secondary_sub_schema_is_augmented_with_parent_keys() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "indexed",
        "attributes": {
            "key": "string",
            "tid": "timeuuid",
            "author": "string",
            "size": "int"
        },
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "tid", "type": "range", "order": "desc"}
        ],
        "secondaryIndexes": {
            "by_author": [
                {"attribute": "author", "type": "hash"},
                {"attribute": "size", "type": "proj"}
            ]
        }
    }))
    .unwrap();
    let info = SchemaInfo::derive(schema).unwrap();
    let sub = info.secondary_indexes.get("by_author").unwrap();
    // Declared hash key first, then the parent hash key; the versioning key
    // stays out of the sub-schema.
    assert_eq!(sub.i_keys, vec!["author".to_string(), "key".to_string()]);
    assert_eq!(sub.proj, vec!["size".to_string()]);
    assert!(!sub.i_keys.contains(&"tid".to_string()));
    assert_eq!(
        info.secondary_table_columns(),
        vec!["key", "author", "size"]
    );
    assert_eq!(info.secondary_primary_key(), vec!["key"]);
}

#[test]
fn static_columns_split_between_sidecars() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "with_static",
        "attributes": {
            "key": "string",
            "tid": "timeuuid",
            "latest": "timeuuid",
            "body": "blob"
        },
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "latest", "type": "static"},
            {"attribute": "tid", "type": "range", "order": "desc"}
        ]
    }))
    .unwrap();
    let info = SchemaInfo::derive(schema).unwrap();
    assert!(info.is_static("latest"));
    assert!(!info.data_columns().contains(&"latest"));
    assert_eq!(info.static_columns(), vec!["key", "latest"]);
}

// ============================================================================
// SECTION: Wire Form Tests
// ============================================================================

#[test]
fn schema_round_trips_through_json() {
    let schema = simple_schema();
    let encoded = serde_json::to_value(&schema).unwrap();
    let decoded: TableSchema = serde_json::from_value(encoded).unwrap();
    assert_eq!(schema, decoded);
}

#[test]
fn retention_policy_uses_tagged_wire_form() {
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "retained",
        "attributes": {"key": "string"},
        "index": [{"attribute": "key", "type": "hash"}],
        "revisionRetentionPolicy": {"type": "interval", "count": 4, "grace_ttl": 86400, "interval": 3600}
    }))
    .unwrap();
    let mut attributes = BTreeMap::new();
    attributes.insert("key".to_string(), AttributeType::String);
    assert_eq!(
        schema.revision_retention_policy,
        trestle_core::RetentionPolicy::Interval {
            count: 4,
            grace_ttl: 86_400,
            interval: 3_600
        }
    );
    assert_eq!(schema.attributes, attributes);
}
