// crates/trestle-store-sqlite/tests/table_store.rs
// ============================================================================
// Module: Table Store Tests
// Description: End-to-end create/put/get/delete behavior over SQLite.
// Purpose: Ensure the engine honors the logical table contract.
// Dependencies: trestle-store-sqlite, trestle-core, rusqlite, serde_json,
//               tempfile
// ============================================================================

//! Conformance tests for the SQLite table store: round-trips, predicates,
//! static-column joins, secondary-index routing, paging, conditional puts,
//! and missing-table behavior.

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

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use trestle_core::DeleteRequest;
use trestle_core::GetRequest;
use trestle_core::Predicate;
use trestle_core::Projection;
use trestle_core::PutCondition;
use trestle_core::PutRequest;
use trestle_core::Response;
use trestle_core::TableError;
use trestle_core::TableSchema;
use trestle_core::TableStore;
use trestle_core::core::timeuuid;
use trestle_store_sqlite::EngineConfig;
use trestle_store_sqlite::SqliteTableStore;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const DOMAIN: &str = "test.host";

struct Fixture {
    _dir: TempDir,
    path: std::path::PathBuf,
    store: SqliteTableStore,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("engine.db");
    let config = EngineConfig {
        dbname: path.to_string_lossy().into_owned(),
        ..EngineConfig::default()
    };
    let store = SqliteTableStore::open(config).expect("store");
    Fixture {
        _dir: dir,
        path,
        store,
    }
}

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

fn put_row(store: &SqliteTableStore, key: &str, tid: &str, body: Option<&str>) {
    let mut attributes = BTreeMap::new();
    attributes.insert("key".to_string(), json!(key));
    attributes.insert("tid".to_string(), json!(tid));
    if let Some(body) = body {
        attributes.insert("body".to_string(), json!(body));
    }
    store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes,
            condition: None,
        })
        .expect("put");
}

fn get_by_key(store: &SqliteTableStore, key: &str) -> trestle_core::ResultSet {
    store
        .get(DOMAIN, GetRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([("key".to_string(), Predicate::Eq(json!(key)))]),
            ..GetRequest::default()
        })
        .expect("get")
}

// ============================================================================
// SECTION: Round-Trip Tests
// ============================================================================

#[test]
fn open_store_passes_the_readiness_probe() {
    let fixture = fixture();
    fixture.store.check_connection().unwrap();
}

#[test]
fn create_put_get_round_trip() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let tid = timeuuid::from_millis_floor(1_000);
    put_row(&fixture.store, "k", &tid, Some("hello"));

    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.count, 1);
    assert_eq!(result.items[0].get("key"), Some(&json!("k")));
    assert_eq!(result.items[0].get("tid"), Some(&json!(tid)));
    assert_eq!(result.items[0].get("body"), Some(&json!("hello")));

    let response = Response::for_get(result);
    assert_eq!(response.status, 200);
}

#[test]
fn between_predicate_selects_one_revision() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let t0 = timeuuid::from_millis_floor(1_000);
    let t1 = timeuuid::from_millis_floor(2_000);
    let t2 = timeuuid::from_millis_floor(3_000);
    put_row(&fixture.store, "k", &t1, Some("hello"));
    put_row(&fixture.store, "k", &t2, None);

    let result = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), Predicate::Eq(json!("k"))),
                (
                    "tid".to_string(),
                    Predicate::Between(json!(t0), json!(t1.clone())),
                ),
            ]),
            limit: Some(3),
            ..GetRequest::default()
        })
        .unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.items[0].get("tid"), Some(&json!(t1)));
}

#[test]
fn identical_primary_key_puts_yield_one_row() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let tid = timeuuid::from_millis_floor(1_000);
    put_row(&fixture.store, "k", &tid, Some("first"));
    put_row(&fixture.store, "k", &tid, Some("second"));

    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.count, 1);
    assert_eq!(result.items[0].get("body"), Some(&json!("second")));
}

#[test]
fn missing_tid_is_minted() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("body".to_string(), json!("auto")),
            ]),
            condition: None,
        })
        .unwrap();

    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.count, 1);
    let tid = result.items[0].get("tid").and_then(Value::as_str).unwrap();
    assert_eq!(tid.len(), 36);
}

// ============================================================================
// SECTION: Static Column Tests
// ============================================================================

#[test]
fn static_columns_join_on_read() {
    let fixture = fixture();
    let schema: TableSchema = serde_json::from_value(json!({
        "table": "with_static",
        "attributes": {
            "key": "string",
            "tid": "timeuuid",
            "latestTid": "timeuuid"
        },
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "latestTid", "type": "static"},
            {"attribute": "tid", "type": "range", "order": "desc"}
        ]
    }))
    .unwrap();
    fixture.store.create_table(DOMAIN, schema).unwrap();

    let t1 = timeuuid::from_millis_floor(1_000);
    let t2 = timeuuid::from_millis_floor(2_000);
    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "with_static".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(t1.clone())),
                ("latestTid".to_string(), json!(t1.clone())),
            ]),
            condition: None,
        })
        .unwrap();
    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "with_static".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(t2)),
            ]),
            condition: None,
        })
        .unwrap();

    let result = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "with_static".to_string(),
            attributes: BTreeMap::from([("key".to_string(), Predicate::Eq(json!("k")))]),
            proj: Some(Projection::Columns(vec![
                "key".to_string(),
                "tid".to_string(),
                "latestTid".to_string(),
            ])),
            ..GetRequest::default()
        })
        .unwrap();
    assert_eq!(result.count, 2);
    for item in &result.items {
        assert_eq!(item.get("latestTid"), Some(&json!(t1.clone())));
    }
}

// ============================================================================
// SECTION: Secondary Index Tests
// ============================================================================

#[test]
fn secondary_index_routes_reads() {
    let fixture = fixture();
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
    fixture.store.create_table(DOMAIN, schema).unwrap();

    for (key, author, size) in [("a", "alice", 10), ("b", "bob", 20), ("c", "alice", 30)] {
        fixture
            .store
            .put(DOMAIN, PutRequest {
                table: "indexed".to_string(),
                attributes: BTreeMap::from([
                    ("key".to_string(), json!(key)),
                    ("author".to_string(), json!(author)),
                    ("size".to_string(), json!(size)),
                ]),
                condition: None,
            })
            .unwrap();
    }

    let result = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "indexed".to_string(),
            index: Some("by_author".to_string()),
            attributes: BTreeMap::from([(
                "author".to_string(),
                Predicate::Eq(json!("alice")),
            )]),
            ..GetRequest::default()
        })
        .unwrap();
    assert_eq!(result.count, 2);
    let keys: Vec<&str> =
        result.items.iter().filter_map(|item| item.get("key").and_then(Value::as_str)).collect();
    assert!(keys.contains(&"a"));
    assert!(keys.contains(&"c"));
    for item in &result.items {
        assert!(item.get("size").is_some());
    }
}

// ============================================================================
// SECTION: Conditional Put Tests
// ============================================================================

#[test]
fn not_exists_keeps_the_first_write() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let tid = timeuuid::from_millis_floor(1_000);
    put_row(&fixture.store, "k", &tid, Some("first"));

    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(tid)),
                ("body".to_string(), json!("second")),
            ]),
            condition: Some(PutCondition::NotExists),
        })
        .unwrap();

    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.items[0].get("body"), Some(&json!("first")));
}

#[test]
fn if_predicate_guards_the_update() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let tid = timeuuid::from_millis_floor(1_000);
    put_row(&fixture.store, "k", &tid, Some("first"));

    // Non-matching predicate leaves the row alone but still succeeds.
    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(tid.clone())),
                ("body".to_string(), json!("second")),
            ]),
            condition: Some(PutCondition::If(BTreeMap::from([(
                "body".to_string(),
                Predicate::Eq(json!("other")),
            )]))),
        })
        .unwrap();
    assert_eq!(get_by_key(&fixture.store, "k").items[0].get("body"), Some(&json!("first")));

    // Matching predicate applies the update.
    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(tid)),
                ("body".to_string(), json!("second")),
            ]),
            condition: Some(PutCondition::If(BTreeMap::from([(
                "body".to_string(),
                Predicate::Eq(json!("first")),
            )]))),
        })
        .unwrap();
    assert_eq!(get_by_key(&fixture.store, "k").items[0].get("body"), Some(&json!("second")));
}

// ============================================================================
// SECTION: TTL Tests
// ============================================================================

#[test]
fn expired_rows_are_gated_out() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let expired = timeuuid::from_millis_floor(1_000);
    let live = timeuuid::from_millis_floor(2_000);

    fixture
        .store
        .put(DOMAIN, PutRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!("k")),
                ("tid".to_string(), json!(expired)),
                // Already in the past relative to the write clock.
                ("_exist_until".to_string(), json!(1)),
            ]),
            condition: None,
        })
        .unwrap();
    put_row(&fixture.store, "k", &live, Some("kept"));

    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.count, 1);
    assert_eq!(result.items[0].get("tid"), Some(&json!(live)));
    assert!(result.items[0].get("_exist_until").is_none());
}

// ============================================================================
// SECTION: Paging Tests
// ============================================================================

#[test]
fn limit_and_next_page_through_revisions() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    for millis in [1_000, 2_000, 3_000] {
        put_row(&fixture.store, "k", &timeuuid::from_millis_floor(millis), None);
    }

    let first = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([("key".to_string(), Predicate::Eq(json!("k")))]),
            limit: Some(2),
            ..GetRequest::default()
        })
        .unwrap();
    assert_eq!(first.count, 2);
    assert_eq!(first.next, Some(2));

    let second = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([("key".to_string(), Predicate::Eq(json!("k")))]),
            limit: Some(2),
            next: Some(2),
            ..GetRequest::default()
        })
        .unwrap();
    assert_eq!(second.count, 1);
    assert_eq!(second.next, Some(3));
}

// ============================================================================
// SECTION: Missing Table Tests
// ============================================================================

#[test]
fn unknown_table_reads_as_not_found_with_empty_items() {
    let fixture = fixture();
    let error = fixture
        .store
        .get(DOMAIN, GetRequest {
            table: "nowhere".to_string(),
            ..GetRequest::default()
        })
        .unwrap_err();
    assert!(matches!(error, TableError::NotFound { .. }));

    let response = Response::for_error(&error);
    assert_eq!(response.status, 404);
    let body = response.body.unwrap();
    assert_eq!(body.get("items"), Some(&json!([])));
}

#[test]
fn missing_physical_table_reads_as_empty() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    {
        let connection = rusqlite::Connection::open(&fixture.path).unwrap();
        connection.execute_batch("DROP TABLE [test.host_simple_data]").unwrap();
    }
    let result = get_by_key(&fixture.store, "k");
    assert_eq!(result.count, 0);
    assert!(result.items.is_empty());
}

// ============================================================================
// SECTION: Lifecycle Tests
// ============================================================================

#[test]
fn get_table_schema_returns_the_stored_schema_with_etag() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let record = fixture.store.get_table_schema(DOMAIN, "simple").unwrap();
    assert_eq!(record.schema.table, "simple");
    assert!(record.schema.attributes.contains_key("_exist_until"));
    let tid = record.tid.clone().expect("etag tid");
    assert_eq!(tid.len(), 36);

    let response = Response::for_schema(serde_json::to_value(&record.schema).unwrap(), record.tid);
    assert!(response.headers.contains_key("etag"));
}

#[test]
fn drop_table_is_idempotent() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    fixture.store.drop_table(DOMAIN, "simple").unwrap();
    fixture.store.drop_table(DOMAIN, "simple").unwrap();
    assert!(matches!(
        fixture.store.get_table_schema(DOMAIN, "simple"),
        Err(TableError::NotFound { .. })
    ));
}

#[test]
fn delete_removes_the_row() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let tid = timeuuid::from_millis_floor(1_000);
    put_row(&fixture.store, "k", &tid, Some("doomed"));
    fixture
        .store
        .delete(DOMAIN, DeleteRequest {
            table: "simple".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), Predicate::Eq(json!("k"))),
                ("tid".to_string(), Predicate::Eq(json!(tid))),
            ]),
        })
        .unwrap();
    assert_eq!(get_by_key(&fixture.store, "k").count, 0);
}

// ============================================================================
// SECTION: Concurrency Tests
// ============================================================================

#[test]
fn overlapping_puts_to_one_primary_key_both_succeed() {
    let fixture = fixture();
    fixture.store.create_table(DOMAIN, simple_schema()).unwrap();
    let store = std::sync::Arc::new(fixture.store);
    let tid = timeuuid::from_millis_floor(1_000);

    let mut handles = Vec::new();
    for body in ["left", "right"] {
        let store = std::sync::Arc::clone(&store);
        let tid = tid.clone();
        handles.push(std::thread::spawn(move || {
            let mut attributes = BTreeMap::new();
            attributes.insert("key".to_string(), json!("k"));
            attributes.insert("tid".to_string(), json!(tid));
            attributes.insert("body".to_string(), json!(body));
            store.put(DOMAIN, PutRequest {
                table: "simple".to_string(),
                attributes,
                condition: None,
            })
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let result = get_by_key(&store, "k");
    assert_eq!(result.count, 1);
    let body = result.items[0].get("body").and_then(Value::as_str).unwrap();
    assert!(body == "left" || body == "right");
}
