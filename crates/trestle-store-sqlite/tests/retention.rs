// crates/trestle-store-sqlite/tests/retention.rs
// ============================================================================
// Module: Revision Retention Tests
// Description: Validate latest, latest_hash, and interval policies.
// Purpose: Ensure superseded revisions are tombstoned or purged after puts.
// ============================================================================

//! Conformance tests for the retention engine: live-revision upper bounds
//! under `latest`, physical deletion under `latest_hash`, and per-bucket
//! retention under `interval`.

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
use trestle_core::GetRequest;
use trestle_core::Predicate;
use trestle_core::PutRequest;
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

fn retained_schema(policy: Value) -> TableSchema {
    serde_json::from_value(json!({
        "table": "retained",
        "attributes": {
            "key": "string",
            "tid": "timeuuid",
            "body": "blob"
        },
        "index": [
            {"attribute": "key", "type": "hash"},
            {"attribute": "tid", "type": "range", "order": "desc"}
        ],
        "revisionRetentionPolicy": policy
    }))
    .expect("schema json")
}

fn put_revision(store: &SqliteTableStore, key: &str, millis: i64) {
    store
        .put(DOMAIN, PutRequest {
            table: "retained".to_string(),
            attributes: BTreeMap::from([
                ("key".to_string(), json!(key)),
                ("tid".to_string(), json!(timeuuid::from_millis_floor(millis))),
                ("body".to_string(), json!(format!("rev-{millis}"))),
            ]),
            condition: None,
        })
        .expect("put");
}

fn live_revisions(store: &SqliteTableStore, key: &str) -> Vec<String> {
    store
        .get(DOMAIN, GetRequest {
            table: "retained".to_string(),
            attributes: BTreeMap::from([("key".to_string(), Predicate::Eq(json!(key)))]),
            ..GetRequest::default()
        })
        .expect("get")
        .items
        .iter()
        .filter_map(|item| item.get("tid").and_then(Value::as_str).map(ToString::to_string))
        .collect()
}

fn raw_row_count(path: &std::path::Path, clause: &str) -> i64 {
    let connection = rusqlite::Connection::open(path).expect("open raw");
    connection
        .query_row(
            &format!("SELECT COUNT(*) FROM [test.host_retained_data] {clause}"),
            [],
            |row| row.get(0),
        )
        .expect("count")
}

// ============================================================================
// SECTION: Latest Policy Tests
// ============================================================================

#[test]
fn latest_keeps_the_newest_count_revisions() {
    let fixture = fixture();
    fixture
        .store
        .create_table(
            DOMAIN,
            retained_schema(json!({"type": "latest", "count": 2, "grace_ttl": 0})),
        )
        .unwrap();
    for millis in [1_000, 2_000, 3_000, 4_000, 5_000] {
        put_revision(&fixture.store, "k", millis);
    }

    let live = live_revisions(&fixture.store, "k");
    assert_eq!(live.len(), 2);
    assert_eq!(
        live,
        vec![
            timeuuid::from_millis_floor(5_000),
            timeuuid::from_millis_floor(4_000),
        ]
    );
    // At most `count` rows stay unmarked for the group.
    assert!(raw_row_count(&fixture.path, "WHERE [_exist_until] IS NULL") <= 2);
}

#[test]
fn latest_counts_each_hash_group_separately() {
    let fixture = fixture();
    fixture
        .store
        .create_table(
            DOMAIN,
            retained_schema(json!({"type": "latest", "count": 1, "grace_ttl": 0})),
        )
        .unwrap();
    for millis in [1_000, 2_000] {
        put_revision(&fixture.store, "a", millis);
        put_revision(&fixture.store, "b", millis);
    }

    assert_eq!(live_revisions(&fixture.store, "a").len(), 1);
    assert_eq!(live_revisions(&fixture.store, "b").len(), 1);
}

#[test]
fn grace_ttl_keeps_superseded_revisions_visible_to_raw_reads() {
    let fixture = fixture();
    fixture
        .store
        .create_table(
            DOMAIN,
            retained_schema(json!({"type": "latest", "count": 1, "grace_ttl": 86_400})),
        )
        .unwrap();
    put_revision(&fixture.store, "k", 1_000);
    put_revision(&fixture.store, "k", 2_000);

    // Default reads only surface the retained revision.
    assert_eq!(live_revisions(&fixture.store, "k").len(), 1);
    // The superseded revision is tombstoned with a future deadline, not
    // purged.
    assert_eq!(raw_row_count(&fixture.path, ""), 2);
    assert_eq!(raw_row_count(&fixture.path, "WHERE [_exist_until] IS NOT NULL"), 1);
}

// ============================================================================
// SECTION: Latest-Hash Policy Tests
// ============================================================================

#[test]
fn latest_hash_physically_deletes_superseded_revisions() {
    let fixture = fixture();
    fixture
        .store
        .create_table(
            DOMAIN,
            retained_schema(json!({"type": "latest_hash", "count": 1, "grace_ttl": 0})),
        )
        .unwrap();
    for millis in [1_000, 2_000, 3_000] {
        put_revision(&fixture.store, "k", millis);
    }

    assert_eq!(live_revisions(&fixture.store, "k").len(), 1);
    assert_eq!(raw_row_count(&fixture.path, ""), 1);
}

// ============================================================================
// SECTION: Interval Policy Tests
// ============================================================================

#[test]
fn interval_retains_per_bucket() {
    let fixture = fixture();
    fixture
        .store
        .create_table(
            DOMAIN,
            retained_schema(
                json!({"type": "interval", "count": 1, "grace_ttl": 0, "interval": 10}),
            ),
        )
        .unwrap();
    // Two revisions in the first 10s bucket, one in the next.
    put_revision(&fixture.store, "k", 1_000);
    put_revision(&fixture.store, "k", 2_000);
    put_revision(&fixture.store, "k", 12_000);

    let live = live_revisions(&fixture.store, "k");
    assert_eq!(live, vec![
        timeuuid::from_millis_floor(12_000),
        timeuuid::from_millis_floor(2_000),
    ]);
}
