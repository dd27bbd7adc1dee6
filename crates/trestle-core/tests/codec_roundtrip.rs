// crates/trestle-core/tests/codec_roundtrip.rs
// ============================================================================
// Module: Codec Round-Trip Tests
// Description: Validate read/write conversion for every declared type.
// Purpose: Ensure round-trips hold modulo documented canonicalizations.
// ============================================================================

//! Conformance tests for the value codecs: round-trips per declared type,
//! the timeuuid rewrite, set canonicalization, and rejection of malformed
//! values.

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

use serde_json::json;
use trestle_core::AttributeType;
use trestle_core::SqlScalar;
use trestle_core::core::timeuuid;
use trestle_core::read_value;
use trestle_core::write_value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn round_trip(declared: &AttributeType, value: serde_json::Value) -> serde_json::Value {
    let written = write_value(declared, &value).expect("write");
    read_value(declared, &written).expect("read")
}

// ============================================================================
// SECTION: Scalar Round-Trips
// ============================================================================

#[test]
fn scalars_round_trip() {
    assert_eq!(round_trip(&AttributeType::String, json!("text")), json!("text"));
    assert_eq!(round_trip(&AttributeType::Int, json!(-42)), json!(-42));
    assert_eq!(round_trip(&AttributeType::Varint, json!(1i64 << 40)), json!(1i64 << 40));
    assert_eq!(round_trip(&AttributeType::Double, json!(1.25)), json!(1.25));
    assert_eq!(round_trip(&AttributeType::Boolean, json!(false)), json!(false));
    assert_eq!(round_trip(&AttributeType::Timestamp, json!(1_234_567)), json!(1_234_567));
    assert_eq!(round_trip(&AttributeType::Blob, json!("hello")), json!("hello"));
}

#[test]
fn null_round_trips_for_every_type() {
    for declared in [
        AttributeType::String,
        AttributeType::Blob,
        AttributeType::Boolean,
        AttributeType::Int,
        AttributeType::Decimal,
        AttributeType::Timestamp,
        AttributeType::Timeuuid,
        AttributeType::Uuid,
        AttributeType::Json,
        AttributeType::Set(Box::new(AttributeType::String)),
    ] {
        assert_eq!(round_trip(&declared, json!(null)), json!(null));
    }
}

#[test]
fn json_documents_round_trip_through_blobs() {
    let document = json!({"nested": {"list": [1, 2, 3]}, "flag": true});
    let written = write_value(&AttributeType::Json, &document).unwrap();
    assert!(matches!(written, SqlScalar::Blob(_)));
    assert_eq!(read_value(&AttributeType::Json, &written).unwrap(), document);
}

#[test]
fn uuid_text_is_canonicalized() {
    let value = json!("C56A4180-65AA-42EC-A945-5FD21DEC0538");
    let written = write_value(&AttributeType::Uuid, &value).unwrap();
    assert_eq!(
        written,
        SqlScalar::Text("c56a4180-65aa-42ec-a945-5fd21dec0538".to_string())
    );
}

#[test]
fn malformed_uuid_is_rejected() {
    assert!(write_value(&AttributeType::Uuid, &json!("not-a-uuid")).is_err());
}

// ============================================================================
// SECTION: Timeuuid Tests
// ============================================================================

#[test]
fn timeuuid_round_trips_through_the_sorted_form() {
    let tid = timeuuid::mint();
    let written = write_value(&AttributeType::Timeuuid, &json!(tid.clone())).unwrap();
    let SqlScalar::Text(sorted) = &written else {
        panic!("expected text storage");
    };
    assert_ne!(sorted, &tid);
    assert_eq!(read_value(&AttributeType::Timeuuid, &written).unwrap(), json!(tid));
}

#[test]
fn sorted_forms_compare_in_time_order() {
    let older = timeuuid::from_millis_floor(10_000);
    let newer = timeuuid::from_millis_floor(20_000);
    let written_older = write_value(&AttributeType::Timeuuid, &json!(older)).unwrap();
    let written_newer = write_value(&AttributeType::Timeuuid, &json!(newer)).unwrap();
    let (SqlScalar::Text(older_text), SqlScalar::Text(newer_text)) =
        (&written_older, &written_newer)
    else {
        panic!("expected text storage");
    };
    assert!(older_text < newer_text);
}

#[test]
fn malformed_timeuuid_is_rejected() {
    assert!(write_value(&AttributeType::Timeuuid, &json!("whatever")).is_err());
}

// ============================================================================
// SECTION: Set Tests
// ============================================================================

#[test]
fn string_sets_sort_lexicographically() {
    let declared = AttributeType::Set(Box::new(AttributeType::String));
    assert_eq!(
        round_trip(&declared, json!(["pear", "apple", "pear", "banana"])),
        json!(["apple", "banana", "pear"])
    );
}

#[test]
fn timeuuid_sets_round_trip_elements() {
    let declared = AttributeType::Set(Box::new(AttributeType::Timeuuid));
    let older = timeuuid::from_millis_floor(10_000);
    let newer = timeuuid::from_millis_floor(20_000);
    let result = round_trip(&declared, json!([newer.clone(), older.clone()]));
    assert_eq!(result, json!([older, newer]));
}

#[test]
fn empty_and_null_sets_are_equivalent() {
    let declared = AttributeType::Set(Box::new(AttributeType::Int));
    assert_eq!(write_value(&declared, &json!([])).unwrap(), SqlScalar::Null);
    assert_eq!(write_value(&declared, &json!(null)).unwrap(), SqlScalar::Null);
}
