// crates/trestle-store-sqlite/src/retention.rs
// ============================================================================
// Module: Revision Retention Engine
// Description: Post-write enforcement of revision retention policies.
// Purpose: Tombstone or physically delete superseded revisions and amortize
//          the hard purge of expired rows.
// Dependencies: crate::{sql, store}, serde_json, trestle-core
// ============================================================================

//! ## Overview
//! After a write commits, the policy engine re-reads the written hash-key
//! group ordered by descending version identifier. Under `latest`, rows past
//! `count` get their soft-delete deadline set to `now + grace_ttl`; under
//! `latest_hash` the superseded rows are physically deleted; under
//! `interval` only revisions inside the written revision's time bucket are
//! considered. Every retention pass appends the expired-row purge so hard
//! deletion is amortized across writes. Retention is best effort: the caller
//! swallows and logs its failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;
use trestle_core::GetRequest;
use trestle_core::Predicate;
use trestle_core::Projection;
use trestle_core::RetentionPolicy;
use trestle_core::SchemaInfo;
use trestle_core::TableError;
use trestle_core::core::timeuuid;
use trestle_core::write_value;

use crate::sql;
use crate::sql::CompiledPut;
use crate::store::SqliteTableStore;
use crate::store::now_ms;

// ============================================================================
// SECTION: Policy Application
// ============================================================================

impl SqliteTableStore {
    /// Applies the table's retention policy for a just-committed write.
    pub(crate) fn apply_retention(
        &self,
        physical: &str,
        info: &SchemaInfo,
        written: &CompiledPut,
    ) -> Result<(), TableError> {
        match info.schema.revision_retention_policy {
            RetentionPolicy::All => Ok(()),
            RetentionPolicy::Latest { count, grace_ttl } => {
                self.retain_window(physical, info, written, count, grace_ttl, None, false)
            }
            RetentionPolicy::LatestHash { count, grace_ttl } => {
                self.retain_window(physical, info, written, count, grace_ttl, None, true)
            }
            RetentionPolicy::Interval {
                count,
                grace_ttl,
                interval,
            } => {
                let width = i64::try_from(interval).unwrap_or(i64::MAX).saturating_mul(1_000);
                let lower = written.timestamp_ms - written.timestamp_ms.rem_euclid(width);
                let upper = lower.saturating_add(width);
                self.retain_window(
                    physical,
                    info,
                    written,
                    count,
                    grace_ttl,
                    Some((lower, upper)),
                    false,
                )
            }
        }
    }

    /// Retains the newest `count` live revisions of the written hash-key
    /// group (restricted to a time bucket when given); the remainder are
    /// tombstoned, or hard-deleted when `hard` is set.
    fn retain_window(
        &self,
        physical: &str,
        info: &SchemaInfo,
        written: &CompiledPut,
        count: u32,
        grace_ttl: u64,
        bucket: Option<(i64, i64)>,
        hard: bool,
    ) -> Result<(), TableError> {
        let mut predicates = BTreeMap::new();
        for key in info.hash_keys() {
            let value = written.attributes.get(key).cloned().unwrap_or(Value::Null);
            predicates.insert(key.to_string(), Predicate::Eq(value));
        }
        if let Some((lower, upper)) = bucket {
            predicates.insert(
                info.tid.clone(),
                Predicate::Between(
                    json!(timeuuid::from_millis_floor(lower)),
                    json!(timeuuid::from_millis_floor(upper)),
                ),
            );
        }
        let request = GetRequest {
            table: info.schema.table.clone(),
            attributes: predicates,
            proj: Some(Projection::Columns(info.i_keys.clone())),
            // The versioning key is always a descending range key.
            order: BTreeMap::from([(info.tid.clone(), trestle_core::SortOrder::Desc)]),
            ..GetRequest::default()
        };
        let result = self.read(physical, &request, info)?;

        let now = now_ms();
        let deadline =
            now.saturating_add(i64::try_from(grace_ttl).unwrap_or(i64::MAX).saturating_mul(1_000));
        let mut statements = Vec::new();
        for item in result.items.iter().skip(count as usize) {
            let mut key_values = Vec::with_capacity(info.i_keys.len());
            for key in &info.i_keys {
                let Some(declared) = info.column_type(key) else {
                    continue;
                };
                let value = item.get(key).cloned().unwrap_or(Value::Null);
                key_values.push(write_value(declared, &value)?);
            }
            statements.push(if hard {
                sql::build_delete_older(info, physical, &key_values)
            } else {
                sql::build_tombstone(info, physical, &key_values, deadline)
            });
        }
        if statements.is_empty() {
            return Ok(());
        }
        statements.push(sql::build_delete_expired(physical, now));
        self.run(&statements)
    }
}
