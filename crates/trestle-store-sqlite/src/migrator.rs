// crates/trestle-store-sqlite/src/migrator.rs
// ============================================================================
// Module: Schema Migrator
// Description: Validates schema diffs and executes additive migrations.
// Purpose: Allow only changes SQLite can perform in place and keep
//          migrations idempotent.
// Dependencies: crate::{client, sql}, trestle-core
// ============================================================================

//! ## Overview
//! SQLite can add columns in place but cannot drop them, change their type,
//! or change an existing column's index role. The migrator diffs two derived
//! schema-infos along four axes (table name, attributes, index, version) and
//! either produces an additive action list or rejects the diff before any
//! DDL is issued. Dropped attributes are tolerated logically (they simply
//! leave the default projection); static flag changes materialize the
//! missing column on the other physical table. A duplicate-column error from
//! the engine is swallowed so replayed migrations stay idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use trestle_core::IndexElement;
use trestle_core::SchemaInfo;
use trestle_core::TableError;

use crate::client::SqliteClient;
use crate::client::Statement;
use crate::client::StoreError;
use crate::sql;

// ============================================================================
// SECTION: Actions
// ============================================================================

/// One additive migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MigrationAction {
    /// Add a column to the data table.
    AddDataColumn(String),
    /// Add a column to the static sidecar.
    AddStaticColumn(String),
    /// Materialize the static sidecar for a table that lacked one.
    CreateStaticSidecar,
}

// ============================================================================
// SECTION: Migrator
// ============================================================================

/// Validated additive migration between two schema versions.
pub struct SchemaMigrator<'a> {
    /// Proposed schema-info the migration converges on.
    proposed: &'a SchemaInfo,
    /// Additive actions to execute, in order.
    actions: Vec<MigrationAction>,
}

impl<'a> SchemaMigrator<'a> {
    /// Diffs two schema-infos and validates that the diff is additive.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::BadRequest`] before any DDL is issued when the
    /// diff renames the table, does not increase the version, changes an
    /// attribute type, alters hash/range keys, changes an existing column's
    /// index role beyond static additions/removals, or touches secondary
    /// indexes.
    pub fn new(current: &SchemaInfo, proposed: &'a SchemaInfo) -> Result<Self, TableError> {
        if current.schema.table != proposed.schema.table {
            return Err(TableError::bad_request(format!(
                "unsupported migration: cannot rename table {} to {}",
                current.schema.table, proposed.schema.table
            )));
        }
        if proposed.schema.version <= current.schema.version {
            return Err(TableError::bad_request(format!(
                "unsupported migration: version must increase ({} -> {})",
                current.schema.version, proposed.schema.version
            )));
        }

        let current_keys: Vec<&IndexElement> =
            current.schema.index.iter().filter(|element| element.is_key()).collect();
        let proposed_keys: Vec<&IndexElement> =
            proposed.schema.index.iter().filter(|element| element.is_key()).collect();
        if current_keys != proposed_keys {
            return Err(TableError::bad_request(
                "unsupported migration: hash and range keys cannot change".to_string(),
            ));
        }

        if current.schema.secondary_indexes != proposed.schema.secondary_indexes {
            return Err(TableError::bad_request(
                "unsupported migration: secondary indexes cannot change after creation"
                    .to_string(),
            ));
        }

        for (name, declared) in &current.schema.attributes {
            if let Some(proposed_type) = proposed.schema.attributes.get(name)
                && proposed_type != declared
            {
                return Err(TableError::bad_request(format!(
                    "unsupported migration: cannot change type of attribute {name} \
                     ({declared} -> {proposed_type})"
                )));
            }
        }

        let current_statics: BTreeSet<&str> = current
            .schema
            .static_attributes()
            .iter()
            .map(|element| element.attribute.as_str())
            .collect();
        let proposed_statics: BTreeSet<&str> = proposed
            .schema
            .static_attributes()
            .iter()
            .map(|element| element.attribute.as_str())
            .collect();

        let mut actions = Vec::new();
        // A freshly created sidecar already carries every proposed static
        // column, so per-column static adds only apply to an existing one.
        let creating_sidecar = current_statics.is_empty() && !proposed_statics.is_empty();
        if creating_sidecar {
            actions.push(MigrationAction::CreateStaticSidecar);
        }

        // New attributes land on the physical table their index role picks.
        for name in proposed.schema.attributes.keys() {
            if current.schema.attributes.contains_key(name) {
                continue;
            }
            if proposed_statics.contains(name.as_str()) {
                if !creating_sidecar {
                    actions.push(MigrationAction::AddStaticColumn(name.clone()));
                }
            } else {
                actions.push(MigrationAction::AddDataColumn(name.clone()));
            }
        }

        // Static flag changes on existing attributes materialize the column
        // on the other table; the stale column is tolerated.
        for name in proposed_statics.difference(&current_statics) {
            if current.schema.attributes.contains_key(*name) && !creating_sidecar {
                actions.push(MigrationAction::AddStaticColumn((*name).to_string()));
            }
        }
        for name in current_statics.difference(&proposed_statics) {
            if proposed.schema.attributes.contains_key(*name) {
                actions.push(MigrationAction::AddDataColumn((*name).to_string()));
            }
        }

        Ok(Self { proposed, actions })
    }

    /// Executes the additive actions one statement at a time.
    ///
    /// A duplicate-column failure is swallowed so a replayed migration
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Engine`] for any other engine failure.
    pub fn execute(&self, client: &SqliteClient, physical: &str) -> Result<(), TableError> {
        for action in &self.actions {
            let statement = match action {
                MigrationAction::AddDataColumn(name) => Statement::bare(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    sql::data_table(physical),
                    column_def(self.proposed, name)
                )),
                MigrationAction::AddStaticColumn(name) => Statement::bare(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    sql::static_table(physical),
                    column_def(self.proposed, name)
                )),
                MigrationAction::CreateStaticSidecar => {
                    Statement::bare(sql::build_static_ddl(self.proposed, physical))
                }
            };
            match client.run(std::slice::from_ref(&statement)) {
                Ok(()) => {}
                Err(StoreError::Db(message)) if message.contains("duplicate column") => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Renders one column definition from the proposed schema.
fn column_def(info: &SchemaInfo, name: &str) -> String {
    let physical_type = info
        .column_type(name)
        .map_or("blob", trestle_core::AttributeType::physical_type);
    format!("[{name}] {physical_type}")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
