// crates/trestle-core/src/interfaces/mod.rs
// ============================================================================
// Module: Storage Interfaces
// Description: Operation contract implemented by storage backends.
// Purpose: Keep the logical table model backend-agnostic.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A backend exposes six operations scoped by a logical domain: table
//! lifecycle (`create_table`, `drop_table`, `get_table_schema`) and data
//! access (`get`, `put`, `delete`). All state flows through the backend
//! handle; implementations may cache derived schema-info internally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::envelope::DeleteRequest;
use crate::core::envelope::GetRequest;
use crate::core::envelope::PutRequest;
use crate::core::envelope::ResultSet;
use crate::core::errors::TableError;
use crate::core::schema::TableSchema;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of a `create_table` call. All variants answer 201.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStatus {
    /// Physical tables were materialized.
    Created,
    /// An identical schema was already registered.
    Unchanged,
    /// An additive migration was executed in place.
    Migrated,
}

/// Registered schema with its stored version identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRecord {
    /// The registered schema as stored.
    pub schema: TableSchema,
    /// Versioning identifier of the meta row, used as an etag.
    pub tid: Option<String>,
}

// ============================================================================
// SECTION: Table Store
// ============================================================================

/// Operations a logical table storage backend must provide.
pub trait TableStore {
    /// Registers a schema and materializes or migrates its physical tables.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::BadRequest`] for invalid schemas or unsupported
    /// migrations, [`TableError::Engine`] for backend failures.
    fn create_table(&self, domain: &str, schema: TableSchema)
    -> Result<CreateStatus, TableError>;

    /// Drops a logical table and its meta row. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Engine`] for backend failures.
    fn drop_table(&self, domain: &str, table: &str) -> Result<(), TableError>;

    /// Returns the registered schema for a logical table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] when no schema is registered.
    fn get_table_schema(&self, domain: &str, table: &str) -> Result<SchemaRecord, TableError>;

    /// Reads rows matching the request predicates.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] when no schema is registered,
    /// [`TableError::BadRequest`] for invalid predicates or ordering.
    fn get(&self, domain: &str, request: GetRequest) -> Result<ResultSet, TableError>;

    /// Writes a row, applying conditions, TTLs, and retention policies.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] when no schema is registered,
    /// [`TableError::BadRequest`] for values that fail validation.
    fn put(&self, domain: &str, request: PutRequest) -> Result<(), TableError>;

    /// Hard-deletes rows matching the request predicates.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::NotFound`] when no schema is registered.
    fn delete(&self, domain: &str, request: DeleteRequest) -> Result<(), TableError>;
}
