// crates/trestle-store-sqlite/src/lib.rs
// ============================================================================
// Module: Trestle SQLite Store
// Description: SQLite-backed engine for Trestle logical tables.
// Purpose: Compile logical requests to SQL and execute them against a
//          file-backed database.
// Dependencies: rusqlite, trestle-core
// ============================================================================

//! ## Overview
//! This crate implements the [`trestle_core::TableStore`] contract over
//! SQLite: physical-table materialization, a query compiler with a
//! compiled-statement LRU, a serialized writer with jittered busy-retry,
//! revision retention, and additive in-place schema migration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod config;
pub mod migrator;
pub mod retention;
pub mod sql;
pub mod statement_cache;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::SqliteClient;
pub use client::Statement;
pub use client::StoreError;
pub use config::EngineConfig;
pub use config::StorageGroup;
pub use migrator::SchemaMigrator;
pub use sql::CompiledPut;
pub use sql::CompiledRead;
pub use sql::TombstoneGate;
pub use statement_cache::STATEMENT_CACHE_CAPACITY;
pub use statement_cache::StatementCache;
pub use store::SqliteTableStore;
