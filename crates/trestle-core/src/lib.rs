// crates/trestle-core/src/lib.rs
// ============================================================================
// Module: Trestle Core Library
// Description: Public API surface for the Trestle table storage model.
// Purpose: Expose the schema model, codecs, envelope, and backend contract.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Trestle layers a schema-driven, wide-column table model (hash keys, range
//! keys, static columns, secondary indexes, timeuuid versioning, revision
//! retention) over flat relational storage. This crate holds everything
//! backend-agnostic; concrete engines implement [`TableStore`] against it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CreateStatus;
pub use interfaces::SchemaRecord;
pub use interfaces::TableStore;
