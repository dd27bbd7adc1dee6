// crates/trestle-core/src/core/mod.rs
// ============================================================================
// Module: Core Model
// Description: Schema model, codecs, envelope, and error taxonomy.
// Purpose: Group the backend-agnostic building blocks of the engine.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! The core model covers everything a storage backend needs short of SQL:
//! declared types and index elements, schema validation and derived
//! schema-info, per-type value codecs, sortable time identifiers, canonical
//! hashing, the request/response envelope, and the error taxonomy.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod hashing;
pub mod info;
pub mod schema;
pub mod timeuuid;
pub mod types;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codec::CodecError;
pub use codec::SqlScalar;
pub use codec::read_value;
pub use codec::write_value;
pub use envelope::DeleteRequest;
pub use envelope::GetRequest;
pub use envelope::Predicate;
pub use envelope::Projection;
pub use envelope::PutCondition;
pub use envelope::PutRequest;
pub use envelope::Response;
pub use envelope::ResultSet;
pub use errors::TableError;
pub use info::DOMAIN_ATTRIBUTE;
pub use info::EXIST_UNTIL_ATTRIBUTE;
pub use info::InfoError;
pub use info::SchemaInfo;
pub use info::SecondaryIndexInfo;
pub use info::TID_ATTRIBUTE;
pub use info::TTL_ATTRIBUTE;
pub use schema::Durability;
pub use schema::RetentionPolicy;
pub use schema::SchemaError;
pub use schema::TableOptions;
pub use schema::TableSchema;
pub use types::AttributeType;
pub use types::IndexElement;
pub use types::IndexKind;
pub use types::SortOrder;
