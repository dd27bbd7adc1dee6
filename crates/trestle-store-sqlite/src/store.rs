// crates/trestle-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Table Store
// Description: Table lifecycle and read/write API over the SQLite client.
// Purpose: Resolve schemas, compile requests, execute them, and convert
//          results; bootstrap and maintain the schema meta table.
// Dependencies: crate::{client, config, migrator, sql, statement_cache},
//               rusqlite, serde_json, tracing, trestle-core
// ============================================================================

//! ## Overview
//! The store resolves each request's schema-info (per-process cache, falling
//! back to the `global_schema` meta table), compiles it through the query
//! compiler and statement cache, executes against the client, and converts
//! result rows back through the attribute codecs. The meta table is itself a
//! built-in logical table routed through the same machinery, which is why
//! schema reads carry a version identifier usable as an etag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use serde_json::json;
use tracing::warn;
use trestle_core::AttributeType;
use trestle_core::CreateStatus;
use trestle_core::DOMAIN_ATTRIBUTE;
use trestle_core::DeleteRequest;
use trestle_core::EXIST_UNTIL_ATTRIBUTE;
use trestle_core::GetRequest;
use trestle_core::IndexElement;
use trestle_core::Predicate;
use trestle_core::PutRequest;
use trestle_core::ResultSet;
use trestle_core::RetentionPolicy;
use trestle_core::SchemaInfo;
use trestle_core::SchemaRecord;
use trestle_core::SortOrder;
use trestle_core::SqlScalar;
use trestle_core::TableError;
use trestle_core::TableSchema;
use trestle_core::TableStore;
use trestle_core::read_value;

use crate::client::SqliteClient;
use crate::client::Statement;
use crate::client::StoreError;
use crate::config::EngineConfig;
use crate::migrator::SchemaMigrator;
use crate::sql;
use crate::sql::TombstoneGate;
use crate::statement_cache::STATEMENT_CACHE_CAPACITY;
use crate::statement_cache::StatementCache;
use crate::statement_cache::request_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Engine layout version stamped into `PRAGMA user_version` at bootstrap.
const ENGINE_LAYOUT_VERSION: i64 = 1;
/// Physical name of the schema meta table.
const META_PHYSICAL: &str = "global_schema";

/// Built-in schema describing the meta table. Constructed once at engine
/// construction and never mutated afterwards.
fn meta_schema() -> TableSchema {
    let mut attributes = BTreeMap::new();
    attributes.insert("table".to_string(), AttributeType::String);
    attributes.insert("value".to_string(), AttributeType::Json);
    attributes.insert("tid".to_string(), AttributeType::Timeuuid);
    TableSchema {
        table: META_PHYSICAL.to_string(),
        attributes,
        index: vec![
            IndexElement::hash("table"),
            IndexElement::range("tid", SortOrder::Desc),
        ],
        secondary_indexes: BTreeMap::new(),
        revision_retention_policy: RetentionPolicy::All,
        version: 1,
        options: trestle_core::TableOptions::default(),
    }
}

/// Returns the current wall clock in unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed logical table store.
pub struct SqliteTableStore {
    /// Engine configuration.
    config: EngineConfig,
    /// Connection wrapper.
    client: SqliteClient,
    /// Compiled-statement LRU.
    statements: Mutex<StatementCache>,
    /// Per-process schema-info cache keyed by physical table name.
    schemas: Mutex<HashMap<String, Arc<SchemaInfo>>>,
    /// Built-in meta schema-info.
    meta: Arc<SchemaInfo>,
}

impl SqliteTableStore {
    /// Opens the store and bootstraps the meta table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the configuration is invalid, the
    /// database cannot be opened, or the layout version is unsupported.
    pub fn open(config: EngineConfig) -> Result<Self, TableError> {
        config.validate().map_err(TableError::from)?;
        let client = SqliteClient::open(&config).map_err(TableError::from)?;
        let meta = Arc::new(SchemaInfo::derive(meta_schema())?);
        let store = Self {
            config,
            client,
            statements: Mutex::new(StatementCache::new(STATEMENT_CACHE_CAPACITY)),
            schemas: Mutex::new(HashMap::new()),
            meta,
        };
        store.bootstrap()?;
        Ok(store)
    }

    /// Verifies both connections are usable.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Engine`] when either connection fails.
    pub fn check_connection(&self) -> Result<(), TableError> {
        self.client.check_connection().map_err(TableError::from)
    }

    /// Creates the meta table on first start and stamps the layout version.
    fn bootstrap(&self) -> Result<(), TableError> {
        let rows = self.client.all("PRAGMA user_version", &[]).map_err(TableError::from)?;
        let version = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|value| match value {
                SqlScalar::Integer(version) => Some(*version),
                _ => None,
            })
            .unwrap_or(0);
        match version {
            0 => {
                let mut statements = sql::build_table_ddl(&self.meta, META_PHYSICAL);
                statements.push(Statement::bare(format!(
                    "PRAGMA user_version = {ENGINE_LAYOUT_VERSION}"
                )));
                self.client.run(&statements).map_err(TableError::from)
            }
            ENGINE_LAYOUT_VERSION => Ok(()),
            other => Err(TableError::engine(format!(
                "unsupported engine layout version: {other}"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Schema resolution
    // ------------------------------------------------------------------

    /// Resolves schema-info from the cache, falling back to the meta table.
    fn schema_info(&self, physical: &str) -> Result<Option<Arc<SchemaInfo>>, TableError> {
        {
            let cache = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(info) = cache.get(physical) {
                return Ok(Some(Arc::clone(info)));
            }
        }
        let Some((schema, _tid)) = self.load_schema_record(physical)? else {
            return Ok(None);
        };
        let info = Arc::new(SchemaInfo::derive(schema)?);
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(physical.to_string(), Arc::clone(&info));
        Ok(Some(info))
    }

    /// Loads the newest meta row for a physical table.
    fn load_schema_record(
        &self,
        physical: &str,
    ) -> Result<Option<(TableSchema, Option<String>)>, TableError> {
        let request = GetRequest {
            table: META_PHYSICAL.to_string(),
            attributes: BTreeMap::from([(
                "table".to_string(),
                Predicate::Eq(json!(physical)),
            )]),
            limit: Some(1),
            ..GetRequest::default()
        };
        let result = self.read(META_PHYSICAL, &request, &self.meta)?;
        let Some(item) = result.items.into_iter().next() else {
            return Ok(None);
        };
        let value = item.get("value").cloned().unwrap_or(Value::Null);
        let schema: TableSchema = serde_json::from_value(value)
            .map_err(|err| TableError::engine(format!("corrupt stored schema: {err}")))?;
        let tid = item.get("tid").and_then(Value::as_str).map(ToString::to_string);
        Ok(Some((schema, tid)))
    }

    /// Compiles the meta-row write registering a schema.
    fn meta_put_statements(
        &self,
        physical: &str,
        info: &SchemaInfo,
    ) -> Result<Vec<Statement>, TableError> {
        let value = serde_json::to_value(&info.schema)
            .map_err(|err| TableError::engine(err.to_string()))?;
        let request = PutRequest {
            table: META_PHYSICAL.to_string(),
            attributes: BTreeMap::from([
                ("table".to_string(), json!(physical)),
                ("value".to_string(), value),
            ]),
            condition: None,
        };
        let compiled = sql::build_put(&request, META_PHYSICAL, &self.meta, false, now_ms())?;
        Ok(compiled.statements)
    }

    /// Drops a table's cache entries and flushes prepared statements.
    fn invalidate(&self, physical: &str) {
        self.schemas.lock().unwrap_or_else(PoisonError::into_inner).remove(physical);
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate_prefix(&format!("{physical}:"));
        self.client.flush_statements();
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Compiles (through the statement cache), executes, and converts a
    /// read. A missing physical table reads as empty.
    pub(crate) fn read(
        &self,
        physical: &str,
        request: &GetRequest,
        info: &SchemaInfo,
    ) -> Result<ResultSet, TableError> {
        let key = request_key(physical, request);
        let compiled = {
            let mut cache = self.statements.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&key) {
                Some(compiled) => compiled,
                None => {
                    let compiled = sql::build_get(physical, request, info, TombstoneGate::Hide)?;
                    cache.insert(key, compiled.clone());
                    compiled
                }
            }
        };

        let mut params = compiled.params.clone();
        if let Some(index) = compiled.now_index
            && let Some(slot) = params.get_mut(index)
        {
            *slot = SqlScalar::Integer(now_ms());
        }

        let rows = match self.client.all(&compiled.sql, &params) {
            Ok(rows) => rows,
            Err(StoreError::MissingTable(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let mut item = serde_json::Map::new();
            for (column, scalar) in row {
                if column == EXIST_UNTIL_ATTRIBUTE || column == DOMAIN_ATTRIBUTE {
                    continue;
                }
                let Some(declared) = info.column_type(&column) else {
                    continue;
                };
                item.insert(column, read_value(declared, &scalar)?);
            }
            items.push(item);
        }

        let next = if request.next.is_some() || request.limit.is_some() {
            Some(request.next.unwrap_or(0) + items.len() as u64)
        } else {
            None
        };
        Ok(ResultSet {
            count: items.len(),
            items,
            next,
        })
    }

    /// Runs a compiled statement list on the writer.
    pub(crate) fn run(&self, statements: &[Statement]) -> Result<(), TableError> {
        self.client.run(statements).map_err(TableError::from)
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl TableStore for SqliteTableStore {
    fn create_table(
        &self,
        domain: &str,
        schema: TableSchema,
    ) -> Result<CreateStatus, TableError> {
        let physical = self.config.physical_table(domain, &schema.table);
        let proposed = Arc::new(SchemaInfo::derive(schema)?);
        match self.schema_info(&physical)? {
            None => {
                let mut statements = sql::build_table_ddl(&proposed, &physical);
                statements.extend(self.meta_put_statements(&physical, &proposed)?);
                self.run(&statements)?;
                self.schemas
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(physical, proposed);
                Ok(CreateStatus::Created)
            }
            Some(existing) if existing.hash == proposed.hash => Ok(CreateStatus::Unchanged),
            Some(existing) => {
                let migrator = SchemaMigrator::new(&existing, &proposed)?;
                migrator.execute(&self.client, &physical)?;
                self.invalidate(&physical);
                let statements = self.meta_put_statements(&physical, &proposed)?;
                self.run(&statements)?;
                self.schemas
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(physical, proposed);
                Ok(CreateStatus::Migrated)
            }
        }
    }

    fn drop_table(&self, domain: &str, table: &str) -> Result<(), TableError> {
        let physical = self.config.physical_table(domain, table);
        // Absence is success: dropping twice is idempotent.
        let Some(info) = self.schema_info(&physical)? else {
            return Ok(());
        };
        let mut statements = sql::build_drop_ddl(&info, &physical);
        let delete = DeleteRequest {
            table: META_PHYSICAL.to_string(),
            attributes: BTreeMap::from([(
                "table".to_string(),
                Predicate::Eq(json!(physical)),
            )]),
        };
        statements.push(sql::build_delete(&delete, META_PHYSICAL, &self.meta)?);
        self.run(&statements)?;
        self.invalidate(&physical);
        Ok(())
    }

    fn get_table_schema(&self, domain: &str, table: &str) -> Result<SchemaRecord, TableError> {
        let physical = self.config.physical_table(domain, table);
        let Some((schema, tid)) = self.load_schema_record(&physical)? else {
            return Err(TableError::not_found(format!(
                "no schema registered for table {table} in domain {domain}"
            )));
        };
        Ok(SchemaRecord { schema, tid })
    }

    fn get(&self, domain: &str, request: GetRequest) -> Result<ResultSet, TableError> {
        let physical = self.config.physical_table(domain, &request.table);
        let Some(info) = self.schema_info(&physical)? else {
            return Err(TableError::not_found(format!(
                "no schema registered for table {} in domain {domain}",
                request.table
            )));
        };
        self.read(&physical, &request, &info)
    }

    fn put(&self, domain: &str, request: PutRequest) -> Result<(), TableError> {
        let physical = self.config.physical_table(domain, &request.table);
        let Some(info) = self.schema_info(&physical)? else {
            return Err(TableError::not_found(format!(
                "no schema registered for table {} in domain {domain}",
                request.table
            )));
        };

        let now = now_ms();
        let compiled = sql::build_put(&request, &physical, &info, false, now)?;
        let mut statements = compiled.statements.clone();
        if let Some(statement) =
            sql::build_secondary_index_update(&compiled.attributes, &physical, &info)?
        {
            statements.push(statement);
        }
        if !matches!(info.schema.revision_retention_policy, RetentionPolicy::All) {
            statements.push(sql::build_delete_expired(&physical, now));
        }
        self.run(&statements)?;

        // Retention runs after the commit; its failure must not fail the
        // caller's write.
        if let Err(err) = self.apply_retention(&physical, &info, &compiled) {
            warn!(table = physical, error = %err, "retention pass failed");
        }
        Ok(())
    }

    fn delete(&self, domain: &str, request: DeleteRequest) -> Result<(), TableError> {
        let physical = self.config.physical_table(domain, &request.table);
        let Some(info) = self.schema_info(&physical)? else {
            return Err(TableError::not_found(format!(
                "no schema registered for table {} in domain {domain}",
                request.table
            )));
        };
        let statement = sql::build_delete(&request, &physical, &info)?;
        self.run(std::slice::from_ref(&statement))
    }
}
