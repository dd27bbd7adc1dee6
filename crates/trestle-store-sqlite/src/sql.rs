// crates/trestle-store-sqlite/src/sql.rs
// ============================================================================
// Module: Query Compiler
// Description: Compiles logical requests into parameterized SQL.
// Purpose: Translate schema-info plus get/put/delete requests into DDL,
//          SELECT, and write statements with codec-applied parameters.
// Dependencies: crate::client, serde_json, trestle-core
// ============================================================================

//! ## Overview
//! Every logical table compiles to a data table (`[N_data]`, primary key =
//! the hash/range attribute list), an optional static sidecar keyed by the
//! hash keys, and an optional secondary-index sidecar with one SQL index per
//! declared secondary index. Reads gate on the soft-delete deadline, join
//! the static sidecar when a static column is projected, and route through
//! the secondary sidecar when an index is named. Writes compile to an
//! ordered statement list executed inside one transaction. All values pass
//! through the attribute codecs on the way in and out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;
use trestle_core::EXIST_UNTIL_ATTRIBUTE;
use trestle_core::GetRequest;
use trestle_core::IndexElement;
use trestle_core::IndexKind;
use trestle_core::Predicate;
use trestle_core::Projection;
use trestle_core::PutCondition;
use trestle_core::PutRequest;
use trestle_core::SchemaInfo;
use trestle_core::SqlScalar;
use trestle_core::TTL_ATTRIBUTE;
use trestle_core::TableError;
use trestle_core::core::timeuuid;
use trestle_core::write_value;

use crate::client::Statement;

// ============================================================================
// SECTION: Physical Names
// ============================================================================

/// Quotes an identifier.
fn ident(name: &str) -> String {
    format!("[{name}]")
}

/// Physical data table name for a logical table.
#[must_use]
pub fn data_table(physical: &str) -> String {
    format!("[{physical}_data]")
}

/// Physical static sidecar name for a logical table.
#[must_use]
pub fn static_table(physical: &str) -> String {
    format!("[{physical}_static]")
}

/// Physical secondary-index sidecar name for a logical table.
#[must_use]
pub fn secondary_table(physical: &str) -> String {
    format!("[{physical}_secondaryIndex]")
}

/// Physical SQL index name for one secondary index.
#[must_use]
pub fn index_name(physical: &str, index: &str) -> String {
    format!("[{physical}_index_{index}]")
}

// ============================================================================
// SECTION: DDL
// ============================================================================

/// Emits the DDL statements materializing a logical table.
#[must_use]
pub fn build_table_ddl(info: &SchemaInfo, physical: &str) -> Vec<Statement> {
    let mut statements = Vec::new();

    let mut columns: Vec<String> = info
        .data_columns()
        .iter()
        .map(|name| column_def(info, name))
        .collect();
    columns.push(format!(
        "PRIMARY KEY ({})",
        info.i_keys.iter().map(|key| ident(key)).collect::<Vec<_>>().join(", ")
    ));
    statements.push(Statement::bare(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        data_table(physical),
        columns.join(", ")
    )));

    if info.schema.has_static_attributes() {
        statements.push(Statement::bare(build_static_ddl(info, physical)));
    }

    if !info.secondary_indexes.is_empty() {
        let mut columns: Vec<String> = info
            .secondary_table_columns()
            .iter()
            .map(|name| column_def(info, name))
            .collect();
        columns.push(format!(
            "PRIMARY KEY ({})",
            info.secondary_primary_key()
                .iter()
                .map(|key| ident(key))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        statements.push(Statement::bare(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            secondary_table(physical),
            columns.join(", ")
        )));

        for name in info.secondary_indexes.keys() {
            let declared = info
                .schema
                .secondary_indexes
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let keys: Vec<String> = declared
                .iter()
                .filter(|element| element.is_key())
                .map(|element| match element.kind {
                    IndexKind::Range => {
                        format!("{} {}", ident(&element.attribute), element.effective_order().sql())
                    }
                    _ => ident(&element.attribute),
                })
                .collect();
            statements.push(Statement::bare(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name(physical, name),
                secondary_table(physical),
                keys.join(", ")
            )));
        }
    }

    statements
}

/// Emits the static sidecar DDL.
#[must_use]
pub fn build_static_ddl(info: &SchemaInfo, physical: &str) -> String {
    let mut columns: Vec<String> =
        info.static_columns().iter().map(|name| column_def(info, name)).collect();
    columns.push(format!(
        "PRIMARY KEY ({})",
        info.hash_keys().iter().map(|key| ident(key)).collect::<Vec<_>>().join(", ")
    ));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        static_table(physical),
        columns.join(", ")
    )
}

/// Emits the statements dropping a logical table's physical objects.
#[must_use]
pub fn build_drop_ddl(info: &SchemaInfo, physical: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    for name in info.secondary_indexes.keys() {
        statements.push(Statement::bare(format!(
            "DROP INDEX IF EXISTS {}",
            index_name(physical, name)
        )));
    }
    if !info.secondary_indexes.is_empty() {
        statements
            .push(Statement::bare(format!("DROP TABLE IF EXISTS {}", secondary_table(physical))));
    }
    if info.schema.has_static_attributes() {
        statements
            .push(Statement::bare(format!("DROP TABLE IF EXISTS {}", static_table(physical))));
    }
    statements.push(Statement::bare(format!("DROP TABLE IF EXISTS {}", data_table(physical))));
    statements
}

/// Renders one column definition.
fn column_def(info: &SchemaInfo, name: &str) -> String {
    let physical_type =
        info.column_type(name).map_or("blob", trestle_core::AttributeType::physical_type);
    format!("{} {}", ident(name), physical_type)
}

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Compiles a predicate map into WHERE clauses and parameters.
///
/// When `keys` is provided, every predicate attribute must be a key of that
/// map; otherwise any declared attribute is accepted.
fn compile_predicates(
    predicates: &BTreeMap<String, Predicate>,
    info: &SchemaInfo,
    keys: Option<&BTreeMap<String, IndexElement>>,
    qualifier: &str,
    clauses: &mut Vec<String>,
    params: &mut Vec<SqlScalar>,
) -> Result<(), TableError> {
    for (attribute, predicate) in predicates {
        if let Some(key_map) = keys
            && !key_map.contains_key(attribute)
        {
            return Err(TableError::bad_request(format!(
                "predicate on non-key attribute {attribute}"
            )));
        }
        let Some(declared) = info.column_type(attribute) else {
            return Err(TableError::bad_request(format!(
                "predicate on unknown attribute {attribute}"
            )));
        };
        let column = format!("{qualifier}{}", ident(attribute));
        match predicate {
            Predicate::Eq(value) => {
                clauses.push(format!("{column} = ?"));
                params.push(write_value(declared, value)?);
            }
            Predicate::Lt(value) => {
                clauses.push(format!("{column} < ?"));
                params.push(write_value(declared, value)?);
            }
            Predicate::Gt(value) => {
                clauses.push(format!("{column} > ?"));
                params.push(write_value(declared, value)?);
            }
            Predicate::Le(value) => {
                clauses.push(format!("{column} <= ?"));
                params.push(write_value(declared, value)?);
            }
            Predicate::Ge(value) => {
                clauses.push(format!("{column} >= ?"));
                params.push(write_value(declared, value)?);
            }
            Predicate::Between(low, high) => {
                clauses.push(format!("{column} BETWEEN ? AND ?"));
                params.push(write_value(declared, low)?);
                params.push(write_value(declared, high)?);
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Soft-delete gating mode for compiled reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TombstoneGate {
    /// Skip rows whose deadline has passed (`> now OR IS NULL`).
    Hide,
    /// Require the deadline to be absent (`IS NULL` exactly).
    RequireAbsent,
}

/// Compiled read: SQL, parameter template, and the position of the
/// wall-clock gate parameter to refresh on every execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRead {
    /// SELECT text.
    pub sql: String,
    /// Parameter template in placeholder order.
    pub params: Vec<SqlScalar>,
    /// Index of the soft-delete gate's `now` parameter, if gated.
    pub now_index: Option<usize>,
}

/// Compiles a read request against a logical table.
///
/// # Errors
///
/// Returns [`TableError::BadRequest`] for unknown indexes or columns,
/// non-key predicates, and inconsistent ordering.
pub fn build_get(
    physical: &str,
    request: &GetRequest,
    info: &SchemaInfo,
    gate: TombstoneGate,
) -> Result<CompiledRead, TableError> {
    // Route through the secondary sidecar when an index is named.
    let secondary = match &request.index {
        Some(index) => Some(info.secondary_indexes.get(index).ok_or_else(|| {
            TableError::bad_request(format!("no such secondary index: {index}"))
        })?),
        None => None,
    };

    let projected: Vec<String> = match (&request.proj, secondary) {
        (None | Some(Projection::All), Some(sub)) => {
            sub.i_keys.iter().chain(sub.proj.iter()).cloned().collect()
        }
        (None | Some(Projection::All), None) => {
            info.visible_columns().iter().map(ToString::to_string).collect()
        }
        (Some(Projection::One(column)), _) => vec![column.clone()],
        (Some(Projection::Columns(columns)), _) => columns.clone(),
    };
    for column in &projected {
        if info.column_type(column).is_none() {
            return Err(TableError::bad_request(format!("projected unknown column {column}")));
        }
        if secondary.is_some() && !info.secondary_table_columns().contains(&column.as_str()) {
            return Err(TableError::bad_request(format!(
                "column {column} is not covered by the requested index"
            )));
        }
    }

    // A static column in the projection forces a join on the hash keys.
    let join_static =
        secondary.is_none() && projected.iter().any(|column| info.is_static(column));
    let qualifier = if join_static { "d." } else { "" };

    let mut select = Vec::with_capacity(projected.len());
    for column in &projected {
        if join_static && info.is_static(column) {
            select.push(format!("s.{} AS {}", ident(column), ident(column)));
        } else if join_static {
            select.push(format!("d.{} AS {}", ident(column), ident(column)));
        } else {
            select.push(ident(column));
        }
    }

    let from = match (secondary, join_static) {
        (Some(_), _) => secondary_table(physical),
        (None, false) => data_table(physical),
        (None, true) => {
            let on: Vec<String> = info
                .hash_keys()
                .iter()
                .map(|key| format!("d.{} = s.{}", ident(key), ident(key)))
                .collect();
            format!(
                "{} AS d LEFT OUTER JOIN {} AS s ON {}",
                data_table(physical),
                static_table(physical),
                on.join(" AND ")
            )
        }
    };

    let key_map = secondary.map_or(&info.i_key_map, |sub| &sub.i_key_map);
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    compile_predicates(
        &request.attributes,
        info,
        Some(key_map),
        qualifier,
        &mut clauses,
        &mut params,
    )?;

    // The secondary sidecar carries no deadline column; gating applies to
    // the data table only.
    let mut now_index = None;
    if secondary.is_none() {
        let deadline = format!("{qualifier}{}", ident(EXIST_UNTIL_ATTRIBUTE));
        match gate {
            TombstoneGate::Hide => {
                now_index = Some(params.len());
                params.push(SqlScalar::Integer(0));
                clauses.push(format!("({deadline} > ? OR {deadline} IS NULL)"));
            }
            TombstoneGate::RequireAbsent => {
                clauses.push(format!("{deadline} IS NULL"));
            }
        }
    }

    let order_by = compile_order(request, info, secondary, qualifier)?;

    let mut sql = String::from("SELECT ");
    if request.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&select.join(", "));
    sql.push_str(" FROM ");
    sql.push_str(&from);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by.join(", "));
    }
    match (request.limit, request.next) {
        (Some(limit), next) => {
            sql.push_str(" LIMIT ?");
            params.push(SqlScalar::Integer(i64::from(limit)));
            if let Some(next) = next {
                sql.push_str(" OFFSET ?");
                params.push(SqlScalar::Integer(i64::try_from(next).unwrap_or(i64::MAX)));
            }
        }
        (None, Some(next)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(SqlScalar::Integer(i64::try_from(next).unwrap_or(i64::MAX)));
        }
        (None, None) => {}
    }

    Ok(CompiledRead {
        sql,
        params,
        now_index,
    })
}

/// Validates requested ordering and renders the ORDER BY terms.
///
/// Every ordered attribute must be a range key of the read target, and the
/// requested directions must uniformly match or uniformly reverse the
/// declared orders.
fn compile_order(
    request: &GetRequest,
    info: &SchemaInfo,
    secondary: Option<&trestle_core::SecondaryIndexInfo>,
    qualifier: &str,
) -> Result<Vec<String>, TableError> {
    let range_elements: Vec<&IndexElement> = match secondary {
        Some(sub) => {
            sub.elements.iter().filter(|element| element.kind == IndexKind::Range).collect()
        }
        None => info.range_elements(),
    };

    let mut reversed: Option<bool> = None;
    for (attribute, requested) in &request.order {
        let Some(element) =
            range_elements.iter().find(|element| &element.attribute == attribute)
        else {
            return Err(TableError::bad_request(format!(
                "cannot order by non-range attribute {attribute}"
            )));
        };
        let is_reversed = *requested != element.effective_order();
        if let Some(previous) = reversed
            && previous != is_reversed
        {
            return Err(TableError::bad_request(
                "ordering must uniformly match or uniformly reverse the declared range orders"
                    .to_string(),
            ));
        }
        reversed = Some(is_reversed);
    }
    let reversed = reversed.unwrap_or(false);

    Ok(range_elements
        .iter()
        .map(|element| {
            let order = if reversed {
                element.effective_order().reversed()
            } else {
                element.effective_order()
            };
            format!("{qualifier}{} {}", ident(&element.attribute), order.sql())
        })
        .collect())
}

// ============================================================================
// SECTION: Writes
// ============================================================================

/// Compiled write: ordered statements plus the resolved version identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPut {
    /// Statements to execute in declared order inside one transaction.
    pub statements: Vec<Statement>,
    /// Canonical version identifier of the written revision.
    pub tid: String,
    /// Wall-clock milliseconds embedded in the version identifier.
    pub timestamp_ms: i64,
    /// Normalized attribute values (TTL folded into the deadline, version
    /// identifier filled in).
    pub attributes: BTreeMap<String, Value>,
}

/// Compiles a write request into its ordered statement list.
///
/// Default semantics are upsert: an UPDATE for the existing-row case plus an
/// `INSERT OR IGNORE` for the create case. `if = 'not exists'` compiles to
/// the insert alone; an `if` predicate map compiles to the conditioned
/// UPDATE alone. A supplied `_ttl` becomes the soft-delete deadline. A
/// missing version identifier is minted.
///
/// # Errors
///
/// Returns [`TableError::BadRequest`] for unknown attributes, missing
/// primary-key values, or codec failures.
pub fn build_put(
    request: &PutRequest,
    physical: &str,
    info: &SchemaInfo,
    ignore_static: bool,
    now_ms: i64,
) -> Result<CompiledPut, TableError> {
    let mut attributes = request.attributes.clone();

    if let Some(ttl_value) = attributes.remove(TTL_ATTRIBUTE) {
        let ttl = ttl_value.as_u64().ok_or_else(|| {
            TableError::bad_request("_ttl must be a non-negative integer of seconds")
        })?;
        let deadline = now_ms.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX) * 1000);
        attributes.insert(EXIST_UNTIL_ATTRIBUTE.to_string(), json!(deadline));
    }

    for name in attributes.keys() {
        if info.column_type(name).is_none() {
            return Err(TableError::bad_request(format!("unknown attribute {name}")));
        }
    }

    let tid = match attributes.get(&info.tid) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => {
            let minted = timeuuid::mint();
            attributes.insert(info.tid.clone(), Value::String(minted.clone()));
            minted
        }
        Some(_) => {
            return Err(TableError::bad_request(format!(
                "attribute {} must be a timeuuid string",
                info.tid
            )));
        }
    };
    let timestamp_ms = timeuuid::unix_millis(&tid)?;

    for key in &info.i_keys {
        if !attributes.contains_key(key) {
            return Err(TableError::bad_request(format!(
                "missing primary key attribute {key}"
            )));
        }
    }

    let mut data_columns: Vec<(&str, SqlScalar)> = Vec::new();
    let mut static_columns: Vec<(&str, SqlScalar)> = Vec::new();
    for (name, value) in &attributes {
        let Some(declared) = info.column_type(name) else {
            continue;
        };
        let written = write_value(declared, value)?;
        if info.is_static(name) {
            static_columns.push((name.as_str(), written));
        } else {
            data_columns.push((name.as_str(), written));
        }
    }

    let mut statements = Vec::new();
    match &request.condition {
        Some(PutCondition::NotExists) => {
            statements.push(insert_or_ignore(physical, &data_columns));
        }
        Some(PutCondition::If(predicates)) => {
            if let Some(update) =
                conditioned_update(physical, info, &data_columns, Some(predicates), now_ms)?
            {
                statements.push(update);
            }
        }
        None => {
            if let Some(update) =
                conditioned_update(physical, info, &data_columns, None, now_ms)?
            {
                statements.push(update);
            }
            statements.push(insert_or_ignore(physical, &data_columns));
        }
    }

    if !ignore_static && !static_columns.is_empty() {
        statements.push(static_upsert(physical, info, &data_columns, &static_columns));
    }

    Ok(CompiledPut {
        statements,
        tid,
        timestamp_ms,
        attributes,
    })
}

/// Renders the create-case insert.
fn insert_or_ignore(physical: &str, data_columns: &[(&str, SqlScalar)]) -> Statement {
    let names: Vec<String> = data_columns.iter().map(|(name, _)| ident(name)).collect();
    let placeholders: Vec<&str> = data_columns.iter().map(|_| "?").collect();
    Statement {
        sql: format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            data_table(physical),
            names.join(", "),
            placeholders.join(", ")
        ),
        params: data_columns.iter().map(|(_, value)| value.clone()).collect(),
    }
}

/// Renders the existing-row update, optionally conditioned on an `if`
/// predicate map and the soft-delete gate. Returns `None` when no non-key
/// column is written.
fn conditioned_update(
    physical: &str,
    info: &SchemaInfo,
    data_columns: &[(&str, SqlScalar)],
    condition: Option<&BTreeMap<String, Predicate>>,
    now_ms: i64,
) -> Result<Option<Statement>, TableError> {
    let set_columns: Vec<&(&str, SqlScalar)> = data_columns
        .iter()
        .filter(|(name, _)| !info.i_key_map.contains_key(*name))
        .collect();
    if set_columns.is_empty() {
        return Ok(None);
    }

    let mut params: Vec<SqlScalar> =
        set_columns.iter().map(|(_, value)| value.clone()).collect();
    let assignments: Vec<String> =
        set_columns.iter().map(|(name, _)| format!("{} = ?", ident(name))).collect();

    let mut clauses = Vec::new();
    for key in &info.i_keys {
        if let Some((_, value)) =
            data_columns.iter().find(|(name, _)| *name == key.as_str())
        {
            clauses.push(format!("{} = ?", ident(key)));
            params.push(value.clone());
        }
    }
    if let Some(predicates) = condition {
        compile_predicates(predicates, info, None, "", &mut clauses, &mut params)?;
        let deadline = ident(EXIST_UNTIL_ATTRIBUTE);
        clauses.push(format!("({deadline} > ? OR {deadline} IS NULL)"));
        params.push(SqlScalar::Integer(now_ms));
    }

    Ok(Some(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            data_table(physical),
            assignments.join(", "),
            clauses.join(" AND ")
        ),
        params,
    }))
}

/// Renders the static sidecar upsert carrying the hash keys plus every
/// supplied static column.
fn static_upsert(
    physical: &str,
    info: &SchemaInfo,
    data_columns: &[(&str, SqlScalar)],
    static_columns: &[(&str, SqlScalar)],
) -> Statement {
    let mut names = Vec::new();
    let mut params = Vec::new();
    for key in info.hash_keys() {
        if let Some((_, value)) = data_columns.iter().find(|(name, _)| *name == key) {
            names.push(ident(key));
            params.push(value.clone());
        }
    }
    for (name, value) in static_columns {
        names.push(ident(name));
        params.push(value.clone());
    }
    let placeholders: Vec<&str> = names.iter().map(|_| "?").collect();
    Statement {
        sql: format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            static_table(physical),
            names.join(", "),
            placeholders.join(", ")
        ),
        params,
    }
}

/// Renders the secondary-index sidecar upsert over every sidecar column
/// present in the write. Returns `None` when the table declares no
/// secondary indexes.
///
/// # Errors
///
/// Returns [`TableError::BadRequest`] for codec failures.
pub fn build_secondary_index_update(
    attributes: &BTreeMap<String, Value>,
    physical: &str,
    info: &SchemaInfo,
) -> Result<Option<Statement>, TableError> {
    if info.secondary_indexes.is_empty() {
        return Ok(None);
    }
    let mut names = Vec::new();
    let mut params = Vec::new();
    for column in info.secondary_table_columns() {
        let Some(value) = attributes.get(column) else {
            continue;
        };
        let Some(declared) = info.column_type(column) else {
            continue;
        };
        names.push(ident(column));
        params.push(write_value(declared, value)?);
    }
    let placeholders: Vec<&str> = names.iter().map(|_| "?").collect();
    Ok(Some(Statement {
        sql: format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            secondary_table(physical),
            names.join(", "),
            placeholders.join(", ")
        ),
        params,
    }))
}

// ============================================================================
// SECTION: Deletes
// ============================================================================

/// Compiles a hard delete over the validated key predicates.
///
/// # Errors
///
/// Returns [`TableError::BadRequest`] for non-key predicates.
pub fn build_delete(
    request: &trestle_core::DeleteRequest,
    physical: &str,
    info: &SchemaInfo,
) -> Result<Statement, TableError> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    compile_predicates(
        &request.attributes,
        info,
        Some(&info.i_key_map),
        "",
        &mut clauses,
        &mut params,
    )?;
    let mut sql = format!("DELETE FROM {}", data_table(physical));
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok(Statement { sql, params })
}

/// Compiles the amortized purge of expired tombstones.
#[must_use]
pub fn build_delete_expired(physical: &str, now_ms: i64) -> Statement {
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} < ?",
            data_table(physical),
            ident(EXIST_UNTIL_ATTRIBUTE)
        ),
        params: vec![SqlScalar::Integer(now_ms)],
    }
}

/// Compiles a per-row hard delete keyed by the full primary key. Used by
/// the `latest_hash` policy to remove superseded revisions.
#[must_use]
pub fn build_delete_older(
    info: &SchemaInfo,
    physical: &str,
    key_values: &[SqlScalar],
) -> Statement {
    let clauses: Vec<String> =
        info.i_keys.iter().map(|key| format!("{} = ?", ident(key))).collect();
    Statement {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            data_table(physical),
            clauses.join(" AND ")
        ),
        params: key_values.to_vec(),
    }
}

/// Compiles the retention tombstone: a per-row update whose only changed
/// attribute is the soft-delete deadline.
#[must_use]
pub fn build_tombstone(
    info: &SchemaInfo,
    physical: &str,
    key_values: &[SqlScalar],
    deadline_ms: i64,
) -> Statement {
    let clauses: Vec<String> =
        info.i_keys.iter().map(|key| format!("{} = ?", ident(key))).collect();
    let mut params = vec![SqlScalar::Integer(deadline_ms)];
    params.extend_from_slice(key_values);
    Statement {
        sql: format!(
            "UPDATE {} SET {} = ? WHERE {}",
            data_table(physical),
            ident(EXIST_UNTIL_ATTRIBUTE),
            clauses.join(" AND ")
        ),
        params,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
