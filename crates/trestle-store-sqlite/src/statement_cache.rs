// crates/trestle-store-sqlite/src/statement_cache.rs
// ============================================================================
// Module: Compiled-Statement Cache
// Description: LRU over compiled read queries keyed by table and request.
// Purpose: Skip recompilation for repeated requests and invalidate by table
//          prefix on migration.
// Dependencies: crate::sql, serde, serde_jcs
// ============================================================================

//! ## Overview
//! Keys are `"{physical_table}:{canonical request JSON}"` so every entry for
//! a table shares that table's prefix; a migration (or drop) invalidates the
//! whole prefix in one sweep. The cache holds compiled SQL plus its
//! parameter template; statement handles themselves live in the engine
//! connections' prepared-statement caches, which finalize handles on their
//! own eviction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;

use crate::sql::CompiledRead;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cache capacity in entries.
pub const STATEMENT_CACHE_CAPACITY: usize = 500;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Builds a cache key from the physical table and the canonical JSON form
/// of the request.
#[must_use]
pub fn request_key<T: Serialize>(physical_table: &str, request: &T) -> String {
    let canonical = serde_jcs::to_string(request)
        .or_else(|_| serde_json::to_string(request))
        .unwrap_or_default();
    format!("{physical_table}:{canonical}")
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cache slot with its recency tick.
struct Slot {
    /// Compiled query.
    compiled: CompiledRead,
    /// Recency tick; larger is more recent.
    tick: u64,
}

/// LRU cache over compiled read queries.
pub struct StatementCache {
    /// Maximum entry count.
    capacity: usize,
    /// Key to slot.
    entries: HashMap<String, Slot>,
    /// Recency tick to key, oldest first.
    recency: BTreeMap<u64, String>,
    /// Monotonic tick source.
    tick: u64,
}

impl StatementCache {
    /// Creates a cache with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a compiled query, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<CompiledRead> {
        self.tick += 1;
        let tick = self.tick;
        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.to_string());
        Some(slot.compiled.clone())
    }

    /// Inserts a compiled query, evicting the least recently used entry
    /// when the cache is full.
    pub fn insert(&mut self, key: String, compiled: CompiledRead) {
        self.tick += 1;
        if let Some(previous) = self.entries.remove(&key) {
            self.recency.remove(&previous.tick);
        } else if self.entries.len() >= self.capacity {
            let oldest = self.recency.keys().next().copied();
            if let Some(oldest_tick) = oldest
                && let Some(oldest_key) = self.recency.remove(&oldest_tick)
            {
                self.entries.remove(&oldest_key);
            }
        }
        self.entries.insert(
            key.clone(),
            Slot {
                compiled,
                tick: self.tick,
            },
        );
        self.recency.insert(self.tick, key);
    }

    /// Removes every entry whose key starts with the prefix, returning the
    /// number of removed entries.
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            if let Some(slot) = self.entries.remove(key) {
                self.recency.remove(&slot.tick);
            }
        }
        doomed.len()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
