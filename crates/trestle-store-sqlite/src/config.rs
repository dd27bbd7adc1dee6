// crates/trestle-store-sqlite/src/config.rs
// ============================================================================
// Module: Engine Configuration
// Description: Recognized engine options with serde defaults and validation.
// Purpose: Resolve the database path and map domains to physical prefixes.
// Dependencies: crate::client, regex, serde
// ============================================================================

//! ## Overview
//! The engine recognizes a small option set: the backing file path (tilde
//! expands to the home directory), writer idle timeout, busy-retry knobs,
//! SQL echo for debugging, and optional storage groups mapping request
//! domains onto shared physical-table prefixes. Limits are validated once at
//! construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::client::StoreError;

// ============================================================================
// SECTION: Storage Groups
// ============================================================================

/// Maps a set of request domains onto one physical-table prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageGroup {
    /// Physical prefix used for every matched domain.
    pub name: String,
    /// Domain patterns: a literal hostname, a `/regex/` literal, or `'*'`
    /// which matches every domain.
    pub domains: Vec<String>,
}

impl StorageGroup {
    /// Returns true when the group matches the domain.
    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        self.domains.iter().any(|pattern| pattern_matches(pattern, domain))
    }
}

/// Matches one domain pattern against a request domain.
fn pattern_matches(pattern: &str, domain: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(body) = regex_body(pattern) {
        if let Ok(compiled) = regex::Regex::new(body) {
            return compiled.is_match(domain);
        }
        return false;
    }
    pattern == domain
}

/// Returns the inner expression of a `/regex/` literal.
fn regex_body(pattern: &str) -> Option<&str> {
    if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        Some(&pattern[1 .. pattern.len() - 1])
    } else {
        None
    }
}

// ============================================================================
// SECTION: Engine Config
// ============================================================================

/// Default database file name.
fn default_dbname() -> String {
    "trestle".to_string()
}

/// Default writer idle timeout in milliseconds.
const fn default_pool_idle_timeout() -> u64 {
    10_000
}

/// Default upper bound of the jittered busy-retry sleep in milliseconds.
const fn default_retry_delay() -> u64 {
    100
}

/// Default maximum busy retries per acquire or execute.
const fn default_retry_limit() -> u32 {
    5
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the backing file; a leading tilde expands to the home
    /// directory.
    #[serde(default = "default_dbname")]
    pub dbname: String,
    /// Writer connection idle timeout in milliseconds.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout: u64,
    /// Upper bound of the jittered busy-retry sleep in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    /// Maximum busy retries per acquire or execute.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Emit compiled SQL to the log for debugging.
    #[serde(default)]
    pub show_sql: bool,
    /// Optional domain to physical-prefix groups.
    #[serde(default)]
    pub storage_groups: Vec<StorageGroup>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dbname: default_dbname(),
            pool_idle_timeout: default_pool_idle_timeout(),
            retry_delay: default_retry_delay(),
            retry_limit: default_retry_limit(),
            show_sql: false,
            storage_groups: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validates runtime limits and storage-group patterns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for out-of-range limits or malformed
    /// regex patterns.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.retry_limit == 0 {
            return Err(StoreError::Config(
                "retry_limit must be greater than zero".to_string(),
            ));
        }
        if self.retry_delay == 0 {
            return Err(StoreError::Config(
                "retry_delay must be greater than zero".to_string(),
            ));
        }
        if self.pool_idle_timeout == 0 {
            return Err(StoreError::Config(
                "pool_idle_timeout must be greater than zero".to_string(),
            ));
        }
        for group in &self.storage_groups {
            if group.name.is_empty() {
                return Err(StoreError::Config(
                    "storage group name must not be empty".to_string(),
                ));
            }
            for pattern in &group.domains {
                if let Some(body) = regex_body(pattern)
                    && regex::Regex::new(body).is_err()
                {
                    return Err(StoreError::Config(format!(
                        "storage group {} has malformed pattern {pattern}",
                        group.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolves the backing file path, expanding a leading tilde.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        if let Some(rest) = self.dbname.strip_prefix("~/")
            && let Some(home) = std::env::var_os("HOME")
        {
            return PathBuf::from(home).join(rest);
        }
        PathBuf::from(&self.dbname)
    }

    /// Returns the physical prefix for a request domain: the first matching
    /// storage group's name, or the domain itself.
    #[must_use]
    pub fn physical_prefix(&self, domain: &str) -> String {
        self.storage_groups
            .iter()
            .find(|group| group.matches(domain))
            .map_or_else(|| domain.to_string(), |group| group.name.clone())
    }

    /// Returns the physical name for a logical table within a domain.
    #[must_use]
    pub fn physical_table(&self, domain: &str, table: &str) -> String {
        format!("{}_{}", self.physical_prefix(domain), table)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
