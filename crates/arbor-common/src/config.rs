//! Configuration for ArborDB.
//!
//! One structure covers the storage-and-execution core. The management
//! surface (deferred index builds, verbose scan logging) is configured
//! here for the initial state and can also be toggled at runtime on the
//! store itself.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_KEY_SIZE, MAX_ROW_SIZE, MAX_TRANSACTION_RETRIES};

/// Store configuration.
///
/// # Example
///
/// ```rust
/// use arbor_common::config::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.max_txn_retries, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Schema name; namespaces every tree this store owns.
    pub schema_name: String,

    /// Optimistic transaction retry budget.
    /// Default: 10
    pub max_txn_retries: usize,

    /// Maximum encoded key size in bytes.
    /// Default: 16384 (16 KB)
    pub max_key_size: usize,

    /// Maximum encoded row size in bytes.
    /// Default: 1048576 (1 MB)
    pub max_row_size: usize,

    /// Start with index maintenance deferred (bulk-load mode).
    /// Default: false
    pub deferred_index_builds: bool,

    /// Start with verbose scan logging enabled.
    /// Default: false
    pub verbose_scans: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema_name: "arbor_data".to_string(),
            max_txn_retries: MAX_TRANSACTION_RETRIES,
            max_key_size: MAX_KEY_SIZE,
            max_row_size: MAX_ROW_SIZE,
            deferred_index_builds: false,
            verbose_scans: false,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with the specified schema name.
    #[must_use]
    pub fn with_schema_name(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            ..Default::default()
        }
    }

    /// Creates a minimal configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            schema_name: "arbor_test".to_string(),
            ..Default::default()
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_name.is_empty() {
            return Err("schema_name must not be empty".to_string());
        }
        if self.max_txn_retries == 0 {
            return Err("max_txn_retries must be at least 1".to_string());
        }
        if self.max_key_size > self.max_row_size {
            return Err("max_key_size must not exceed max_row_size".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_txn_retries, MAX_TRANSACTION_RETRIES);
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = StoreConfig {
            max_txn_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_schema_name() {
        let config = StoreConfig {
            schema_name: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
