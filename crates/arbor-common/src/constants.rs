//! System-wide constants for ArborDB.

// =============================================================================
// Key and Row Limits
// =============================================================================

/// Maximum encoded key size in bytes (16 KB).
///
/// Covers both group-tree hierarchical keys and secondary-index keys.
pub const MAX_KEY_SIZE: usize = 16 * 1024;

/// Maximum encoded row size in bytes (1 MB).
pub const MAX_ROW_SIZE: usize = 1024 * 1024;

/// Maximum depth of a table hierarchy (ancestor chain length).
pub const MAX_HKEY_DEPTH: usize = 16;

// =============================================================================
// Transaction Constants
// =============================================================================

/// Maximum number of optimistic transaction retries before the attempt
/// surfaces as a concurrency error.
pub const MAX_TRANSACTION_RETRIES: usize = 10;

// =============================================================================
// Tree Naming
// =============================================================================

/// Tree-name prefix for group tables (one tree per group root).
pub const GROUP_TREE_PREFIX: &str = "grp";

/// Tree-name prefix for index trees (one tree per PK/secondary index).
pub const INDEX_TREE_PREFIX: &str = "idx";

/// Tree-name separator between prefix, schema, and numeric id.
pub const TREE_NAME_SEPARATOR: char = '.';

// =============================================================================
// Scan Engine
// =============================================================================

/// Initial capacity of the per-row scratch buffer used while encoding
/// collected rows.
pub const ROW_BUFFER_INITIAL_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_sane() {
        assert!(MAX_KEY_SIZE < MAX_ROW_SIZE);
        assert!(MAX_HKEY_DEPTH >= 3);
        assert!(MAX_TRANSACTION_RETRIES > 0);
    }
}
