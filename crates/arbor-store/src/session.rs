//! Sessions.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One caller's context for store operations.
///
/// A session drives at most one collector at a time, synchronously; it is
/// not shared between threads. Multiple sessions may operate on the same
/// group concurrently, each over its own storage transactions.
#[derive(Debug)]
pub struct Session {
    id: u64,
}

impl Session {
    /// Creates a session with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// Returns the session id, used for log correlation.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id(), b.id());
    }
}
