//! Injected sequence-number service (order numbers and other human-facing counters).
//!
//! Numbering is a collaborator rather than ambient static state so callers and
//! tests control it explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hands out monotonically increasing numbers per named scope.
pub trait SequenceGenerator: Send + Sync {
    /// Next number in `scope` (first call returns the scope's starting value).
    fn next(&self, scope: &str) -> u64;
}

impl<S> SequenceGenerator for Arc<S>
where
    S: SequenceGenerator + ?Sized,
{
    fn next(&self, scope: &str) -> u64 {
        (**self).next(scope)
    }
}

/// Process-local sequence generator.
#[derive(Debug)]
pub struct InMemorySequence {
    start: u64,
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemorySequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Every scope starts at `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            start,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGenerator for InMemorySequence {
    fn next(&self, scope: &str) -> u64 {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(scope, "sequence lock poisoned; continuing with recovered state");
                poisoned.into_inner()
            }
        };
        let slot = counters.entry(scope.to_string()).or_insert(self.start);
        let value = *slot;
        *slot += 1;
        value
    }
}
