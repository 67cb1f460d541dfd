//! Run identifiers and monotonic counters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one pipeline run.
///
/// Run ids are allocated from a [`MonotonicCounter`] and are never reused
/// for the lifetime of the engine that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    /// Wraps a raw run number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw run number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("run-").unwrap_or(s).parse().map(Self)
    }
}

/// A strictly increasing counter starting at 1.
#[derive(Debug)]
pub struct MonotonicCounter {
    next: AtomicU64,
}

impl Default for MonotonicCounter {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl MonotonicCounter {
    /// Creates a counter whose first value is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next value.
    pub fn next_value(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocates a new run id.
    pub fn next_run_id(&self) -> RunId {
        RunId(self.next_value())
    }

    /// Returns the value the next call will hand out.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
