use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::utils::format_human_elapsed;

pub const FILES_SCANNED: &str = "Total Files Scanned";
pub const FILES_COLLECTED: &str = "Total Files Collected";
pub const FAST_CHECKSUMS: &str = "Fast Checksums (crc32)";
pub const STRONG_CHECKSUMS: &str = "Strong Checksums (blake3)";
pub const FILE_COMPARISONS: &str = "Total File Comparisons";
pub const DUPLICATE_SETS: &str = "Duplicate Sets";
pub const DUPLICATE_FILES: &str = "Total Duplicate Files";
pub const FILES_FLAGGED: &str = "Files Flagged";
pub const FILES_DELETED: &str = "Files Deleted";
pub const FILES_MOVED: &str = "Files Moved";
pub const FOLDERS_DELETED: &str = "Folders Deleted During Cleanup";
pub const ERRORS: &str = "Errors";

/// Thread-safe named counters for a single run.
///
/// Counters keep the order in which they were first incremented, so the
/// summary reads in pipeline order.
pub struct Stats {
    inner: Mutex<Inner>,
}

struct Inner {
    start: Instant,
    counters: Vec<(String, u64)>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                start: Instant::now(),
                counters: Vec::new(),
            }),
        }
    }

    /// Adds `value` to the counter `key` and returns the new total.
    pub fn add(&self, key: &str, value: u64) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, count)) = inner.counters.iter_mut().find(|(name, _)| name == key) {
            *count += value;
            return *count;
        }
        inner.counters.push((key.to_string(), value));
        value
    }

    /// Current value of a counter, zero if it was never incremented.
    pub fn get(&self, key: &str) -> u64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .counters
            .iter()
            .find(|(name, _)| name == key)
            .map_or(0, |(_, count)| *count)
    }

    /// Time since the registry was created or last reset.
    pub fn duration(&self) -> Duration {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start
            .elapsed()
    }

    /// Clears every counter and restarts the clock.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.counters.clear();
        inner.start = Instant::now();
    }

    pub fn summary(&self) -> Summary {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Summary {
            counters: inner
                .counters
                .iter()
                .map(|(name, value)| Counter {
                    name: name.clone(),
                    value: *value,
                })
                .collect(),
            elapsed: inner.start.elapsed(),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub name: String,
    pub value: u64,
}

/// Snapshot of the counters at the end of a run.
///
/// Serializes as `counters`, `elapsed_ms` and a human-readable `elapsed`.
#[derive(Debug, Clone)]
pub struct Summary {
    pub counters: Vec<Counter>,
    pub elapsed: Duration,
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX);
        let mut state = serializer.serialize_struct("Summary", 3)?;
        state.serialize_field("counters", &self.counters)?;
        state.serialize_field("elapsed_ms", &millis)?;
        state.serialize_field("elapsed", &format_human_elapsed(self.elapsed))?;
        state.end()
    }
}

impl Summary {
    pub fn get(&self, key: &str) -> u64 {
        self.counters
            .iter()
            .find(|c| c.name == key)
            .map_or(0, |c| c.value)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for counter in &self.counters {
            writeln!(f, "{}: {}", counter.name, counter.value)?;
        }
        write!(
            f,
            "Total Execution Time: {}",
            format_human_elapsed(self.elapsed)
        )
    }
}
