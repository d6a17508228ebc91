use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use super::platform::IoStats;

/// Cumulative counters of one process as last observed.
///
/// A counter is `None` when it could not be read, in which case the next
/// observation of that counter primes again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterEntry {
    pub cpu_time: Option<Duration>,
    pub io: Option<IoStats>,
    pub observed_at: Instant,
}

/// Previous-cycle counters keyed by pid. The only state carried from one
/// sampling cycle to the next.
#[derive(Clone, Debug, Default)]
pub struct CounterCache {
    entries: HashMap<u32, CounterEntry>,
}

impl CounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pid: u32) -> Option<&CounterEntry> {
        self.entries.get(&pid)
    }

    pub fn put(&mut self, pid: u32, entry: CounterEntry) {
        self.entries.insert(pid, entry);
    }

    /// Drops entries whose pid is not alive and returns how many went.
    pub fn evict(&mut self, alive_pids: &HashSet<u32>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|pid, _| alive_pids.contains(pid));
        before - self.entries.len()
    }

    /// Swaps in the baselines of a completed cycle in one step.
    pub fn replace(&mut self, next: CounterCache) {
        self.entries = next.entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
