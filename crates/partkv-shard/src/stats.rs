//! Per-shard operation counters
//!
//! Written only by the shard task, readable from any handle without going
//! through the mailbox.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation statistics for one shard
#[derive(Debug, Default)]
pub struct ShardStats {
    /// Total get requests served
    gets: AtomicU64,
    /// Gets that found a value
    hits: AtomicU64,
    /// Total put requests applied
    puts: AtomicU64,
    /// Puts that replaced an existing value
    overwrites: AtomicU64,
    /// Number of keys currently stored
    entries: AtomicU64,
}

impl ShardStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a get, and whether it found a value
    pub fn record_get(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a put, and whether it replaced an existing value
    pub fn record_put(&self, overwrite: bool) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if overwrite {
            self.overwrites.fetch_add(1, Ordering::Relaxed);
        } else {
            self.entries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.gets().saturating_sub(self.hits())
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn overwrites(&self) -> u64 {
        self.overwrites.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Copy the counters into a plain value
    pub fn snapshot(&self) -> ShardStatsSnapshot {
        ShardStatsSnapshot {
            gets: self.gets(),
            hits: self.hits(),
            misses: self.misses(),
            puts: self.puts(),
            overwrites: self.overwrites(),
            entries: self.entries(),
        }
    }
}

/// Point-in-time copy of [`ShardStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStatsSnapshot {
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub overwrites: u64,
    pub entries: u64,
}
