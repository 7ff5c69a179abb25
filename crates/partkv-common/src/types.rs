//! Core type definitions for partkv
//!
//! Keys, partition indexes, the shard count that fixes the routing modulus,
//! and the identity/spec types handed to a shard when it is constructed.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Value stored against a key. Any text is valid, including the empty string.
pub type Value = String;

/// Key of a stored entry
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
    Into,
)]
#[display("{_0}")]
pub struct Key(u64);

impl Key {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Index of a partition, always in `[0, N)` for the shard count it came from
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
pub struct PartitionIndex(u32);

impl PartitionIndex {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Slot position in a shard table
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Number of partitions, fixed when a coordinator is built
///
/// The count is the routing modulus and the length of the shard table.
/// Zero is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(try_from = "u32", into = "u32")]
pub struct ShardCount(NonZeroU32);

impl ShardCount {
    /// Shard count used when nothing else is configured
    pub const DEFAULT: Self = match NonZeroU32::new(8) {
        Some(n) => Self(n),
        None => panic!("default shard count must be non-zero"),
    };

    /// Returns `None` for zero
    #[must_use]
    pub const fn new(count: u32) -> Option<Self> {
        match NonZeroU32::new(count) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Route a key to its partition: `key mod N`
    #[must_use]
    pub const fn partition_of(self, key: Key) -> PartitionIndex {
        // The remainder is < N, and N fits in u32.
        #[allow(clippy::cast_possible_truncation)]
        let index = (key.get() % self.0.get() as u64) as u32;
        PartitionIndex(index)
    }

    /// Check that an index falls inside `[0, N)`
    #[must_use]
    pub const fn contains(self, index: PartitionIndex) -> bool {
        index.get() < self.0.get()
    }

    /// Iterate every partition index in ascending order
    pub fn partitions(self) -> impl Iterator<Item = PartitionIndex> {
        (0..self.get()).map(PartitionIndex)
    }
}

impl Default for ShardCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for ShardCount {
    type Error = ZeroShardCount;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        Self::new(count).ok_or(ZeroShardCount)
    }
}

impl From<ShardCount> for u32 {
    fn from(count: ShardCount) -> Self {
        count.get()
    }
}

/// Rejected attempt to build a zero shard count
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("shard count must be at least 1")]
pub struct ZeroShardCount;

/// Unique identity of one shard instance
///
/// A fresh id is drawn every time a shard is constructed, so two shards
/// built for the same partition are always distinguishable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct ShardId(Uuid);

impl ShardId {
    /// Generate a new random shard ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ShardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardId({})", self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Construction parameters for a shard: `(shard_count, partition_index)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardSpec {
    pub shard_count: ShardCount,
    pub partition: PartitionIndex,
}

impl ShardSpec {
    #[must_use]
    pub const fn new(shard_count: ShardCount, partition: PartitionIndex) -> Self {
        Self {
            shard_count,
            partition,
        }
    }

    /// Whether `key` routes to this shard's partition
    #[must_use]
    pub const fn owns(&self, key: Key) -> bool {
        self.shard_count.partition_of(key).get() == self.partition.get()
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.shard_count)
    }
}
