//! Shard table: one slot per partition
//!
//! The table is an arena of `N` slots allocated up front and filled lazily.
//! A slot goes from empty to populated exactly once and is never cleared.
//!
//! Filling a slot means provisioning a shard, which suspends. If the
//! emptiness check and the store were separate steps, two writers could both
//! see an empty slot, both pay for a shard, and the later store would orphan
//! the earlier shard along with its grant. Each slot is therefore a
//! [`OnceCell`]: the first writer runs the creation while later writers to
//! the same slot wait for its outcome. A failed creation leaves the slot
//! empty and the next waiter tries again. Writers to other slots never wait.

use std::future::Future;

use partkv_common::{Error, PartitionIndex, Result, ShardCount, ShardId};
use partkv_shard::ShardHandle;
use tokio::sync::OnceCell;

/// Fixed-length table of lazily created shards
#[derive(Debug)]
pub struct ShardTable {
    shard_count: ShardCount,
    slots: Box<[OnceCell<ShardHandle>]>,
}

impl ShardTable {
    /// Allocate `shard_count` empty slots
    pub fn new(shard_count: ShardCount) -> Self {
        let slots = shard_count.partitions().map(|_| OnceCell::new()).collect();
        Self { shard_count, slots }
    }

    /// The shard in `index`, if one has been created
    ///
    /// Never creates anything.
    pub fn get(&self, index: PartitionIndex) -> Option<&ShardHandle> {
        self.slots.get(index.as_usize()).and_then(OnceCell::get)
    }

    /// The shard in `index`, running `create` if the slot is empty
    ///
    /// At most one `create` runs per slot at a time, and none runs once the
    /// slot is populated.
    ///
    /// # Errors
    ///
    /// Returns whatever `create` returned; the slot is left empty.
    pub async fn get_or_try_create<F, Fut>(
        &self,
        index: PartitionIndex,
        create: F,
    ) -> Result<&ShardHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ShardHandle>>,
    {
        let slot = self.slots.get(index.as_usize()).ok_or_else(|| {
            Error::internal(format!(
                "partition {index} outside shard table of {}",
                self.shard_count
            ))
        })?;
        slot.get_or_try_init(create).await
    }

    pub fn is_populated(&self, index: PartitionIndex) -> bool {
        self.get(index).is_some()
    }

    pub fn shard_id(&self, index: PartitionIndex) -> Option<ShardId> {
        self.get(index).map(ShardHandle::id)
    }

    /// Populated slots in partition order
    pub fn populated(&self) -> impl Iterator<Item = (PartitionIndex, &ShardHandle)> + '_ {
        self.shard_count
            .partitions()
            .zip(self.slots.iter())
            .filter_map(|(index, slot)| slot.get().map(|shard| (index, shard)))
    }

    pub fn populated_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.initialized()).count()
    }

    pub const fn shard_count(&self) -> ShardCount {
        self.shard_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partkv_common::ShardSpec;

    fn count() -> ShardCount {
        ShardCount::new(4).unwrap()
    }

    fn spawn(index: u32) -> ShardHandle {
        ShardHandle::spawn(ShardSpec::new(count(), PartitionIndex::new(index)), 8)
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = ShardTable::new(count());
        assert_eq!(table.populated_count(), 0);
        assert!(count().partitions().all(|p| !table.is_populated(p)));
    }

    #[tokio::test]
    async fn test_slot_filled_once() {
        let table = ShardTable::new(count());
        let index = PartitionIndex::new(2);

        let first = table
            .get_or_try_create(index, || async { Ok(spawn(2)) })
            .await
            .unwrap()
            .id();
        let second = table
            .get_or_try_create(index, || async {
                Err(Error::internal("slot already populated"))
            })
            .await
            .unwrap()
            .id();

        assert_eq!(first, second);
        assert_eq!(table.shard_id(index), Some(first));
        assert_eq!(table.populated_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_slot_empty() {
        let table = ShardTable::new(count());
        let index = PartitionIndex::new(1);

        let err = table
            .get_or_try_create(index, || async {
                Err(Error::shard_unavailable(index, "refused"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ShardUnavailable { .. }));
        assert!(!table.is_populated(index));

        table
            .get_or_try_create(index, || async { Ok(spawn(1)) })
            .await
            .unwrap();
        assert!(table.is_populated(index));
    }

    #[tokio::test]
    async fn test_populated_in_partition_order() {
        let table = ShardTable::new(count());
        for i in [3, 0] {
            table
                .get_or_try_create(PartitionIndex::new(i), || async move { Ok(spawn(i)) })
                .await
                .unwrap();
        }
        let indexes: Vec<_> = table.populated().map(|(p, _)| p.get()).collect();
        assert_eq!(indexes, vec![0, 3]);
    }

    #[tokio::test]
    async fn test_out_of_range_index() {
        let table = ShardTable::new(count());
        let err = table
            .get_or_try_create(PartitionIndex::new(9), || async { Ok(spawn(0)) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(table.get(PartitionIndex::new(9)).is_none());
    }
}
