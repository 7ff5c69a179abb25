//! Coordinator: routes keys to partitions and creates shards on first write
//!
//! Reads never create shards. A write to an empty partition provisions a
//! shard (grant + construction), records it in the table, then forwards the
//! write. Once recorded, a shard serves its partition for the life of the
//! coordinator.

use std::sync::Arc;

use partkv_common::{
    Config, Error, Key, PartitionIndex, Result, ShardCount, ShardId, ShardSpec, Value,
};
use partkv_shard::{ShardHandle, ShardStatsSnapshot};
use tracing::{debug, warn};

use crate::factory::{LocalShardFactory, ShardFactory};
use crate::metrics::{CoordinatorMetrics, PrometheusExporter};
use crate::provision::{BudgetSnapshot, Provisioner, ResourceBudget};
use crate::table::ShardTable;

/// Partitioned key-value coordinator
///
/// Safe to share behind an `Arc` and call concurrently.
#[derive(Debug)]
pub struct Coordinator {
    table: ShardTable,
    provisioner: Provisioner,
    metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Build a coordinator that hosts shards on the current runtime
    pub fn new(config: &Config) -> Self {
        let factory = LocalShardFactory::new(config.coordinator.mailbox_capacity);
        Self::with_factory(config, Arc::new(factory))
    }

    /// Build a coordinator with a custom shard factory
    pub fn with_factory(config: &Config, factory: Arc<dyn ShardFactory>) -> Self {
        let shard_count = config.coordinator.shard_count;
        let budget = ResourceBudget::new(config.provisioning.budget);
        debug!(
            %shard_count,
            budget = config.provisioning.budget,
            shard_grant = config.provisioning.shard_grant,
            "Coordinator created"
        );
        Self {
            table: ShardTable::new(shard_count),
            provisioner: Provisioner::new(budget, config.provisioning.shard_grant, factory),
            metrics: CoordinatorMetrics::new(),
        }
    }

    /// Partition that owns `key`
    pub const fn partition_of(&self, key: Key) -> PartitionIndex {
        self.table.shard_count().partition_of(key)
    }

    /// Read the value stored for `key`
    ///
    /// Returns `Ok(None)` both when the partition has no shard yet and when
    /// its shard has no entry for the key.
    ///
    /// # Errors
    ///
    /// `ShardUnavailable` if the partition's shard no longer answers.
    pub async fn get(&self, key: Key) -> Result<Option<Value>> {
        let index = self.partition_of(key);
        let Some(shard) = self.table.get(index) else {
            debug!(%key, partition = %index, "get on unpopulated partition");
            self.metrics.record_get(false);
            return Ok(None);
        };

        let value = shard
            .get(key)
            .await
            .map_err(|e| Error::shard_unavailable(index, e.to_string()))?;
        self.metrics.record_get(value.is_some());
        Ok(value)
    }

    /// Store `value` under `key`, creating the partition's shard if needed
    ///
    /// # Errors
    ///
    /// - `ProvisioningFailure` if a new shard is needed and the budget
    ///   cannot fund it
    /// - `ShardUnavailable` if shard construction fails or the shard no
    ///   longer answers
    ///
    /// A failed put leaves the shard table unchanged.
    pub async fn put(&self, key: Key, value: Value) -> Result<()> {
        let result = self.try_put(key, value).await;
        self.metrics.record_put(result.is_ok());
        result
    }

    async fn try_put(&self, key: Key, value: Value) -> Result<()> {
        let index = self.partition_of(key);
        let shard = self
            .table
            .get_or_try_create(index, || self.provision(index))
            .await?;

        shard
            .put(key, value)
            .await
            .map_err(|e| Error::shard_unavailable(index, e.to_string()))
    }

    async fn provision(&self, index: PartitionIndex) -> Result<ShardHandle> {
        let spec = ShardSpec::new(self.shard_count(), index);
        match self.provisioner.create_shard(spec).await {
            Ok(shard) => {
                self.metrics.record_shard_created();
                Ok(shard)
            }
            Err(e) => {
                if e.is_provisioning() {
                    self.metrics.record_provisioning_failure();
                } else {
                    self.metrics.record_creation_failure();
                }
                warn!(partition = %index, error = %e, "Shard provisioning failed");
                Err(e)
            }
        }
    }

    pub const fn shard_count(&self) -> ShardCount {
        self.table.shard_count()
    }

    /// Identity of the shard serving `index`, if one exists
    pub fn shard_id(&self, index: PartitionIndex) -> Option<ShardId> {
        self.table.shard_id(index)
    }

    pub fn is_populated(&self, index: PartitionIndex) -> bool {
        self.table.is_populated(index)
    }

    /// Partitions that have a shard, in ascending order
    pub fn populated_partitions(&self) -> Vec<PartitionIndex> {
        self.table.populated().map(|(index, _)| index).collect()
    }

    /// Counters of every live shard, in partition order
    pub fn shard_stats(&self) -> Vec<(PartitionIndex, ShardStatsSnapshot)> {
        self.table
            .populated()
            .map(|(index, shard)| (index, shard.stats().snapshot()))
            .collect()
    }

    pub fn budget(&self) -> BudgetSnapshot {
        self.provisioner.budget().snapshot()
    }

    pub const fn shard_grant(&self) -> u64 {
        self.provisioner.shard_grant()
    }

    pub const fn metrics(&self) -> &CoordinatorMetrics {
        &self.metrics
    }

    /// Render all metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        PrometheusExporter::default().export(self)
    }
}
