//! Shard factory: how a funded shard comes into existence
//!
//! The coordinator only sees the [`ShardFactory`] trait. The default
//! [`LocalShardFactory`] starts an in-process shard task; other factories
//! can put shards elsewhere or inject failures.

use async_trait::async_trait;
use partkv_common::ShardSpec;
use partkv_shard::ShardHandle;
use thiserror::Error;
use tracing::debug;

use crate::provision::Grant;

/// Shard construction failure
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No runtime to host the shard task
    #[error("no runtime available to host shard: {0}")]
    Runtime(String),

    /// The platform refused to instantiate the shard
    #[error("shard construction rejected: {0}")]
    Rejected(String),
}

/// Builds a shard for one partition
///
/// Called at most once per successful partition creation. The grant is
/// already taken when this runs; returning an error refunds it.
#[async_trait]
pub trait ShardFactory: Send + Sync {
    async fn create_shard(&self, spec: ShardSpec, grant: &Grant) -> Result<ShardHandle, FactoryError>;
}

/// Starts shards as tasks on the current tokio runtime
#[derive(Debug, Clone)]
pub struct LocalShardFactory {
    mailbox_capacity: usize,
}

impl LocalShardFactory {
    pub const fn new(mailbox_capacity: usize) -> Self {
        Self { mailbox_capacity }
    }

    pub const fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }
}

impl Default for LocalShardFactory {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ShardFactory for LocalShardFactory {
    async fn create_shard(&self, spec: ShardSpec, grant: &Grant) -> Result<ShardHandle, FactoryError> {
        tokio::runtime::Handle::try_current().map_err(|e| FactoryError::Runtime(e.to_string()))?;

        let shard = ShardHandle::spawn(spec, self.mailbox_capacity);
        debug!(
            partition = %spec.partition,
            shard_id = %shard.id(),
            grant = grant.amount(),
            mailbox_capacity = self.mailbox_capacity,
            "Spawned local shard"
        );
        Ok(shard)
    }
}
