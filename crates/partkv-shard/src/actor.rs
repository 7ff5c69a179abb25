//! Shard task and the handle used to talk to it
//!
//! Every request is a message carrying a `oneshot` reply channel. The task
//! drains its mailbox one message at a time, so requests to one shard never
//! interleave. The task exits once every handle has been dropped.

use crate::error::{ShardError, ShardResult};
use crate::stats::ShardStats;
use crate::store::ShardStore;

use partkv_common::{Key, ShardId, ShardSpec, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

enum ShardCommand {
    Get {
        key: Key,
        reply: oneshot::Sender<Option<Value>>,
    },
    Put {
        key: Key,
        value: Value,
        reply: oneshot::Sender<()>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Owns the store and serves the mailbox
struct ShardActor {
    id: ShardId,
    store: ShardStore,
    stats: Arc<ShardStats>,
    rx: mpsc::Receiver<ShardCommand>,
}

impl ShardActor {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        debug!(
            shard_id = %self.id,
            partition = %self.store.spec().partition,
            entries = self.store.len(),
            "Shard stopped"
        );
    }

    fn handle(&mut self, command: ShardCommand) {
        // A caller that gave up waiting drops its receiver; the send result
        // is irrelevant once the operation has been applied.
        match command {
            ShardCommand::Get { key, reply } => {
                let value = self.store.get(key).cloned();
                self.stats.record_get(value.is_some());
                trace!(shard_id = %self.id, %key, hit = value.is_some(), "get");
                let _ = reply.send(value);
            }
            ShardCommand::Put { key, value, reply } => {
                let previous = self.store.put(key, value);
                self.stats.record_put(previous.is_some());
                trace!(shard_id = %self.id, %key, overwrite = previous.is_some(), "put");
                let _ = reply.send(());
            }
            ShardCommand::Len { reply } => {
                let _ = reply.send(self.store.len());
            }
        }
    }
}

/// Cloneable handle to a running shard
#[derive(Clone, Debug)]
pub struct ShardHandle {
    id: ShardId,
    spec: ShardSpec,
    tx: mpsc::Sender<ShardCommand>,
    stats: Arc<ShardStats>,
}

impl ShardHandle {
    /// Start a shard task for `spec` on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(spec: ShardSpec, mailbox_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let id = ShardId::new();
        let stats = Arc::new(ShardStats::new());

        let actor = ShardActor {
            id,
            store: ShardStore::new(spec),
            stats: Arc::clone(&stats),
            rx,
        };
        tokio::spawn(actor.run());

        debug!(shard_id = %id, partition = %spec.partition, "Shard started");
        Self {
            id,
            spec,
            tx,
            stats,
        }
    }

    /// Fetch the value stored for `key`
    pub async fn get(&self, key: Key) -> ShardResult<Option<Value>> {
        let (reply, rx) = oneshot::channel();
        self.send(ShardCommand::Get { key, reply }).await?;
        rx.await.map_err(|_| ShardError::ReplyDropped(self.id))
    }

    /// Insert or overwrite `key`
    pub async fn put(&self, key: Key, value: Value) -> ShardResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ShardCommand::Put { key, value, reply }).await?;
        rx.await.map_err(|_| ShardError::ReplyDropped(self.id))
    }

    /// Number of keys stored, as seen after every earlier request
    pub async fn len(&self) -> ShardResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(ShardCommand::Len { reply }).await?;
        rx.await.map_err(|_| ShardError::ReplyDropped(self.id))
    }

    async fn send(&self, command: ShardCommand) -> ShardResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ShardError::MailboxClosed(self.id))
    }

    pub const fn id(&self) -> ShardId {
        self.id
    }

    pub const fn spec(&self) -> ShardSpec {
        self.spec
    }

    pub fn stats(&self) -> &ShardStats {
        &self.stats
    }

    /// True once the shard task has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partkv_common::{PartitionIndex, ShardCount};

    fn spec() -> ShardSpec {
        ShardSpec::new(ShardCount::new(8).unwrap(), PartitionIndex::new(3))
    }

    #[tokio::test]
    async fn test_get_before_put() {
        let shard = ShardHandle::spawn(spec(), 16);
        assert_eq!(shard.get(Key::new(3)).await.unwrap(), None);
        assert_eq!(shard.stats().misses(), 1);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let shard = ShardHandle::spawn(spec(), 16);
        shard.put(Key::new(3), "three".to_string()).await.unwrap();
        shard.put(Key::new(11), String::new()).await.unwrap();

        assert_eq!(
            shard.get(Key::new(3)).await.unwrap().as_deref(),
            Some("three")
        );
        assert_eq!(shard.get(Key::new(11)).await.unwrap().as_deref(), Some(""));
        assert_eq!(shard.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_requests_apply_in_mailbox_order() {
        let shard = ShardHandle::spawn(spec(), 4);
        for i in 0..100 {
            shard.put(Key::new(3), i.to_string()).await.unwrap();
        }
        assert_eq!(shard.get(Key::new(3)).await.unwrap().as_deref(), Some("99"));
        assert_eq!(shard.stats().overwrites(), 99);
        assert_eq!(shard.stats().entries(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clients() {
        let shard = ShardHandle::spawn(spec(), 8);
        let mut tasks = Vec::new();
        for i in 0..32u64 {
            let shard = shard.clone();
            tasks.push(tokio::spawn(async move {
                let key = Key::new(3 + i * 8);
                shard.put(key, format!("v{i}")).await.unwrap();
                shard.get(key).await.unwrap()
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), Some(format!("v{i}")));
        }
        assert_eq!(shard.len().await.unwrap(), 32);
    }

    #[tokio::test]
    async fn test_clones_share_identity() {
        let shard = ShardHandle::spawn(spec(), 16);
        let other = shard.clone();
        other.put(Key::new(19), "x".to_string()).await.unwrap();
        assert_eq!(shard.id(), other.id());
        assert_eq!(shard.get(Key::new(19)).await.unwrap().as_deref(), Some("x"));
        assert!(!shard.is_closed());
    }
}
