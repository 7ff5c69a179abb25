//! Shard error types

use partkv_common::ShardId;
use thiserror::Error;

/// Shard error
///
/// A shard itself never rejects a request; these only arise when its task
/// is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    /// The shard task stopped and no longer accepts requests
    #[error("Shard {0} mailbox closed")]
    MailboxClosed(ShardId),

    /// The shard task dropped a request without replying
    #[error("Shard {0} dropped the reply")]
    ReplyDropped(ShardId),
}

/// Result type for shard operations
pub type ShardResult<T> = Result<T, ShardError>;
