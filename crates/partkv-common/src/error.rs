//! Error types for partkv
//!
//! A missing key is not an error: reads return `Ok(None)`. Everything here
//! is a failed write or an unusable configuration.

use crate::types::PartitionIndex;
use thiserror::Error;

/// Common result type for partkv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for partkv
#[derive(Debug, Error)]
pub enum Error {
    /// The coordinator's budget cannot fund a new shard. Nothing was recorded.
    #[error(
        "provisioning failed for partition {partition}: requested {requested} units, {available} available"
    )]
    ProvisioningFailure {
        partition: PartitionIndex,
        requested: u64,
        available: u64,
    },

    /// Shard construction failed, or a live shard stopped answering
    #[error("shard for partition {partition} unavailable: {reason}")]
    ShardUnavailable {
        partition: PartitionIndex,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shard unavailable error
    pub fn shard_unavailable(partition: PartitionIndex, reason: impl Into<String>) -> Self {
        Self::ShardUnavailable {
            partition,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if a later attempt of the same call may succeed
    ///
    /// Failed writes leave the shard table untouched, so both provisioning
    /// and availability failures can be retried by the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvisioningFailure { .. } | Self::ShardUnavailable { .. }
        )
    }

    /// Check if this is a provisioning failure
    #[must_use]
    pub const fn is_provisioning(&self) -> bool {
        matches!(self, Self::ProvisioningFailure { .. })
    }

    /// Partition the failure relates to, if any
    #[must_use]
    pub const fn partition(&self) -> Option<PartitionIndex> {
        match self {
            Self::ProvisioningFailure { partition, .. }
            | Self::ShardUnavailable { partition, .. } => Some(*partition),
            Self::Configuration(_) | Self::Internal(_) => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}
