//! partkv Shard
//!
//! A shard owns the key-value mapping for exactly one partition. Each shard
//! runs as its own task and executes requests one at a time, in the order
//! they reach its mailbox.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   mpsc    ┌──────────────┐
//! │ ShardHandle  │──────────▶│  ShardActor  │
//! │ (cloneable)  │◀──────────│  ShardStore  │
//! └──────────────┘  oneshot  └──────────────┘
//! ```
//!
//! The shard does not check that a key belongs to its partition; routing is
//! the coordinator's job.

pub mod actor;
pub mod error;
pub mod stats;
pub mod store;

pub use actor::ShardHandle;
pub use error::{ShardError, ShardResult};
pub use stats::{ShardStats, ShardStatsSnapshot};
pub use store::ShardStore;
