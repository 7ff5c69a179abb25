//! partkv Coordinator
//!
//! Routes each key to partition `key mod N` and forwards the request to the
//! shard serving that partition. Shards are created on the first write to
//! their partition, each one paid for with a grant from a fixed budget.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────────────────────────────┐
//!  get / put ─▶│             Coordinator              │
//!              │  partition_of(key) = key mod N       │
//!              │                                      │
//!              │  ShardTable  [0] [1] [2] ... [N-1]   │
//!              │               │       │              │
//!              │  Provisioner ─┼─ ResourceBudget      │
//!              │               └─ ShardFactory        │
//!              └───────────────┼───────┼──────────────┘
//!                              ▼       ▼
//!                           Shard   Shard   (one task each)
//! ```
//!
//! Reads never create shards. Concurrent first writes to one partition
//! produce exactly one shard and spend exactly one grant.

pub mod coordinator;
pub mod factory;
pub mod metrics;
pub mod provision;
pub mod table;

pub use coordinator::Coordinator;
pub use factory::{FactoryError, LocalShardFactory, ShardFactory};
pub use metrics::{CoordinatorMetrics, PrometheusExporter};
pub use provision::{BudgetSnapshot, Grant, InsufficientBudget, Provisioner, ResourceBudget};
pub use table::ShardTable;
