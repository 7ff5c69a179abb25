//! Shard provisioning: the budget a new shard is paid from
//!
//! Creating a shard costs a fixed grant drawn from the coordinator's
//! [`ResourceBudget`]. The grant is taken before construction and handed
//! back if construction fails, so from the caller's side funding and
//! construction succeed or fail together.
//!
//! # Components
//!
//! - **ResourceBudget**: lock-free pool of units, debited with a CAS loop
//! - **Grant**: units held for one shard; refunded on drop unless committed
//! - **Provisioner**: budget + factory, the single entry point for creation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use partkv_common::{Error, Result, ShardSpec};
use partkv_shard::ShardHandle;
use thiserror::Error;
use tracing::{info, warn};

use crate::factory::ShardFactory;

/// Pool of units available for shard creation
///
/// Units leave the pool as [`Grant`]s. A committed grant never returns:
/// shards live for the rest of the process.
#[derive(Debug)]
pub struct ResourceBudget {
    /// Units the budget started with
    capacity: u64,
    /// Units not yet granted
    available: AtomicU64,
}

impl ResourceBudget {
    /// Create a budget holding `capacity` units
    pub fn new(capacity: u64) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            available: AtomicU64::new(capacity),
        })
    }

    /// Try to take `amount` units without blocking
    ///
    /// Fails without side effects when fewer than `amount` units remain.
    pub fn try_grant(self: &Arc<Self>, amount: u64) -> std::result::Result<Grant, InsufficientBudget> {
        loop {
            let current = self.available.load(Ordering::Acquire);
            if current < amount {
                return Err(InsufficientBudget {
                    requested: amount,
                    available: current,
                });
            }

            match self.available.compare_exchange_weak(
                current,
                current - amount,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(Grant {
                        budget: Arc::clone(self),
                        amount,
                        committed: false,
                    });
                }
                Err(_) => continue, // Retry on contention
            }
        }
    }

    fn refund(&self, amount: u64) {
        self.available.fetch_add(amount, Ordering::AcqRel);
    }

    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available(&self) -> u64 {
        self.available.load(Ordering::Acquire)
    }

    /// Units currently out as grants
    pub fn granted(&self) -> u64 {
        self.capacity - self.available()
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let available = self.available();
        BudgetSnapshot {
            capacity: self.capacity,
            available,
            granted: self.capacity - available,
        }
    }
}

/// Point-in-time view of a [`ResourceBudget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub capacity: u64,
    pub available: u64,
    pub granted: u64,
}

/// The budget could not cover a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient budget: requested {requested}, available {available}")]
pub struct InsufficientBudget {
    pub requested: u64,
    pub available: u64,
}

/// Units held on behalf of one shard under construction
///
/// Dropping an uncommitted grant returns its units to the budget.
#[derive(Debug)]
#[must_use = "dropping a grant refunds it"]
pub struct Grant {
    budget: Arc<ResourceBudget>,
    amount: u64,
    committed: bool,
}

impl Grant {
    pub const fn amount(&self) -> u64 {
        self.amount
    }

    /// Keep the units spent; returns the amount
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        self.amount
    }
}

impl Drop for Grant {
    fn drop(&mut self) {
        if !self.committed && self.amount > 0 {
            self.budget.refund(self.amount);
        }
    }
}

/// Funds and constructs shards
pub struct Provisioner {
    budget: Arc<ResourceBudget>,
    shard_grant: u64,
    factory: Arc<dyn ShardFactory>,
}

impl Provisioner {
    pub fn new(budget: Arc<ResourceBudget>, shard_grant: u64, factory: Arc<dyn ShardFactory>) -> Self {
        if shard_grant > budget.capacity() {
            warn!(
                shard_grant,
                budget = budget.capacity(),
                "Shard grant exceeds the whole budget; no shard can be created"
            );
        }
        Self {
            budget,
            shard_grant,
            factory,
        }
    }

    /// Pay for and build one shard
    ///
    /// # Errors
    ///
    /// - `ProvisioningFailure` if the budget cannot cover the grant
    /// - `ShardUnavailable` if the factory fails; the grant is refunded
    pub async fn create_shard(&self, spec: ShardSpec) -> Result<ShardHandle> {
        let grant = self
            .budget
            .try_grant(self.shard_grant)
            .map_err(|e| Error::ProvisioningFailure {
                partition: spec.partition,
                requested: e.requested,
                available: e.available,
            })?;

        // On error the grant drops here and its units go back to the budget.
        let shard = self
            .factory
            .create_shard(spec, &grant)
            .await
            .map_err(|e| Error::shard_unavailable(spec.partition, e.to_string()))?;

        let spent = grant.commit();
        info!(
            partition = %spec.partition,
            shard_id = %shard.id(),
            grant = spent,
            budget_available = self.budget.available(),
            "Provisioned shard"
        );
        Ok(shard)
    }

    pub const fn shard_grant(&self) -> u64 {
        self.shard_grant
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("budget", &self.budget)
            .field("shard_grant", &self.shard_grant)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{FactoryError, LocalShardFactory};
    use async_trait::async_trait;
    use partkv_common::{PartitionIndex, ShardCount};

    struct RejectingFactory;

    #[async_trait]
    impl ShardFactory for RejectingFactory {
        async fn create_shard(
            &self,
            _spec: ShardSpec,
            _grant: &Grant,
        ) -> std::result::Result<ShardHandle, FactoryError> {
            Err(FactoryError::Rejected("platform refused".to_string()))
        }
    }

    fn spec(index: u32) -> ShardSpec {
        ShardSpec::new(ShardCount::new(4).unwrap(), PartitionIndex::new(index))
    }

    #[test]
    fn test_grant_and_commit() {
        let budget = ResourceBudget::new(300);

        let grant = budget.try_grant(100).unwrap();
        assert_eq!(budget.available(), 200);
        assert_eq!(grant.commit(), 100);

        assert_eq!(budget.available(), 200);
        assert_eq!(budget.granted(), 100);
    }

    #[test]
    fn test_uncommitted_grant_refunds() {
        let budget = ResourceBudget::new(100);
        {
            let _grant = budget.try_grant(60).unwrap();
            assert_eq!(budget.available(), 40);
        }
        assert_eq!(budget.available(), 100);
    }

    #[test]
    fn test_insufficient_budget() {
        let budget = ResourceBudget::new(150);
        budget.try_grant(100).unwrap().commit();

        let err = budget.try_grant(100).unwrap_err();
        assert_eq!(
            err,
            InsufficientBudget {
                requested: 100,
                available: 50
            }
        );
        // A failed grant takes nothing.
        assert_eq!(budget.available(), 50);
    }

    #[test]
    fn test_zero_grant_always_succeeds() {
        let budget = ResourceBudget::new(0);
        assert_eq!(budget.try_grant(0).unwrap().commit(), 0);
        assert_eq!(budget.snapshot().granted, 0);
    }

    #[test]
    fn test_concurrent_grants_never_overdraw() {
        let budget = ResourceBudget::new(1000);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || {
                    let mut won = 0u64;
                    while let Ok(grant) = budget.try_grant(7) {
                        won += grant.commit();
                    }
                    won
                })
            })
            .collect();

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1000 - 1000 % 7);
        assert_eq!(budget.available(), 1000 % 7);
        let snap = budget.snapshot();
        assert_eq!(snap.available + snap.granted, snap.capacity);
    }

    #[tokio::test]
    async fn test_provisioner_spends_grant() {
        let budget = ResourceBudget::new(250);
        let provisioner =
            Provisioner::new(Arc::clone(&budget), 100, Arc::new(LocalShardFactory::new(8)));

        let shard = provisioner.create_shard(spec(2)).await.unwrap();
        assert_eq!(shard.spec(), spec(2));
        assert_eq!(budget.available(), 150);
    }

    #[tokio::test]
    async fn test_provisioner_reports_exhausted_budget() {
        let budget = ResourceBudget::new(50);
        let provisioner =
            Provisioner::new(Arc::clone(&budget), 100, Arc::new(LocalShardFactory::new(8)));

        let err = provisioner.create_shard(spec(1)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ProvisioningFailure {
                requested: 100,
                available: 50,
                ..
            }
        ));
        assert_eq!(budget.available(), 50);
    }

    #[tokio::test]
    async fn test_provisioner_refunds_on_factory_failure() {
        let budget = ResourceBudget::new(100);
        let provisioner = Provisioner::new(Arc::clone(&budget), 100, Arc::new(RejectingFactory));

        let err = provisioner.create_shard(spec(0)).await.unwrap_err();
        assert!(matches!(err, Error::ShardUnavailable { .. }));
        assert!(err.to_string().contains("platform refused"));
        assert_eq!(budget.available(), 100);
    }
}
