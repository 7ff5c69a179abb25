//! Random get/put workload against a coordinator

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use partkv_common::{Error, Key};
use partkv_coordinator::Coordinator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

/// Workload shape
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    /// Keys are drawn uniformly from `[0, keys)`
    pub keys: u64,
    /// Total operations across all workers
    pub ops: u64,
    /// Concurrent workers
    pub concurrency: usize,
    /// Probability that an operation is a get
    pub read_ratio: f64,
    pub seed: u64,
}

/// Outcome counts for one worker or a whole run
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct WorkloadTally {
    pub gets: u64,
    pub hits: u64,
    pub puts: u64,
    pub provisioning_failures: u64,
    pub unavailable: u64,
}

impl WorkloadTally {
    fn merge(&mut self, other: Self) {
        self.gets += other.gets;
        self.hits += other.hits;
        self.puts += other.puts;
        self.provisioning_failures += other.provisioning_failures;
        self.unavailable += other.unavailable;
    }

    fn record_error(&mut self, err: &Error) {
        if err.is_provisioning() {
            self.provisioning_failures += 1;
        } else {
            self.unavailable += 1;
        }
    }

    pub const fn operations(&self) -> u64 {
        self.gets + self.puts + self.provisioning_failures + self.unavailable
    }
}

/// Run the workload to completion
pub async fn run(
    coordinator: Arc<Coordinator>,
    spec: WorkloadSpec,
) -> Result<(WorkloadTally, Duration)> {
    let workers = spec.concurrency.max(1) as u64;
    let per_worker = spec.ops / workers;
    let remainder = spec.ops % workers;

    let started = Instant::now();
    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let ops = per_worker + u64::from(worker < remainder);
            let rng = StdRng::seed_from_u64(spec.seed.wrapping_add(worker));
            tokio::spawn(worker_loop(Arc::clone(&coordinator), spec, ops, rng))
        })
        .collect();

    let mut total = WorkloadTally::default();
    for tally in futures::future::try_join_all(handles)
        .await
        .context("workload worker panicked")?
    {
        total.merge(tally);
    }
    Ok((total, started.elapsed()))
}

async fn worker_loop(
    coordinator: Arc<Coordinator>,
    spec: WorkloadSpec,
    ops: u64,
    mut rng: StdRng,
) -> WorkloadTally {
    let mut tally = WorkloadTally::default();

    for _ in 0..ops {
        let key = Key::new(rng.gen_range(0..spec.keys.max(1)));
        if rng.gen_bool(spec.read_ratio) {
            match coordinator.get(key).await {
                Ok(value) => {
                    tally.gets += 1;
                    tally.hits += u64::from(value.is_some());
                }
                Err(e) => tally.record_error(&e),
            }
        } else {
            let value = format!("v{}", rng.r#gen::<u32>());
            match coordinator.put(key, value).await {
                Ok(()) => tally.puts += 1,
                Err(e) => {
                    debug!(%key, error = %e, "put failed");
                    tally.record_error(&e);
                }
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use partkv_common::Config;

    fn spec(ops: u64, read_ratio: f64) -> WorkloadSpec {
        WorkloadSpec {
            keys: 64,
            ops,
            concurrency: 3,
            read_ratio,
            seed: 7,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_every_operation() {
        let coordinator = Arc::new(Coordinator::new(&Config::default()));
        let (tally, _) = run(Arc::clone(&coordinator), spec(100, 0.5)).await.unwrap();

        assert_eq!(tally.operations(), 100);
        assert_eq!(tally.provisioning_failures, 0);
        assert_eq!(coordinator.metrics().puts(), tally.puts);
        assert_eq!(coordinator.metrics().gets(), tally.gets);
    }

    #[tokio::test]
    async fn test_read_only_workload_creates_no_shards() {
        let coordinator = Arc::new(Coordinator::new(&Config::default()));
        let (tally, _) = run(Arc::clone(&coordinator), spec(50, 1.0)).await.unwrap();

        assert_eq!(tally.gets, 50);
        assert_eq!(tally.hits, 0);
        assert!(coordinator.populated_partitions().is_empty());
    }

    #[tokio::test]
    async fn test_small_budget_reports_provisioning_failures() {
        let mut config = Config::default();
        config.provisioning.budget = 200;
        let coordinator = Arc::new(Coordinator::new(&config));

        let (tally, _) = run(Arc::clone(&coordinator), spec(200, 0.0)).await.unwrap();

        assert_eq!(coordinator.populated_partitions().len(), 2);
        assert!(tally.provisioning_failures > 0);
        assert_eq!(tally.puts + tally.provisioning_failures, 200);
    }
}
