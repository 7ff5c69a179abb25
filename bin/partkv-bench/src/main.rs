//! partkv Bench
//!
//! Drives a random get/put workload through a coordinator and reports
//! throughput, shard population, budget use and the exported metrics.

mod workload;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use partkv_common::{Config, ShardCount};
use partkv_coordinator::{BudgetSnapshot, Coordinator};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::workload::{WorkloadSpec, WorkloadTally};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "partkv-bench", about = "partkv load driver")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PARTKV_CONFIG")]
    config: Option<PathBuf>,

    /// Number of partitions (overrides config)
    #[arg(long)]
    shards: Option<u32>,

    /// Provisioning budget in units (overrides config)
    #[arg(long)]
    budget: Option<u64>,

    /// Units granted per shard (overrides config)
    #[arg(long)]
    grant: Option<u64>,

    /// Size of the key space
    #[arg(long, default_value_t = 10_000)]
    keys: u64,

    /// Total operations
    #[arg(long, default_value_t = 100_000)]
    ops: u64,

    /// Concurrent workers
    #[arg(long, default_value_t = 16)]
    concurrency: usize,

    /// Fraction of operations that are reads (0.0 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    read_ratio: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Print a JSON summary instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(shards) = self.shards {
            config.coordinator.shard_count =
                ShardCount::new(shards).context("--shards must be at least 1")?;
        }
        if let Some(budget) = self.budget {
            config.provisioning.budget = budget;
        }
        if let Some(grant) = self.grant {
            config.provisioning.shard_grant = grant;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if !(0.0..=1.0).contains(&self.read_ratio) {
            anyhow::bail!("--read-ratio must be between 0.0 and 1.0");
        }
        config.validate()?;
        Ok(())
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Summary {
    shard_count: u32,
    shard_grant: u64,
    elapsed_secs: f64,
    ops_per_sec: f64,
    hit_ratio: f64,
    populated_shards: usize,
    budget_capacity: u64,
    budget_available: u64,
    budget_granted: u64,
    tally: WorkloadTally,
}

impl Summary {
    #[allow(clippy::cast_precision_loss)]
    fn new(coordinator: &Coordinator, tally: WorkloadTally, elapsed_secs: f64) -> Self {
        let BudgetSnapshot {
            capacity,
            available,
            granted,
        } = coordinator.budget();
        let ops_per_sec = if elapsed_secs > 0.0 {
            tally.operations() as f64 / elapsed_secs
        } else {
            0.0
        };
        Self {
            shard_count: coordinator.shard_count().get(),
            shard_grant: coordinator.shard_grant(),
            elapsed_secs,
            ops_per_sec,
            hit_ratio: coordinator.metrics().hit_ratio(),
            populated_shards: coordinator.populated_partitions().len(),
            budget_capacity: capacity,
            budget_available: available,
            budget_granted: granted,
            tally,
        }
    }

    fn print_text(&self, metrics: &str) {
        println!("partkv bench");
        println!("  shards:            {}", self.shard_count);
        println!(
            "  populated shards:  {} ({} units each)",
            self.populated_shards, self.shard_grant
        );
        println!(
            "  budget:            {} granted / {} available / {} capacity",
            self.budget_granted, self.budget_available, self.budget_capacity
        );
        println!(
            "  operations:        {} gets, {} puts, {} provisioning failures, {} unavailable",
            self.tally.gets, self.tally.puts, self.tally.provisioning_failures, self.tally.unavailable
        );
        println!("  hit ratio:         {:.3}", self.hit_ratio);
        println!(
            "  elapsed:           {:.3}s ({:.0} ops/s)",
            self.elapsed_secs, self.ops_per_sec
        );
        println!();
        print!("{metrics}");
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("load configuration")?;
    args.apply(&mut config)?;

    // Tracing: RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(
        shard_count = %config.coordinator.shard_count,
        budget = config.provisioning.budget,
        shard_grant = config.provisioning.shard_grant,
        fundable_shards = config.provisioning.fundable_shards(),
        "Starting partkv bench"
    );

    let coordinator = Arc::new(Coordinator::new(&config));
    let spec = WorkloadSpec {
        keys: args.keys,
        ops: args.ops,
        concurrency: args.concurrency,
        read_ratio: args.read_ratio,
        seed: args.seed,
    };

    let (tally, elapsed) = workload::run(Arc::clone(&coordinator), spec).await?;
    info!(
        operations = tally.operations(),
        elapsed_ms = elapsed.as_millis(),
        "Workload finished"
    );

    let summary = Summary::new(&coordinator, tally, elapsed.as_secs_f64());
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize summary")?
        );
    } else {
        summary.print_text(&coordinator.export_prometheus());
    }

    Ok(())
}
