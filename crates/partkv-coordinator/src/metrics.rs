//! Coordinator metrics and Prometheus exporter
//!
//! # Prometheus Metrics
//!
//! ## Coordinator
//! - `partkv_gets_total` - Get requests routed
//! - `partkv_gets_not_found_total` - Gets that returned no value
//! - `partkv_puts_total` - Put requests acknowledged
//! - `partkv_put_failures_total` - Puts that returned an error
//! - `partkv_shards_created_total` - Shards provisioned
//! - `partkv_provisioning_failures_total` - Creations refused for lack of budget
//! - `partkv_shard_creation_failures_total` - Creations that failed after funding
//! - `partkv_shards_populated` - Populated slots in the shard table
//! - `partkv_shard_slots` - Size of the shard table (N)
//!
//! ## Budget
//! - `partkv_budget_capacity_units` / `partkv_budget_available_units` /
//!   `partkv_budget_granted_units`
//!
//! ## Per shard (labelled by `partition`)
//! - `partkv_shard_entries`, `partkv_shard_gets_total`,
//!   `partkv_shard_hits_total`, `partkv_shard_puts_total`

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::coordinator::Coordinator;

/// Operation counters for one coordinator
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    gets: AtomicU64,
    gets_not_found: AtomicU64,
    puts: AtomicU64,
    put_failures: AtomicU64,
    shards_created: AtomicU64,
    provisioning_failures: AtomicU64,
    creation_failures: AtomicU64,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self, found: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if !found {
            self.gets_not_found.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_put(&self, ok: bool) {
        if ok {
            self.puts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.put_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_shard_created(&self) {
        self.shards_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provisioning_failure(&self) {
        self.provisioning_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn gets_not_found(&self) -> u64 {
        self.gets_not_found.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn put_failures(&self) -> u64 {
        self.put_failures.load(Ordering::Relaxed)
    }

    pub fn shards_created(&self) -> u64 {
        self.shards_created.load(Ordering::Relaxed)
    }

    pub fn provisioning_failures(&self) -> u64 {
        self.provisioning_failures.load(Ordering::Relaxed)
    }

    pub fn creation_failures(&self) -> u64 {
        self.creation_failures.load(Ordering::Relaxed)
    }

    /// Fraction of gets that found a value (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets();
        if gets == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = (gets - self.gets_not_found()) as f64 / gets as f64;
        ratio
    }
}

/// Prometheus text format exporter
#[derive(Debug)]
pub struct PrometheusExporter {
    /// Metrics prefix (e.g., "partkv")
    prefix: String,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self, coordinator: &Coordinator) -> String {
        let mut output = String::with_capacity(4 * 1024);

        self.export_coordinator_metrics(&mut output, coordinator);
        self.export_budget_metrics(&mut output, coordinator);
        self.export_shard_metrics(&mut output, coordinator);

        output
    }

    fn export_coordinator_metrics(&self, output: &mut String, coordinator: &Coordinator) {
        let metrics = coordinator.metrics();

        let counters = [
            ("gets_total", "Get requests routed", metrics.gets()),
            (
                "gets_not_found_total",
                "Get requests that returned no value",
                metrics.gets_not_found(),
            ),
            ("puts_total", "Put requests acknowledged", metrics.puts()),
            (
                "put_failures_total",
                "Put requests that returned an error",
                metrics.put_failures(),
            ),
            (
                "shards_created_total",
                "Shards provisioned",
                metrics.shards_created(),
            ),
            (
                "provisioning_failures_total",
                "Shard creations refused for lack of budget",
                metrics.provisioning_failures(),
            ),
            (
                "shard_creation_failures_total",
                "Shard creations that failed after funding",
                metrics.creation_failures(),
            ),
        ];
        for (name, help, value) in counters {
            self.write_help(output, name, help);
            self.write_type(output, name, "counter");
            self.write_metric(output, name, value);
        }

        self.write_help(output, "shards_populated", "Populated slots in the shard table");
        self.write_type(output, "shards_populated", "gauge");
        self.write_metric(
            output,
            "shards_populated",
            coordinator.populated_partitions().len() as u64,
        );

        self.write_help(output, "shard_slots", "Size of the shard table");
        self.write_type(output, "shard_slots", "gauge");
        self.write_metric(
            output,
            "shard_slots",
            u64::from(coordinator.shard_count().get()),
        );
    }

    fn export_budget_metrics(&self, output: &mut String, coordinator: &Coordinator) {
        let budget = coordinator.budget();

        for (name, help, value) in [
            (
                "budget_capacity_units",
                "Provisioning budget capacity",
                budget.capacity,
            ),
            (
                "budget_available_units",
                "Provisioning budget not yet granted",
                budget.available,
            ),
            (
                "budget_granted_units",
                "Provisioning budget granted to shards",
                budget.granted,
            ),
        ] {
            self.write_help(output, name, help);
            self.write_type(output, name, "gauge");
            self.write_metric(output, name, value);
        }
    }

    fn export_shard_metrics(&self, output: &mut String, coordinator: &Coordinator) {
        let shards = coordinator.shard_stats();
        if shards.is_empty() {
            return;
        }

        let series: [(&str, &str, &str, fn(&partkv_shard::ShardStatsSnapshot) -> u64); 4] = [
            ("shard_entries", "Keys stored in the shard", "gauge", |s| {
                s.entries
            }),
            ("shard_gets_total", "Get requests served by the shard", "counter", |s| {
                s.gets
            }),
            ("shard_hits_total", "Gets that found a value", "counter", |s| s.hits),
            ("shard_puts_total", "Put requests applied by the shard", "counter", |s| {
                s.puts
            }),
        ];

        for (name, help, kind, value) in series {
            self.write_help(output, name, help);
            self.write_type(output, name, kind);
            for (partition, stats) in &shards {
                let partition = partition.to_string();
                self.write_metric_with_labels(
                    output,
                    name,
                    value(stats),
                    &[("partition", &partition)],
                );
            }
        }
    }

    fn write_help(&self, output: &mut String, name: &str, help: &str) {
        let _ = writeln!(output, "# HELP {}_{} {}", self.prefix, name, help);
    }

    fn write_type(&self, output: &mut String, name: &str, metric_type: &str) {
        let _ = writeln!(output, "# TYPE {}_{} {}", self.prefix, name, metric_type);
    }

    fn write_metric(&self, output: &mut String, name: &str, value: u64) {
        let _ = writeln!(output, "{}_{} {}", self.prefix, name, value);
    }

    fn write_metric_with_labels(
        &self,
        output: &mut String,
        name: &str,
        value: u64,
        labels: &[(&str, &str)],
    ) {
        let labels_str: Vec<String> = labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        let _ = writeln!(
            output,
            "{}_{}{{{}}} {}",
            self.prefix,
            name,
            labels_str.join(","),
            value
        );
    }
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new("partkv")
    }
}
