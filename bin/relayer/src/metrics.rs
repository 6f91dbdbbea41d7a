//! Prometheus metrics for the relayer.
//!
//! All metrics are aggregated in the [`Metrics`] struct. Recording is a no-op
//! until an exporter is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Aggregated metrics for the relay engine.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        // Cycle metrics
        describe_counter!(
            "relayer_cycles_total",
            "Total number of relay cycles executed"
        );
        describe_counter!(
            "relayer_cycles_success_total",
            "Total number of relay cycles that completed"
        );
        describe_counter!(
            "relayer_cycles_failure_total",
            "Total number of relay cycles that aborted"
        );
        describe_histogram!(
            "relayer_cycle_duration_seconds",
            "Duration of each relay cycle in seconds"
        );

        describe_counter!(
            "relayer_windows_committed_total",
            "Scan windows durably committed to the checkpoint"
        );

        // RPC metrics
        describe_counter!(
            "relayer_rpc_retries_total",
            "Retried source chain RPC calls by operation"
        );

        // Deposit metrics
        describe_counter!(
            "relayer_deposits_relayed_total",
            "Deposits turned into signed mint instructions"
        );
        describe_counter!(
            "relayer_deposits_skipped_total",
            "Deposits skipped because they were already processed"
        );
        describe_counter!(
            "relayer_integrity_failures_total",
            "Logs that could not be turned into a valid deposit"
        );

        // Progress gauges
        describe_gauge!(
            "relayer_chain_head_block",
            "Latest source chain head seen"
        );
        describe_gauge!(
            "relayer_last_processed_block",
            "Highest committed source chain block"
        );
    }

    /// Record a completed cycle.
    pub fn record_cycle(&self, success: bool, duration: Duration) {
        counter!("relayer_cycles_total").increment(1);
        histogram!("relayer_cycle_duration_seconds").record(duration.as_secs_f64());

        if success {
            counter!("relayer_cycles_success_total").increment(1);
        } else {
            counter!("relayer_cycles_failure_total").increment(1);
        }
    }

    pub fn record_window_committed(&self, to_block: u64) {
        counter!("relayer_windows_committed_total").increment(1);
        gauge!("relayer_last_processed_block").set(to_block as f64);
    }

    pub fn record_rpc_retries(&self, operation: &'static str, retries: usize) {
        counter!("relayer_rpc_retries_total", "operation" => operation).increment(retries as u64);
    }

    pub fn record_deposit_relayed(&self) {
        counter!("relayer_deposits_relayed_total").increment(1);
    }

    pub fn record_deposits_skipped(&self, count: usize) {
        counter!("relayer_deposits_skipped_total").increment(count as u64);
    }

    pub fn record_integrity_failure(&self) {
        counter!("relayer_integrity_failures_total").increment(1);
    }

    pub fn set_chain_head(&self, block: u64) {
        gauge!("relayer_chain_head_block").set(block as f64);
    }

    pub fn set_last_processed_block(&self, block: u64) {
        gauge!("relayer_last_processed_block").set(block as f64);
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
