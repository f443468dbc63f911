//! Prometheus metrics for the orchestrator and the agent.
//!
//! Handles are registered once in [`MetricsCollector::new`]; recording is a
//! no-op until a global recorder is installed by [`init_metrics`].

use anyhow::{Context, Result};
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

#[derive(Clone)]
pub struct MetricsCollector {
    // orchestrator
    expressions_submitted_total: Counter,
    expressions_rejected_total: Counter,
    expressions_solved_total: Counter,
    expressions_failed_total: Counter,
    tasks_created_total: Counter,
    tasks_dispatched_total: Counter,
    tasks_completed_total: Counter,
    tasks_reclaimed_total: Counter,
    stale_reports_total: Counter,
    reclaim_timers_active: Gauge,

    // agent
    agent_tasks_computed_total: Counter,
    agent_compute_duration: Histogram,
    agent_fetch_failures_total: Counter,
    agent_report_failures_total: Counter,
    agent_workers: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            expressions_submitted_total: counter!("calc_expressions_submitted_total"),
            expressions_rejected_total: counter!("calc_expressions_rejected_total"),
            expressions_solved_total: counter!("calc_expressions_solved_total"),
            expressions_failed_total: counter!("calc_expressions_failed_total"),
            tasks_created_total: counter!("calc_tasks_created_total"),
            tasks_dispatched_total: counter!("calc_tasks_dispatched_total"),
            tasks_completed_total: counter!("calc_tasks_completed_total"),
            tasks_reclaimed_total: counter!("calc_tasks_reclaimed_total"),
            stale_reports_total: counter!("calc_stale_reports_total"),
            reclaim_timers_active: gauge!("calc_reclaim_timers_active"),
            agent_tasks_computed_total: counter!("calc_agent_tasks_computed_total"),
            agent_compute_duration: histogram!("calc_agent_compute_duration_seconds"),
            agent_fetch_failures_total: counter!("calc_agent_fetch_failures_total"),
            agent_report_failures_total: counter!("calc_agent_report_failures_total"),
            agent_workers: gauge!("calc_agent_workers"),
        }
    }

    pub fn record_expression_submitted(&self) {
        self.expressions_submitted_total.increment(1);
    }

    pub fn record_expression_rejected(&self) {
        self.expressions_rejected_total.increment(1);
    }

    pub fn record_expression_solved(&self) {
        self.expressions_solved_total.increment(1);
    }

    pub fn record_expression_failed(&self) {
        self.expressions_failed_total.increment(1);
    }

    pub fn record_task_created(&self) {
        self.tasks_created_total.increment(1);
    }

    pub fn record_task_dispatched(&self) {
        self.tasks_dispatched_total.increment(1);
    }

    pub fn record_task_completed(&self) {
        self.tasks_completed_total.increment(1);
    }

    pub fn record_task_reclaimed(&self) {
        self.tasks_reclaimed_total.increment(1);
    }

    /// A result arrived for a task that was already done.
    pub fn record_stale_report(&self) {
        self.stale_reports_total.increment(1);
    }

    pub fn set_reclaim_timers(&self, active: usize) {
        self.reclaim_timers_active.set(active as f64);
    }

    pub fn record_agent_task(&self, duration_seconds: f64) {
        self.agent_tasks_computed_total.increment(1);
        self.agent_compute_duration.record(duration_seconds);
    }

    pub fn record_agent_fetch_failure(&self) {
        self.agent_fetch_failures_total.increment(1);
    }

    pub fn record_agent_report_failure(&self) {
        self.agent_report_failures_total.increment(1);
    }

    pub fn set_agent_workers(&self, workers: usize) {
        self.agent_workers.set(workers as f64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global Prometheus recorder with an HTTP scrape endpoint on
/// `port`. Must be called from inside a Tokio runtime.
pub fn init_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("failed to install Prometheus exporter")?;

    info!(port, "metrics exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        let metrics = MetricsCollector::new();
        metrics.record_expression_submitted();
        metrics.record_task_reclaimed();
        metrics.set_reclaim_timers(3);
        metrics.record_agent_task(0.25);
    }
}
