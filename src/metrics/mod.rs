//! Prometheus metrics for crawl, ingest, notification and sweep cycles
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metric operations become no-ops.

use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec,
    TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct PipelineMetrics {
    pages: CounterVec,
    candidates: CounterVec,
    ingest_outcomes: CounterVec,
    notifications: CounterVec,
    sweep_outcomes: CounterVec,
    cycle_duration: HistogramVec,
}

static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default Prometheus registry
///
/// Idempotent: later calls return `Ok(())` without registering again.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = PipelineMetrics {
        pages: register_counter_vec!(
            "immowatch_pages_total",
            "Result pages fetched per source and outcome",
            &["source", "outcome"]
        )?,
        candidates: register_counter_vec!(
            "immowatch_candidates_total",
            "Listing candidates extracted per source",
            &["source"]
        )?,
        ingest_outcomes: register_counter_vec!(
            "immowatch_ingest_total",
            "Ingested candidates by outcome",
            &["outcome"]
        )?,
        notifications: register_counter_vec!(
            "immowatch_notifications_total",
            "Notification deliveries by outcome",
            &["outcome"]
        )?,
        sweep_outcomes: register_counter_vec!(
            "immowatch_sweep_total",
            "Availability checks by resulting state",
            &["state"]
        )?,
        cycle_duration: register_histogram_vec!(
            "immowatch_cycle_duration_seconds",
            "Duration of crawl and sweep cycles",
            &["cycle"],
            vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
        )?,
    };

    PIPELINE_METRICS
        .set(metrics)
        .map_err(|_| "Pipeline metrics already initialized")?;

    Ok(())
}

/// Check if metrics are initialized
pub fn metrics_initialized() -> bool {
    PIPELINE_METRICS.get().is_some()
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// ============================================================================
// Recording
// ============================================================================

/// Record a fetched result page
pub fn record_page(source: &str, success: bool) {
    let Some(m) = PIPELINE_METRICS.get() else {
        return;
    };
    let outcome = if success { "fetched" } else { "failed" };
    m.pages.with_label_values(&[source, outcome]).inc();
}

/// Record candidates extracted from one page
pub fn record_candidates(source: &str, count: usize) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.candidates
            .with_label_values(&[source])
            .inc_by(count as f64);
    }
}

/// Record one ingest outcome (`inserted`, `already_exists`, `rejected`)
pub fn record_ingest(outcome: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.ingest_outcomes.with_label_values(&[outcome]).inc();
    }
}

/// Record one notification delivery
pub fn record_notification(delivered: bool) {
    if let Some(m) = PIPELINE_METRICS.get() {
        let outcome = if delivered { "sent" } else { "failed" };
        m.notifications.with_label_values(&[outcome]).inc();
    }
}

/// Record one availability check (`live`, `removed`, `unsupported`, `unverified`)
pub fn record_sweep(state: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.sweep_outcomes.with_label_values(&[state]).inc();
    }
}

/// Timer that records cycle duration when dropped
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.observe_duration();
        }
    }
}

/// Start timing a cycle (`crawl` or `sweep`)
pub fn start_cycle_timer(cycle: &str) -> MetricsTimer {
    let timer = PIPELINE_METRICS
        .get()
        .map(|m| m.cycle_duration.with_label_values(&[cycle]).start_timer());
    MetricsTimer { timer }
}
