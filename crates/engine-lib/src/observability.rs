//! Observability infrastructure for the maintenance engine
//!
//! Provides:
//! - Prometheus metrics (pipeline throughput, stage latency, booking outcomes)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, Histogram, IntCounter,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct PipelineMetricsInner {
    events_processed: IntCounter,
    events_failed: IntCounter,
    anomalies_detected: IntCounter,
    bookings_committed: IntCounter,
    bookings_unplaceable: IntCounter,
    notify_failures: IntCounter,
    analyze_latency_seconds: Histogram,
    schedule_latency_seconds: Histogram,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            events_processed: register_int_counter!(
                "maintenance_engine_events_processed_total",
                "Total telemetry events run through the pipeline"
            )
            .expect("Failed to register events_processed"),

            events_failed: register_int_counter!(
                "maintenance_engine_events_failed_total",
                "Total telemetry events whose pipeline ended in failure"
            )
            .expect("Failed to register events_failed"),

            anomalies_detected: register_int_counter!(
                "maintenance_engine_anomalies_detected_total",
                "Total metric threshold breaches detected"
            )
            .expect("Failed to register anomalies_detected"),

            bookings_committed: register_int_counter!(
                "maintenance_engine_bookings_committed_total",
                "Total workshop bookings committed"
            )
            .expect("Failed to register bookings_committed"),

            bookings_unplaceable: register_int_counter!(
                "maintenance_engine_bookings_unplaceable_total",
                "Total booking attempts with no slot inside the delay bound"
            )
            .expect("Failed to register bookings_unplaceable"),

            notify_failures: register_int_counter!(
                "maintenance_engine_notify_failures_total",
                "Total notification deliveries that failed or timed out"
            )
            .expect("Failed to register notify_failures"),

            analyze_latency_seconds: register_histogram!(
                "maintenance_engine_analyze_latency_seconds",
                "Time spent evaluating a telemetry reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analyze_latency_seconds"),

            schedule_latency_seconds: register_histogram!(
                "maintenance_engine_schedule_latency_seconds",
                "Time spent searching and committing a booking slot",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register schedule_latency_seconds"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_events_processed(&self) {
        self.inner().events_processed.inc();
    }

    pub fn inc_events_failed(&self) {
        self.inner().events_failed.inc();
    }

    pub fn add_anomalies_detected(&self, count: u64) {
        self.inner().anomalies_detected.inc_by(count);
    }

    pub fn inc_bookings_committed(&self) {
        self.inner().bookings_committed.inc();
    }

    pub fn inc_bookings_unplaceable(&self) {
        self.inner().bookings_unplaceable.inc();
    }

    pub fn inc_notify_failures(&self) {
        self.inner().notify_failures.inc();
    }

    pub fn observe_analyze_latency(&self, duration_secs: f64) {
        self.inner().analyze_latency_seconds.observe(duration_secs);
    }

    pub fn observe_schedule_latency(&self, duration_secs: f64) {
        self.inner().schedule_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for pipeline events
///
/// Provides consistent JSON-formatted logging for verdicts, bookings and
/// stage failures.
#[derive(Clone)]
pub struct FleetLogger {
    fleet: String,
}

impl FleetLogger {
    pub fn new(fleet: impl Into<String>) -> Self {
        Self {
            fleet: fleet.into(),
        }
    }

    /// Log the analyzer's verdict for one reading
    pub fn log_verdict(
        &self,
        vehicle_id: &str,
        overall_severity: f64,
        anomaly_count: usize,
        recommended_status: &str,
    ) {
        if overall_severity >= 0.8 {
            warn!(
                event = "verdict_evaluated",
                fleet = %self.fleet,
                vehicle_id = %vehicle_id,
                overall_severity = overall_severity,
                anomaly_count = anomaly_count,
                recommended_status = %recommended_status,
                "Vehicle requires immediate attention"
            );
        } else {
            info!(
                event = "verdict_evaluated",
                fleet = %self.fleet,
                vehicle_id = %vehicle_id,
                overall_severity = overall_severity,
                anomaly_count = anomaly_count,
                recommended_status = %recommended_status,
                "Verdict evaluated"
            );
        }
    }

    /// Log a single metric breach
    pub fn log_anomaly(&self, vehicle_id: &str, metric: &str, value: f64, severity: &str) {
        match severity {
            "critical" => {
                warn!(
                    event = "anomaly_detected",
                    fleet = %self.fleet,
                    vehicle_id = %vehicle_id,
                    metric = %metric,
                    value = value,
                    severity = %severity,
                    "Critical anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    fleet = %self.fleet,
                    vehicle_id = %vehicle_id,
                    metric = %metric,
                    value = value,
                    severity = %severity,
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log a committed booking
    pub fn log_booking(
        &self,
        vehicle_id: &str,
        workshop_id: &str,
        service_type: &str,
        priority: &str,
        start: &str,
    ) {
        info!(
            event = "booking_committed",
            fleet = %self.fleet,
            vehicle_id = %vehicle_id,
            workshop_id = %workshop_id,
            service_type = %service_type,
            priority = %priority,
            start = %start,
            "Workshop booking committed"
        );
    }

    /// Log a booking attempt that found no slot inside the delay bound
    pub fn log_no_availability(&self, vehicle_id: &str, priority: &str, max_delay_hours: i64) {
        warn!(
            event = "booking_unplaceable",
            fleet = %self.fleet,
            vehicle_id = %vehicle_id,
            priority = %priority,
            max_delay_hours = max_delay_hours,
            "No conflict-free slot inside the delay bound"
        );
    }

    /// Log a non-fatal stage failure
    pub fn log_stage_failure(&self, vehicle_id: &str, stage: &str, detail: &str) {
        warn!(
            event = "stage_failed",
            fleet = %self.fleet,
            vehicle_id = %vehicle_id,
            stage = %stage,
            detail = %detail,
            "Pipeline stage failed"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str, workshop_count: usize) {
        info!(
            event = "engine_started",
            fleet = %self.fleet,
            engine_version = %version,
            workshop_count = workshop_count,
            "Maintenance engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            fleet = %self.fleet,
            reason = %reason,
            "Maintenance engine shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_creation() {
        // Note: metrics live in the Prometheus global registry, so this
        // exercises the handle rather than asserting on registry state.
        let metrics = PipelineMetrics::new();

        metrics.inc_events_processed();
        metrics.add_anomalies_detected(2);
        metrics.inc_bookings_committed();
        metrics.observe_analyze_latency(0.001);
        metrics.observe_schedule_latency(0.002);
    }

    #[test]
    fn test_fleet_logger_creation() {
        let logger = FleetLogger::new("test-fleet");
        assert_eq!(logger.fleet, "test-fleet");
    }
}
