//! Vehicle health analysis
//!
//! Evaluates each telemetry reading against the configured per-metric
//! thresholds and fits trends over recent history. The analyzer is pure:
//! it touches no collaborators and never blocks.

mod trend;

pub use trend::TrendAnalyzer;

use std::collections::HashMap;

use chrono::Utc;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::models::{
    Anomaly, HealthVerdict, MetricPoint, Severity, TelemetryReading, ThresholdDirection,
    VehicleStatus,
};

/// Evaluates telemetry readings into health verdicts
pub struct HealthAnalyzer {
    config: AnalyzerConfig,
    trend: TrendAnalyzer,
}

impl HealthAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let trend = TrendAnalyzer::new(config.trend_epsilon, config.min_trend_samples);
        Self { config, trend }
    }

    /// Evaluate one reading, with per-metric history for trend analysis.
    ///
    /// `history` maps metric name to points sorted by timestamp ascending;
    /// metrics absent from the map simply get no forecast. The only fatal
    /// condition is a reading that cannot be attributed to a vehicle.
    pub fn evaluate(
        &self,
        reading: &TelemetryReading,
        history: &HashMap<String, Vec<MetricPoint>>,
    ) -> Result<HealthVerdict, AnalyzerError> {
        if reading.vehicle_id.trim().is_empty() {
            return Err(AnalyzerError::MalformedReading(
                "reading has no vehicle id".to_string(),
            ));
        }

        let mut anomalies = Vec::new();

        for (metric, value) in reading.metrics() {
            if !value.is_finite() {
                continue;
            }
            let Some(threshold) = self.config.thresholds.get(metric) else {
                continue;
            };
            if let Some(severity) = threshold.classify(value) {
                anomalies.push(Anomaly {
                    metric: metric.to_string(),
                    value,
                    threshold: match severity {
                        Severity::Critical => threshold.critical,
                        Severity::Warning => threshold.warning,
                    },
                    severity,
                    message: breach_message(metric, value, threshold, severity),
                });
            }
        }

        let mut forecasts = Vec::new();
        for (metric, points) in history {
            // Trends need a polarity, so only configured metrics get forecasts
            let Some(threshold) = self.config.thresholds.get(metric) else {
                continue;
            };
            if let Some(forecast) = self.trend.analyze(metric, points, threshold) {
                forecasts.push(forecast);
            }
        }
        forecasts.sort_by(|a, b| a.metric.cmp(&b.metric));

        let overall_severity = anomalies
            .iter()
            .map(|a| a.severity.score())
            .fold(0.0_f64, f64::max);

        let recommended_status = if anomalies.iter().any(|a| a.severity == Severity::Critical) {
            VehicleStatus::Critical
        } else if !anomalies.is_empty() {
            VehicleStatus::Warning
        } else {
            VehicleStatus::Operational
        };

        Ok(HealthVerdict {
            vehicle_id: reading.vehicle_id.clone(),
            overall_severity,
            requires_immediate_attention: overall_severity >= 0.8,
            anomalies,
            forecasts,
            recommended_status,
            evaluated_at: Utc::now(),
        })
    }
}

fn breach_message(
    metric: &str,
    value: f64,
    threshold: &crate::models::MetricThreshold,
    severity: Severity,
) -> String {
    let (bound, relation) = match severity {
        Severity::Critical => (threshold.critical, "critical"),
        Severity::Warning => (threshold.warning, "warning"),
    };
    match threshold.direction {
        ThresholdDirection::LowerIsWorse => format!(
            "{} at {:.2} is below the {} threshold of {:.2}",
            metric, value, relation, bound
        ),
        ThresholdDirection::HigherIsWorse => format!(
            "{} at {:.2} is above the {} threshold of {:.2}",
            metric, value, relation, bound
        ),
    }
}
