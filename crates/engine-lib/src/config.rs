//! Engine configuration
//!
//! Typed configuration for the analyzer, scheduler and pipeline. Defaults
//! match the fleet's EV metric thresholds and the stock scheduling policy;
//! every knob can be overridden through the binary's environment source.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{MetricThreshold, Priority, ServiceType};

/// Analyzer configuration: per-metric thresholds and trend fitting knobs
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Per-metric warning/critical thresholds
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, MetricThreshold>,

    /// Slopes below this magnitude (units/hour) are classified as stable
    #[serde(default = "default_trend_epsilon")]
    pub trend_epsilon: f64,

    /// Minimum history points required before a forecast is produced
    #[serde(default = "default_min_trend_samples")]
    pub min_trend_samples: usize,
}

fn default_trend_epsilon() -> f64 {
    0.1
}

fn default_min_trend_samples() -> usize {
    3
}

fn default_thresholds() -> HashMap<String, MetricThreshold> {
    let mut thresholds = HashMap::new();
    thresholds.insert(
        "battery_soh".to_string(),
        MetricThreshold::lower_is_worse(80.0, 70.0),
    );
    thresholds.insert(
        "battery_temp".to_string(),
        MetricThreshold::higher_is_worse(40.0, 45.0),
    );
    thresholds.insert(
        "voltage_imbalance".to_string(),
        MetricThreshold::higher_is_worse(0.3, 0.5),
    );
    thresholds.insert(
        "motor_temp".to_string(),
        MetricThreshold::higher_is_worse(75.0, 85.0),
    );
    thresholds.insert(
        "motor_efficiency".to_string(),
        MetricThreshold::lower_is_worse(80.0, 75.0),
    );
    thresholds.insert(
        "coolant_temp".to_string(),
        MetricThreshold::higher_is_worse(85.0, 95.0),
    );
    thresholds.insert(
        "coolant_level".to_string(),
        MetricThreshold::lower_is_worse(30.0, 20.0),
    );
    thresholds
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            trend_epsilon: default_trend_epsilon(),
            min_trend_samples: default_min_trend_samples(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (metric, threshold) in &self.thresholds {
            if !threshold.is_valid() {
                return Err(ConfigError::InvalidThreshold {
                    metric: metric.clone(),
                });
            }
        }
        if self.min_trend_samples < 2 {
            return Err(ConfigError::InvalidValue {
                field: "min_trend_samples",
                reason: "at least 2 points are required for a linear fit".to_string(),
            });
        }
        Ok(())
    }
}

/// Scheduler configuration: slot search horizon, operating window and scoring
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How far into the future the slot search scans
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// Step between candidate slot starts, in minutes
    #[serde(default = "default_slot_granularity")]
    pub slot_granularity_minutes: i64,

    /// Daily operating window start hour (inclusive)
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,

    /// Daily operating window end hour (exclusive for slot starts)
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,

    /// Weight applied to workshop rating in the slot score
    /// (`score = delay_hours - rating_weight * rating`, lower is better)
    #[serde(default = "default_rating_weight")]
    pub rating_weight: f64,

    /// Maximum acceptable delay per priority tier, in hours
    #[serde(default = "default_max_delay_hours")]
    pub max_delay_hours: HashMap<Priority, i64>,

    /// Capability that makes a workshop eligible for any service type
    #[serde(default = "default_wildcard_capability")]
    pub wildcard_capability: ServiceType,
}

fn default_horizon_days() -> i64 {
    30
}

fn default_slot_granularity() -> i64 {
    60
}

fn default_day_start_hour() -> u32 {
    8
}

fn default_day_end_hour() -> u32 {
    18
}

fn default_rating_weight() -> f64 {
    10.0
}

fn default_max_delay_hours() -> HashMap<Priority, i64> {
    let mut delays = HashMap::new();
    delays.insert(Priority::Critical, 24);
    delays.insert(Priority::High, 72);
    delays.insert(Priority::Normal, 168);
    delays.insert(Priority::Low, 336);
    delays
}

fn default_wildcard_capability() -> ServiceType {
    ServiceType::General
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            slot_granularity_minutes: default_slot_granularity(),
            day_start_hour: default_day_start_hour(),
            day_end_hour: default_day_end_hour(),
            rating_weight: default_rating_weight(),
            max_delay_hours: default_max_delay_hours(),
            wildcard_capability: default_wildcard_capability(),
        }
    }
}

impl SchedulerConfig {
    /// Maximum acceptable delay for a priority, falling back to the stock
    /// policy when the tier is missing from an override table
    pub fn max_delay_for(&self, priority: Priority) -> i64 {
        if let Some(hours) = self.max_delay_hours.get(&priority) {
            return *hours;
        }
        match priority {
            Priority::Critical => 24,
            Priority::High => 72,
            Priority::Normal => 168,
            Priority::Low => 336,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(ConfigError::InvalidOperatingWindow {
                start: self.day_start_hour,
                end: self.day_end_hour,
            });
        }
        if self.slot_granularity_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "slot_granularity_minutes",
                reason: "must be positive".to_string(),
            });
        }
        if self.horizon_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "horizon_days",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Pipeline configuration: severity cutoffs and collaborator bounds
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Severity at or above which the scheduling stage is entered
    #[serde(default = "default_booking_threshold")]
    pub booking_threshold: f64,

    /// Severity at or above which the notification stage is entered
    #[serde(default = "default_notify_threshold")]
    pub notify_threshold: f64,

    /// Upper bound on a single notifier call
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    /// How far back metric history is fetched for trend analysis, in days
    #[serde(default = "default_history_window_days")]
    pub history_window_days: i64,
}

fn default_booking_threshold() -> f64 {
    0.6
}

fn default_notify_threshold() -> f64 {
    0.6
}

fn default_notify_timeout_secs() -> u64 {
    5
}

fn default_history_window_days() -> i64 {
    7
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            booking_threshold: default_booking_threshold(),
            notify_threshold: default_notify_threshold(),
            notify_timeout_secs: default_notify_timeout_secs(),
            history_window_days: default_history_window_days(),
        }
    }
}

impl PipelineConfig {
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn history_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.history_window_days)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("booking_threshold", self.booking_threshold),
            ("notify_threshold", self.notify_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{} is outside [0, 1]", value),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.len(), 7);
    }

    #[test]
    fn test_inverted_threshold_rejected() {
        let mut config = AnalyzerConfig::default();
        config.thresholds.insert(
            "battery_soh".to_string(),
            MetricThreshold::lower_is_worse(70.0, 80.0),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_default_delay_bounds() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_delay_for(Priority::Critical), 24);
        assert_eq!(config.max_delay_for(Priority::High), 72);
        assert_eq!(config.max_delay_for(Priority::Normal), 168);
        assert_eq!(config.max_delay_for(Priority::Low), 336);
    }

    #[test]
    fn test_operating_window_validation() {
        let mut config = SchedulerConfig::default();
        config.day_start_hour = 18;
        config.day_end_hour = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_cutoffs_in_range() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        config.notify_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
