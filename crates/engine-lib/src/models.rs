//! Core data models for the fleet maintenance engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity tier of a single metric breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    /// Numeric severity score used for aggregation (warning 0.6, critical 1.0)
    pub fn score(&self) -> f64 {
        match self {
            Severity::Warning => 0.6,
            Severity::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Whether breaching a threshold means the value is too low or too high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Values below the thresholds are unhealthy (e.g. battery state of health)
    LowerIsWorse,
    /// Values above the thresholds are unhealthy (e.g. temperatures)
    HigherIsWorse,
}

/// Warning/critical threshold pair for a single metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub warning: f64,
    pub critical: f64,
    pub direction: ThresholdDirection,
}

impl MetricThreshold {
    pub fn lower_is_worse(warning: f64, critical: f64) -> Self {
        Self {
            warning,
            critical,
            direction: ThresholdDirection::LowerIsWorse,
        }
    }

    pub fn higher_is_worse(warning: f64, critical: f64) -> Self {
        Self {
            warning,
            critical,
            direction: ThresholdDirection::HigherIsWorse,
        }
    }

    /// Classify a value against this threshold pair
    pub fn classify(&self, value: f64) -> Option<Severity> {
        match self.direction {
            ThresholdDirection::LowerIsWorse => {
                if value < self.critical {
                    Some(Severity::Critical)
                } else if value < self.warning {
                    Some(Severity::Warning)
                } else {
                    None
                }
            }
            ThresholdDirection::HigherIsWorse => {
                if value > self.critical {
                    Some(Severity::Critical)
                } else if value > self.warning {
                    Some(Severity::Warning)
                } else {
                    None
                }
            }
        }
    }

    /// The critical threshold must be strictly more extreme than the warning
    /// threshold in the configured direction.
    pub fn is_valid(&self) -> bool {
        match self.direction {
            ThresholdDirection::LowerIsWorse => self.critical < self.warning,
            ThresholdDirection::HigherIsWorse => self.critical > self.warning,
        }
    }
}

/// One telemetry reading from a vehicle
///
/// The metric set is fixed; individual metrics may be absent when a sensor
/// did not report. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub battery_soh: Option<f64>,
    pub battery_temp: Option<f64>,
    pub voltage_imbalance: Option<f64>,
    pub motor_temp: Option<f64>,
    pub motor_efficiency: Option<f64>,
    pub coolant_temp: Option<f64>,
    pub coolant_level: Option<f64>,
}

/// Names of all metrics a reading can carry, in a stable order
pub const METRIC_NAMES: [&str; 7] = [
    "battery_soh",
    "battery_temp",
    "voltage_imbalance",
    "motor_temp",
    "motor_efficiency",
    "coolant_temp",
    "coolant_level",
];

impl TelemetryReading {
    /// Create an empty reading for a vehicle (all metrics absent)
    pub fn new(vehicle_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            battery_soh: None,
            battery_temp: None,
            voltage_imbalance: None,
            motor_temp: None,
            motor_efficiency: None,
            coolant_temp: None,
            coolant_level: None,
        }
    }

    /// Iterate over `(metric_name, value)` pairs for metrics that are present
    pub fn metrics(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("battery_soh", self.battery_soh),
            ("battery_temp", self.battery_temp),
            ("voltage_imbalance", self.voltage_imbalance),
            ("motor_temp", self.motor_temp),
            ("motor_efficiency", self.motor_efficiency),
            ("coolant_temp", self.coolant_temp),
            ("coolant_level", self.coolant_level),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

/// A single timestamped metric observation from the history store
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One metric breach against its configured threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
}

/// Direction of a metric trend, oriented by the metric's polarity:
/// `Declining` always means "moving toward the bad side".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Linear-trend forecast for one metric over its recent history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendForecast {
    pub metric: String,
    pub direction: TrendDirection,
    /// Absolute rate of change in metric units per hour
    pub rate_per_hour: f64,
    /// Goodness of fit (R²) clamped to [0, 1]
    pub confidence: f64,
    /// Projected hours until the critical threshold is crossed, if declining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_to_critical: Option<f64>,
}

/// Recommended operating status derived from a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Operational,
    Warning,
    Critical,
}

/// The analyzer's complete assessment of one telemetry reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub vehicle_id: String,
    /// Max of individual anomaly severity scores, 0.0 when healthy
    pub overall_severity: f64,
    pub requires_immediate_attention: bool,
    pub anomalies: Vec<Anomaly>,
    pub forecasts: Vec<TrendForecast>,
    pub recommended_status: VehicleStatus,
    pub evaluated_at: DateTime<Utc>,
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Service a workshop can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Inspection,
    Preventive,
    Corrective,
    Emergency,
    BatteryService,
    MotorService,
    CoolingService,
    /// Wildcard capability: a workshop offering this accepts any service type
    General,
}

impl ServiceType {
    /// Default service duration in minutes
    pub fn default_duration_minutes(&self) -> i64 {
        match self {
            ServiceType::Inspection => 60,
            ServiceType::Preventive => 120,
            ServiceType::Corrective => 180,
            ServiceType::Emergency => 240,
            ServiceType::BatteryService => 90,
            ServiceType::MotorService => 150,
            ServiceType::CoolingService => 120,
            ServiceType::General => 120,
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceType::Inspection => "inspection",
            ServiceType::Preventive => "preventive",
            ServiceType::Corrective => "corrective",
            ServiceType::Emergency => "emergency",
            ServiceType::BatteryService => "battery_service",
            ServiceType::MotorService => "motor_service",
            ServiceType::CoolingService => "cooling_service",
            ServiceType::General => "general",
        };
        write!(f, "{}", name)
    }
}

/// Urgency classification bounding the acceptable scheduling delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Derive a booking priority from an overall severity score
    pub fn from_severity(severity: f64) -> Self {
        if severity >= 0.8 {
            Priority::Critical
        } else if severity >= 0.6 {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// A workshop that can service fleet vehicles
///
/// Workshop identity and capabilities are static configuration; only the
/// associated calendar mutates at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workshop {
    pub id: String,
    pub name: String,
    pub location: String,
    pub capabilities: Vec<ServiceType>,
    pub rating: f64,
}

impl Workshop {
    pub fn offers(&self, service: ServiceType, wildcard: ServiceType) -> bool {
        self.capabilities.contains(&service) || self.capabilities.contains(&wildcard)
    }
}

/// A request to book a workshop slot for a vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub vehicle_id: String,
    pub service_type: ServiceType,
    pub priority: Priority,
    /// Optional preferred window; slots outside it are tried only as fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BookingRequest {
    pub fn new(vehicle_id: impl Into<String>, service_type: ServiceType, priority: Priority) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            service_type,
            priority,
            preferred_window: None,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        self.service_type.default_duration_minutes()
    }
}

/// Lifecycle state of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Status transitions only move forward, except `Cancelled`, which is
    /// reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Scheduled, Confirmed) | (Confirmed, InProgress) | (InProgress, Completed) => true,
            (Scheduled, Cancelled) | (Confirmed, Cancelled) | (InProgress, Cancelled) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// A committed workshop booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub vehicle_id: String,
    pub workshop_id: String,
    pub service_type: ServiceType,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub priority: Priority,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::minutes(self.duration_minutes)
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Ingested,
    Analyzed,
    Scheduled,
    Notified,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Ingested => write!(f, "ingested"),
            PipelineStage::Analyzed => write!(f, "analyzed"),
            PipelineStage::Scheduled => write!(f, "scheduled"),
            PipelineStage::Notified => write!(f, "notified"),
        }
    }
}

/// Outcome of one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome", content = "detail")]
pub enum StageOutcome {
    Success,
    Failed(String),
    Skipped(String),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }
}

/// Record of one executed (or skipped) stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub outcome: StageOutcome,
}

/// Final disposition of an event's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Completed,
    Failed,
}

/// The aggregated, always-returned outcome of one event's orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub vehicle_id: String,
    pub status: PipelineStatus,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<HealthVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<Booking>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Outcome recorded for a stage, if the stage was reached
    pub fn outcome(&self, stage: PipelineStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }
}
