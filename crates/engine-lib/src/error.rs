//! Error taxonomy for the telemetry-to-action pipeline
//!
//! Stage-local errors are captured into `PipelineResult` rather than thrown
//! past stage boundaries; only an analyzer failure terminates an event early.
//! Nothing here should ever crash the hosting process.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BookingStatus, ServiceType};

/// Fatal analyzer errors: the reading itself is unusable, so nothing
/// downstream is meaningful and the event is reported as failed.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("malformed telemetry reading: {0}")]
    MalformedReading(String),
}

/// Scheduling outcomes that are not bookings. `NoAvailability` is a normal
/// business outcome the orchestrator surfaces as an actionable message.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no workshop offers service type '{service}'")]
    NoEligibleWorkshop { service: ServiceType },

    #[error(
        "no conflict-free slot within the {max_delay_hours}h delay bound \
         across {workshops_checked} eligible workshops"
    )]
    NoAvailability {
        workshops_checked: usize,
        max_delay_hours: i64,
    },

    #[error("unknown booking {0}")]
    UnknownBooking(Uuid),

    #[error("unknown workshop '{0}'")]
    UnknownWorkshop(String),

    #[error("invalid booking status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("slot at {start} is no longer free at workshop '{workshop_id}'")]
    SlotTaken {
        workshop_id: String,
        start: DateTime<Utc>,
    },
}

/// Persistence collaborator failures (logged, pipeline continues)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Notification collaborator failures (reported, never thrown into the
/// pipeline's critical path)
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Audit collaborator failures (logged and ignored)
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    Write(String),
}

/// Configuration validation failures, detected at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "invalid threshold for metric '{metric}': critical must be strictly \
         more extreme than warning in the configured direction"
    )]
    InvalidThreshold { metric: String },

    #[error("invalid operating window: start hour {start} must be before end hour {end}")]
    InvalidOperatingWindow { start: u32, end: u32 },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
