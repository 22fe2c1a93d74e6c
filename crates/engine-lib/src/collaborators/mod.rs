//! Collaborator seams
//!
//! The orchestrator talks to persistence, notification and audit through
//! these traits. Production deployments plug in real backends; the bundled
//! in-memory implementations back the daemon binary and the tests.

mod memory;

pub use memory::{FailingNotifier, MemoryAuditLog, MemoryStore, StubNotifier};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuditError, NotifyError, StoreError};
use crate::models::{Booking, HealthVerdict, MetricPoint, TelemetryReading, Workshop};

/// Persistence for telemetry history, verdicts and bookings
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Persist one reading into per-metric history
    async fn save_reading(&self, reading: &TelemetryReading) -> Result<(), StoreError>;

    /// Historical points for one vehicle metric since a cutoff, sorted by
    /// timestamp ascending
    async fn metric_history(
        &self,
        vehicle_id: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricPoint>, StoreError>;

    async fn save_verdict(&self, verdict: &HealthVerdict) -> Result<(), StoreError>;

    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Workshop roster to register with the scheduler at startup
    async fn workshops(&self) -> Result<Vec<Workshop>, StoreError>;
}

/// Delivery channel for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Immediate-attention channel (on-call, paging)
    Urgent,
    /// Routine channel (ops dashboard, email digest)
    Normal,
}

/// An alert the pipeline wants delivered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub vehicle_id: String,
    pub channel: NotificationChannel,
    pub subject: String,
    pub body: String,
    pub severity: f64,
}

/// Per-channel delivery outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: NotificationChannel,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// What actually got delivered for one notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|o| o.delivered)
    }
}

/// Outbound alert delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<DeliveryReport, NotifyError>;
}

/// Identifier of a committed audit record
pub type RecordId = Uuid;

/// One audit trail entry, mirroring what operators need to reconstruct a
/// pipeline run after the fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Component that performed the action
    pub agent: String,
    pub action: String,
    pub vehicle_id: String,
    /// "success", "failed" or "skipped"
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit trail
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<RecordId, AuditError>;
}
