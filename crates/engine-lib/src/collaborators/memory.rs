//! In-memory collaborator implementations
//!
//! Back the daemon binary and the test suite. `MemoryStore` is seedable so
//! trend analysis can be exercised with synthetic history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuditError, NotifyError, StoreError};
use crate::models::{Booking, HealthVerdict, MetricPoint, TelemetryReading, Workshop};

use super::{
    AuditEntry, AuditLog, ChannelOutcome, DeliveryReport, FleetStore, NotificationEvent, Notifier,
    RecordId,
};

/// In-memory fleet store keyed by `(vehicle_id, metric)`
#[derive(Default)]
pub struct MemoryStore {
    history: DashMap<(String, String), Vec<MetricPoint>>,
    verdicts: Mutex<Vec<HealthVerdict>>,
    bookings: Mutex<Vec<Booking>>,
    workshops: Mutex<Vec<Workshop>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a history point for a vehicle metric
    pub fn push_history(&self, vehicle_id: &str, metric: &str, point: MetricPoint) {
        self.history
            .entry((vehicle_id.to_string(), metric.to_string()))
            .or_default()
            .push(point);
    }

    pub fn seed_workshops(&self, workshops: Vec<Workshop>) {
        match self.workshops.lock() {
            Ok(mut guard) => *guard = workshops,
            Err(poisoned) => *poisoned.into_inner() = workshops,
        }
    }

    pub fn saved_verdicts(&self) -> Vec<HealthVerdict> {
        match self.verdicts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn saved_bookings(&self) -> Vec<Booking> {
        match self.bookings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn save_reading(&self, reading: &TelemetryReading) -> Result<(), StoreError> {
        for (metric, value) in reading.metrics() {
            self.push_history(
                &reading.vehicle_id,
                metric,
                MetricPoint::new(reading.timestamp, value),
            );
        }
        Ok(())
    }

    async fn metric_history(
        &self,
        vehicle_id: &str,
        metric: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        let key = (vehicle_id.to_string(), metric.to_string());
        let mut points: Vec<MetricPoint> = self
            .history
            .get(&key)
            .map(|p| p.value().clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.timestamp >= since)
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn save_verdict(&self, verdict: &HealthVerdict) -> Result<(), StoreError> {
        match self.verdicts.lock() {
            Ok(mut guard) => guard.push(verdict.clone()),
            Err(poisoned) => poisoned.into_inner().push(verdict.clone()),
        }
        Ok(())
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        match self.bookings.lock() {
            Ok(mut guard) => guard.push(booking.clone()),
            Err(poisoned) => poisoned.into_inner().push(booking.clone()),
        }
        Ok(())
    }

    async fn workshops(&self) -> Result<Vec<Workshop>, StoreError> {
        match self.workshops.lock() {
            Ok(guard) => Ok(guard.clone()),
            Err(poisoned) => Ok(poisoned.into_inner().clone()),
        }
    }
}

/// Notifier that always delivers, recording events for inspection
#[derive(Default)]
pub struct StubNotifier {
    delivered: Mutex<Vec<NotificationEvent>>,
}

impl StubNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<NotificationEvent> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<DeliveryReport, NotifyError> {
        match self.delivered.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(DeliveryReport {
            outcomes: vec![ChannelOutcome {
                channel: event.channel,
                delivered: true,
                detail: None,
            }],
        })
    }
}

/// Notifier that always fails delivery
#[derive(Default)]
pub struct FailingNotifier;

impl FailingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &NotificationEvent) -> Result<DeliveryReport, NotifyError> {
        Err(NotifyError::Delivery("channel unavailable".to_string()))
    }
}

/// Inspectable in-memory audit trail
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<(RecordId, AuditEntry)>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().map(|(_, e)| e.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(_, e)| e.clone()).collect(),
        }
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<RecordId, AuditError> {
        let id = Uuid::new_v4();
        match self.entries.lock() {
            Ok(mut guard) => guard.push((id, entry)),
            Err(poisoned) => poisoned.into_inner().push((id, entry)),
        }
        Ok(id)
    }
}
