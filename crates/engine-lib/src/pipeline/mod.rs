//! Pipeline orchestration
//!
//! Runs each telemetry event through ingest, analysis, scheduling and
//! notification, recording a per-stage outcome instead of letting one
//! collaborator failure abort the rest. Only an unusable reading is fatal;
//! everything downstream degrades to a recorded failure or skip.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::analyzer::HealthAnalyzer;
use crate::collaborators::{
    AuditEntry, AuditLog, FleetStore, NotificationChannel, NotificationEvent, Notifier,
};
use crate::config::PipelineConfig;
use crate::error::ScheduleError;
use crate::models::{
    BookingRequest, HealthVerdict, MetricPoint, PipelineResult, PipelineStage, PipelineStatus,
    Priority, ServiceType, StageOutcome, StageRecord, TelemetryReading, METRIC_NAMES,
};
use crate::observability::{FleetLogger, PipelineMetrics};
use crate::scheduler::BookingScheduler;

/// Coordinates the telemetry-to-action pipeline
pub struct Orchestrator {
    analyzer: HealthAnalyzer,
    scheduler: Arc<BookingScheduler>,
    store: Arc<dyn FleetStore>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditLog>,
    config: PipelineConfig,
    logger: FleetLogger,
    metrics: PipelineMetrics,
    seen_events: DashMap<String, ()>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyzer: HealthAnalyzer,
        scheduler: Arc<BookingScheduler>,
        store: Arc<dyn FleetStore>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLog>,
        config: PipelineConfig,
        logger: FleetLogger,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            analyzer,
            scheduler,
            store,
            notifier,
            audit,
            config,
            logger,
            metrics,
            seen_events: DashMap::new(),
        }
    }

    /// Submit an event for asynchronous processing. The returned receiver
    /// resolves with the pipeline result; dropping it does not cancel the
    /// run.
    pub fn submit(
        self: &Arc<Self>,
        reading: TelemetryReading,
        idempotency_key: Option<String>,
    ) -> oneshot::Receiver<PipelineResult> {
        let (tx, rx) = oneshot::channel();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let result = orchestrator
                .process_event(&reading, idempotency_key.as_deref())
                .await;
            let _ = tx.send(result);
        });
        rx
    }

    /// Run one event through the full pipeline, always returning a result.
    pub async fn process_event(
        &self,
        reading: &TelemetryReading,
        idempotency_key: Option<&str>,
    ) -> PipelineResult {
        if let Some(key) = idempotency_key {
            let fresh = self
                .seen_events
                .insert(key.to_string(), ())
                .is_none();
            if !fresh {
                return self.duplicate_result(reading);
            }
        }

        self.metrics.inc_events_processed();
        let mut stages = Vec::new();

        // Ingest: persist the reading and pull per-metric history. A store
        // outage degrades trend analysis, it does not stop the pipeline.
        let history = self.run_ingest(reading, &mut stages).await;

        // Analyze: the only fatal stage
        let verdict = match self.run_analyze(reading, &history, &mut stages).await {
            Some(verdict) => verdict,
            None => {
                self.metrics.inc_events_failed();
                return PipelineResult {
                    vehicle_id: reading.vehicle_id.clone(),
                    status: PipelineStatus::Failed,
                    stages,
                    verdict: None,
                    booking: None,
                    completed_at: Utc::now(),
                };
            }
        };

        let booking = self.run_schedule(&verdict, &mut stages).await;
        self.run_notify(&verdict, &mut stages).await;

        PipelineResult {
            vehicle_id: reading.vehicle_id.clone(),
            status: PipelineStatus::Completed,
            stages,
            verdict: Some(verdict),
            booking,
            completed_at: Utc::now(),
        }
    }

    async fn run_ingest(
        &self,
        reading: &TelemetryReading,
        stages: &mut Vec<StageRecord>,
    ) -> HashMap<String, Vec<MetricPoint>> {
        let started = Instant::now();
        let since = reading.timestamp - self.config.history_window();
        let mut history = HashMap::new();
        let mut failure: Option<String> = None;

        if let Err(e) = self.store.save_reading(reading).await {
            failure = Some(e.to_string());
        }

        for metric in METRIC_NAMES {
            match self
                .store
                .metric_history(&reading.vehicle_id, metric, since)
                .await
            {
                Ok(points) if !points.is_empty() => {
                    history.insert(metric.to_string(), points);
                }
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e.to_string());
                }
            }
        }

        let outcome = match failure {
            Some(detail) => {
                self.logger
                    .log_stage_failure(&reading.vehicle_id, "ingested", &detail);
                StageOutcome::Failed(detail)
            }
            None => StageOutcome::Success,
        };
        self.audit_stage(reading, "fleet_store", "ingest_reading", &outcome, started)
            .await;
        stages.push(StageRecord {
            stage: PipelineStage::Ingested,
            outcome,
        });
        history
    }

    async fn run_analyze(
        &self,
        reading: &TelemetryReading,
        history: &HashMap<String, Vec<MetricPoint>>,
        stages: &mut Vec<StageRecord>,
    ) -> Option<HealthVerdict> {
        let started = Instant::now();
        let evaluated = self.analyzer.evaluate(reading, history);
        self.metrics
            .observe_analyze_latency(started.elapsed().as_secs_f64());

        match evaluated {
            Ok(verdict) => {
                self.metrics
                    .add_anomalies_detected(verdict.anomalies.len() as u64);
                for anomaly in &verdict.anomalies {
                    self.logger.log_anomaly(
                        &verdict.vehicle_id,
                        &anomaly.metric,
                        anomaly.value,
                        &anomaly.severity.to_string(),
                    );
                }
                self.logger.log_verdict(
                    &verdict.vehicle_id,
                    verdict.overall_severity,
                    verdict.anomalies.len(),
                    &format!("{:?}", verdict.recommended_status).to_lowercase(),
                );

                if let Err(e) = self.store.save_verdict(&verdict).await {
                    self.logger
                        .log_stage_failure(&reading.vehicle_id, "analyzed", &e.to_string());
                }

                self.audit_stage(
                    reading,
                    "health_analyzer",
                    "evaluate_reading",
                    &StageOutcome::Success,
                    started,
                )
                .await;
                stages.push(StageRecord {
                    stage: PipelineStage::Analyzed,
                    outcome: StageOutcome::Success,
                });
                Some(verdict)
            }
            Err(e) => {
                let outcome = StageOutcome::Failed(e.to_string());
                self.logger
                    .log_stage_failure(&reading.vehicle_id, "analyzed", &e.to_string());
                self.audit_stage(reading, "health_analyzer", "evaluate_reading", &outcome, started)
                    .await;
                stages.push(StageRecord {
                    stage: PipelineStage::Analyzed,
                    outcome,
                });
                None
            }
        }
    }

    async fn run_schedule(
        &self,
        verdict: &HealthVerdict,
        stages: &mut Vec<StageRecord>,
    ) -> Option<crate::models::Booking> {
        if verdict.overall_severity < self.config.booking_threshold {
            stages.push(StageRecord {
                stage: PipelineStage::Scheduled,
                outcome: StageOutcome::Skipped(
                    "severity below booking threshold".to_string(),
                ),
            });
            return None;
        }

        let started = Instant::now();
        let priority = Priority::from_severity(verdict.overall_severity);
        let request = BookingRequest::new(
            verdict.vehicle_id.clone(),
            ServiceType::Corrective,
            priority,
        );
        let scheduled = self.scheduler.schedule(&request, Utc::now()).await;
        self.metrics
            .observe_schedule_latency(started.elapsed().as_secs_f64());

        match scheduled {
            Ok(booking) => {
                self.metrics.inc_bookings_committed();
                self.logger.log_booking(
                    &booking.vehicle_id,
                    &booking.workshop_id,
                    &booking.service_type.to_string(),
                    &booking.priority.to_string(),
                    &booking.start.to_rfc3339(),
                );
                if let Err(e) = self.store.save_booking(&booking).await {
                    self.logger
                        .log_stage_failure(&verdict.vehicle_id, "scheduled", &e.to_string());
                }
                self.audit_verdict_stage(
                    verdict,
                    "booking_scheduler",
                    "schedule_booking",
                    &StageOutcome::Success,
                    started,
                )
                .await;
                stages.push(StageRecord {
                    stage: PipelineStage::Scheduled,
                    outcome: StageOutcome::Success,
                });
                Some(booking)
            }
            Err(e) => {
                if let ScheduleError::NoAvailability {
                    max_delay_hours, ..
                } = &e
                {
                    self.metrics.inc_bookings_unplaceable();
                    self.logger.log_no_availability(
                        &verdict.vehicle_id,
                        &priority.to_string(),
                        *max_delay_hours,
                    );
                } else {
                    self.logger
                        .log_stage_failure(&verdict.vehicle_id, "scheduled", &e.to_string());
                }
                let outcome = StageOutcome::Failed(e.to_string());
                self.audit_verdict_stage(
                    verdict,
                    "booking_scheduler",
                    "schedule_booking",
                    &outcome,
                    started,
                )
                .await;
                stages.push(StageRecord {
                    stage: PipelineStage::Scheduled,
                    outcome,
                });
                None
            }
        }
    }

    async fn run_notify(&self, verdict: &HealthVerdict, stages: &mut Vec<StageRecord>) {
        if verdict.overall_severity < self.config.notify_threshold {
            stages.push(StageRecord {
                stage: PipelineStage::Notified,
                outcome: StageOutcome::Skipped(
                    "severity below notification threshold".to_string(),
                ),
            });
            return;
        }

        let started = Instant::now();
        let event = notification_for(verdict);
        let delivery = timeout(
            self.config.notify_timeout(),
            self.notifier.notify(&event),
        )
        .await;

        let outcome = match delivery {
            Ok(Ok(report)) if report.any_delivered() => StageOutcome::Success,
            Ok(Ok(_)) => {
                self.metrics.inc_notify_failures();
                StageOutcome::Failed("no channel accepted the notification".to_string())
            }
            Ok(Err(e)) => {
                self.metrics.inc_notify_failures();
                StageOutcome::Failed(e.to_string())
            }
            Err(_) => {
                self.metrics.inc_notify_failures();
                StageOutcome::Failed("notification timed out".to_string())
            }
        };

        if let StageOutcome::Failed(detail) = &outcome {
            self.logger
                .log_stage_failure(&verdict.vehicle_id, "notified", detail);
        }
        self.audit_verdict_stage(verdict, "notifier", "send_notification", &outcome, started)
            .await;
        stages.push(StageRecord {
            stage: PipelineStage::Notified,
            outcome,
        });
    }

    fn duplicate_result(&self, reading: &TelemetryReading) -> PipelineResult {
        let stages = [
            PipelineStage::Ingested,
            PipelineStage::Analyzed,
            PipelineStage::Scheduled,
            PipelineStage::Notified,
        ]
        .into_iter()
        .map(|stage| StageRecord {
            stage,
            outcome: StageOutcome::Skipped("duplicate event".to_string()),
        })
        .collect();

        PipelineResult {
            vehicle_id: reading.vehicle_id.clone(),
            status: PipelineStatus::Completed,
            stages,
            verdict: None,
            booking: None,
            completed_at: Utc::now(),
        }
    }

    async fn audit_stage(
        &self,
        reading: &TelemetryReading,
        agent: &str,
        action: &str,
        outcome: &StageOutcome,
        started: Instant,
    ) {
        self.write_audit(&reading.vehicle_id, agent, action, outcome, started)
            .await;
    }

    async fn audit_verdict_stage(
        &self,
        verdict: &HealthVerdict,
        agent: &str,
        action: &str,
        outcome: &StageOutcome,
        started: Instant,
    ) {
        self.write_audit(&verdict.vehicle_id, agent, action, outcome, started)
            .await;
    }

    async fn write_audit(
        &self,
        vehicle_id: &str,
        agent: &str,
        action: &str,
        outcome: &StageOutcome,
        started: Instant,
    ) {
        let (status, detail) = match outcome {
            StageOutcome::Success => ("success", None),
            StageOutcome::Failed(d) => ("failed", Some(d.clone())),
            StageOutcome::Skipped(d) => ("skipped", Some(d.clone())),
        };
        let entry = AuditEntry {
            agent: agent.to_string(),
            action: action.to_string(),
            vehicle_id: vehicle_id.to_string(),
            outcome: status.to_string(),
            detail,
            elapsed_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };
        // Audit is best-effort; a broken trail must not stall the pipeline
        if let Err(e) = self.audit.record(entry).await {
            tracing::debug!(error = %e, "audit record dropped");
        }
    }
}

/// Build the alert for a verdict: urgent channel when the vehicle requires
/// immediate attention, routine channel otherwise
fn notification_for(verdict: &HealthVerdict) -> NotificationEvent {
    let channel = if verdict.requires_immediate_attention {
        NotificationChannel::Urgent
    } else {
        NotificationChannel::Normal
    };
    let subject = format!(
        "{}: {} anomal{} detected",
        verdict.vehicle_id,
        verdict.anomalies.len(),
        if verdict.anomalies.len() == 1 { "y" } else { "ies" },
    );
    let body = verdict
        .anomalies
        .iter()
        .map(|a| a.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    NotificationEvent {
        vehicle_id: verdict.vehicle_id.clone(),
        channel,
        subject,
        body,
        severity: verdict.overall_severity,
    }
}
