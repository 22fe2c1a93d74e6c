//! End-to-end pipeline tests with in-memory collaborators

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use engine_lib::collaborators::{
    FailingNotifier, MemoryAuditLog, MemoryStore, Notifier, StubNotifier,
};
use engine_lib::{
    AnalyzerConfig, BookingRequest, BookingScheduler, FleetLogger, HealthAnalyzer, MetricPoint,
    Orchestrator, PipelineConfig, PipelineMetrics, PipelineStage, PipelineStatus, Priority,
    SchedulerConfig, ServiceType, StageOutcome, TelemetryReading, TrendDirection,
    VehicleStatus, Workshop, WorkshopDirectory,
};

fn demo_workshops() -> Vec<Workshop> {
    vec![
        Workshop {
            id: "ws_001".to_string(),
            name: "Central EV Workshop".to_string(),
            location: "Downtown".to_string(),
            capabilities: vec![ServiceType::Corrective, ServiceType::BatteryService],
            rating: 4.5,
        },
        Workshop {
            id: "ws_002".to_string(),
            name: "Northside Garage".to_string(),
            location: "North District".to_string(),
            capabilities: vec![ServiceType::General],
            rating: 4.0,
        },
    ]
}

fn build_orchestrator(
    store: Arc<MemoryStore>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<MemoryAuditLog>,
) -> Arc<Orchestrator> {
    let directory = Arc::new(WorkshopDirectory::new());
    for ws in demo_workshops() {
        directory.register(ws);
    }
    let scheduler = Arc::new(BookingScheduler::new(directory, SchedulerConfig::default()));

    Arc::new(Orchestrator::new(
        HealthAnalyzer::new(AnalyzerConfig::default()),
        scheduler,
        store,
        notifier,
        audit,
        PipelineConfig::default(),
        FleetLogger::new("test-fleet"),
        PipelineMetrics::new(),
    ))
}

fn critical_reading(vehicle_id: &str) -> TelemetryReading {
    let mut reading = TelemetryReading::new(vehicle_id, Utc::now());
    reading.battery_soh = Some(65.0);
    reading.battery_temp = Some(47.0);
    reading.voltage_imbalance = Some(0.1);
    reading.motor_temp = Some(60.0);
    reading.motor_efficiency = Some(92.0);
    reading.coolant_temp = Some(70.0);
    reading.coolant_level = Some(85.0);
    reading
}

fn healthy_reading(vehicle_id: &str) -> TelemetryReading {
    let mut reading = TelemetryReading::new(vehicle_id, Utc::now());
    reading.battery_soh = Some(95.0);
    reading.battery_temp = Some(30.0);
    reading.motor_temp = Some(60.0);
    reading
}

#[tokio::test]
async fn test_critical_reading_books_and_notifies() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(StubNotifier::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let orchestrator = build_orchestrator(store.clone(), notifier.clone(), audit.clone());

    let result = orchestrator
        .process_event(&critical_reading("EV003"), None)
        .await;

    assert_eq!(result.status, PipelineStatus::Completed);
    let verdict = result.verdict.as_ref().expect("verdict");
    assert_eq!(verdict.anomalies.len(), 2);
    assert_eq!(verdict.overall_severity, 1.0);
    assert!(verdict.requires_immediate_attention);
    assert_eq!(verdict.recommended_status, VehicleStatus::Critical);

    let booking = result.booking.as_ref().expect("booking");
    assert_eq!(booking.priority, Priority::Critical);
    assert_eq!(booking.service_type, ServiceType::Corrective);
    // Critical bound: at most 24 hours out
    assert!(booking.start - Utc::now() <= Duration::hours(24));

    assert_eq!(
        result.outcome(PipelineStage::Notified),
        Some(&StageOutcome::Success)
    );
    assert_eq!(notifier.delivered().len(), 1);
    assert_eq!(store.saved_verdicts().len(), 1);
    assert_eq!(store.saved_bookings().len(), 1);

    // Every executed stage leaves an audit entry
    let agents: HashSet<String> = audit.entries().into_iter().map(|e| e.agent).collect();
    assert!(agents.contains("health_analyzer"));
    assert!(agents.contains("booking_scheduler"));
    assert!(agents.contains("notifier"));
}

#[tokio::test]
async fn test_failed_notification_keeps_booking() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = build_orchestrator(
        store.clone(),
        Arc::new(FailingNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
    );

    let result = orchestrator
        .process_event(&critical_reading("EV003"), None)
        .await;

    // Notification failure is stage-local
    assert_eq!(result.status, PipelineStatus::Completed);
    assert!(result.booking.is_some());
    assert!(matches!(
        result.outcome(PipelineStage::Notified),
        Some(StageOutcome::Failed(_))
    ));
    assert_eq!(store.saved_bookings().len(), 1);
}

#[tokio::test]
async fn test_healthy_reading_skips_downstream() {
    let notifier = Arc::new(StubNotifier::new());
    let orchestrator = build_orchestrator(
        Arc::new(MemoryStore::new()),
        notifier.clone(),
        Arc::new(MemoryAuditLog::new()),
    );

    let result = orchestrator
        .process_event(&healthy_reading("EV001"), None)
        .await;

    assert_eq!(result.status, PipelineStatus::Completed);
    assert!(result.booking.is_none());
    assert!(matches!(
        result.outcome(PipelineStage::Scheduled),
        Some(StageOutcome::Skipped(_))
    ));
    assert!(matches!(
        result.outcome(PipelineStage::Notified),
        Some(StageOutcome::Skipped(_))
    ));
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn test_malformed_reading_fails_pipeline() {
    let orchestrator = build_orchestrator(
        Arc::new(MemoryStore::new()),
        Arc::new(StubNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
    );

    let result = orchestrator
        .process_event(&TelemetryReading::new("", Utc::now()), None)
        .await;

    assert_eq!(result.status, PipelineStatus::Failed);
    assert!(result.verdict.is_none());
    assert!(result.booking.is_none());
    assert!(matches!(
        result.outcome(PipelineStage::Analyzed),
        Some(StageOutcome::Failed(_))
    ));
}

#[tokio::test]
async fn test_duplicate_event_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = build_orchestrator(
        store.clone(),
        Arc::new(StubNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
    );

    let reading = critical_reading("EV003");
    let first = orchestrator
        .process_event(&reading, Some("evt-001"))
        .await;
    let second = orchestrator
        .process_event(&reading, Some("evt-001"))
        .await;

    assert!(first.booking.is_some());
    assert!(second.booking.is_none());
    assert!(second
        .stages
        .iter()
        .all(|s| matches!(s.outcome, StageOutcome::Skipped(_))));
    // The duplicate committed nothing
    assert_eq!(store.saved_bookings().len(), 1);
}

#[tokio::test]
async fn test_submit_resolves_with_result() {
    let orchestrator = build_orchestrator(
        Arc::new(MemoryStore::new()),
        Arc::new(StubNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
    );

    let rx = orchestrator.submit(critical_reading("EV003"), Some("evt-042".to_string()));
    let result = rx.await.expect("pipeline result");
    assert_eq!(result.status, PipelineStatus::Completed);
    assert!(result.booking.is_some());
}

#[tokio::test]
async fn test_seeded_history_produces_declining_forecast() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for i in 0..6 {
        store.push_history(
            "EV002",
            "battery_soh",
            MetricPoint::new(now - Duration::hours(6 - i), 90.0 - 2.0 * i as f64),
        );
    }

    let orchestrator = build_orchestrator(
        store,
        Arc::new(StubNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
    );

    let result = orchestrator
        .process_event(&healthy_reading("EV002"), None)
        .await;

    let verdict = result.verdict.expect("verdict");
    let forecast = verdict
        .forecasts
        .iter()
        .find(|f| f.metric == "battery_soh")
        .expect("battery_soh forecast");
    assert_eq!(forecast.direction, TrendDirection::Declining);
    assert!(forecast.hours_to_critical.is_some());
}

#[tokio::test]
async fn test_concurrent_scheduling_never_overlaps() {
    let directory = Arc::new(WorkshopDirectory::new());
    directory.register(Workshop {
        id: "ws_001".to_string(),
        name: "Central EV Workshop".to_string(),
        location: "Downtown".to_string(),
        capabilities: vec![ServiceType::Corrective],
        rating: 4.5,
    });
    let scheduler = Arc::new(BookingScheduler::new(
        directory.clone(),
        SchedulerConfig::default(),
    ));

    let now = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
    let mut handles = Vec::new();
    for i in 0..8 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            let request = BookingRequest::new(
                format!("EV{:03}", i),
                ServiceType::Corrective,
                Priority::High,
            );
            scheduler.schedule(&request, now).await
        }));
    }

    let mut bookings = Vec::new();
    for handle in handles {
        bookings.push(handle.await.unwrap().expect("slot available"));
    }

    // All landed on the same workshop and none overlap
    for a in &bookings {
        assert_eq!(a.workshop_id, "ws_001");
        for b in &bookings {
            if a.id == b.id {
                continue;
            }
            let disjoint = a.end() <= b.start || b.end() <= a.start;
            assert!(disjoint, "bookings {} and {} overlap", a.id, b.id);
        }
    }

    let entry = directory.get("ws_001").unwrap();
    let calendar = entry.calendar.lock().await;
    assert_eq!(calendar.len(), 8);
}
