//! Maintenance Engine - fleet telemetry-to-action daemon
//!
//! Runs the full pipeline against simulated telemetry: analyzes readings,
//! schedules workshop bookings for unhealthy vehicles and raises alerts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use engine_lib::collaborators::{FleetStore, MemoryAuditLog, MemoryStore, StubNotifier};
use engine_lib::{
    BookingScheduler, FleetLogger, HealthAnalyzer, Orchestrator, PipelineMetrics,
    WorkshopDirectory,
};

mod config;
mod simulator;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting maintenance-engine");

    let config = config::EngineConfig::load()?;
    info!(fleet = %config.fleet_name, "Engine configured");

    // Seed the in-memory store and register the workshop roster
    let store = Arc::new(MemoryStore::new());
    store.seed_workshops(simulator::demo_workshops());

    let directory = Arc::new(WorkshopDirectory::new());
    for workshop in store.workshops().await? {
        directory.register(workshop);
    }

    let metrics = PipelineMetrics::new();
    let logger = FleetLogger::new(&config.fleet_name);
    logger.log_startup(ENGINE_VERSION, directory.workshop_count());

    let orchestrator = Arc::new(Orchestrator::new(
        HealthAnalyzer::new(config.analyzer.clone()),
        Arc::new(BookingScheduler::new(
            directory.clone(),
            config.scheduler.clone(),
        )),
        store.clone(),
        Arc::new(StubNotifier::new()),
        Arc::new(MemoryAuditLog::new()),
        config.pipeline.clone(),
        logger.clone(),
        metrics,
    ));

    let mut simulator = simulator::TelemetrySimulator::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.tick_interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for reading in simulator.next_round() {
                    let key = format!(
                        "{}:{}",
                        reading.vehicle_id,
                        reading.timestamp.timestamp_millis()
                    );
                    // Fire-and-track: the receiver resolves with the result,
                    // but the daemon does not block the tick on it
                    let _rx = orchestrator.submit(reading, Some(key));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logger.log_shutdown("SIGINT received");
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
