//! Engine library for fleet maintenance orchestration
//!
//! This crate provides the core functionality for:
//! - Telemetry health analysis against per-metric thresholds
//! - Linear trend forecasting over metric history
//! - Workshop booking scheduling with per-calendar exclusion
//! - Pipeline orchestration with per-stage outcome recording
//! - Collaborator seams for persistence, notification and audit

pub mod analyzer;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod scheduler;

pub use analyzer::{HealthAnalyzer, TrendAnalyzer};
pub use collaborators::{
    AuditEntry, AuditLog, DeliveryReport, FleetStore, NotificationChannel, NotificationEvent,
    Notifier,
};
pub use config::{AnalyzerConfig, PipelineConfig, SchedulerConfig};
pub use models::*;
pub use observability::{FleetLogger, PipelineMetrics};
pub use pipeline::Orchestrator;
pub use scheduler::{BookingScheduler, WorkshopDirectory};
