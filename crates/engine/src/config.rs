//! Engine daemon configuration

use anyhow::Result;
use serde::Deserialize;

use engine_lib::{AnalyzerConfig, PipelineConfig, SchedulerConfig};

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Fleet name attached to every log line
    #[serde(default = "default_fleet_name")]
    pub fleet_name: String,

    /// Seconds between simulated telemetry rounds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_fleet_name() -> String {
    std::env::var("FLEET_NAME").unwrap_or_else(|_| "demo-fleet".to_string())
}

fn default_tick_interval() -> u64 {
    10
}

impl EngineConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLEET").separator("__"))
            .build()?;

        let loaded: EngineConfig = config.try_deserialize().unwrap_or_else(|_| EngineConfig {
            fleet_name: default_fleet_name(),
            tick_interval_secs: default_tick_interval(),
            analyzer: AnalyzerConfig::default(),
            scheduler: SchedulerConfig::default(),
            pipeline: PipelineConfig::default(),
        });

        loaded.analyzer.validate()?;
        loaded.scheduler.validate()?;
        loaded.pipeline.validate()?;
        Ok(loaded)
    }
}
