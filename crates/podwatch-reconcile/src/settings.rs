use std::time::Duration;

use podwatch_core::PodwatchConfig;

/// Runtime knobs for the loops and handlers, resolved from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    /// Environment tag written on, and used to select, status records.
    pub environment: String,
    pub devmode_status_interval: Duration,
    pub camel_status_interval: Duration,
    pub probe_timeout: Duration,
    pub upload_timeout: Duration,
    pub reload_timeout: Duration,
    pub queue_capacity: usize,
    pub workers: usize,
}

impl From<&PodwatchConfig> for ReconcileSettings {
    fn from(config: &PodwatchConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            devmode_status_interval: config.devmode_status_interval(),
            camel_status_interval: config.camel_status_interval(),
            probe_timeout: config.probe_timeout(),
            upload_timeout: config.upload_timeout(),
            reload_timeout: config.reload_timeout(),
            queue_capacity: config.dispatch.queue_capacity,
            workers: config.dispatch.workers,
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from(&PodwatchConfig::default())
    }
}
