//! podwatch.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PodwatchConfig {
    /// Environment tag stamped on every status record (e.g. "dev").
    pub environment: String,
    /// Delivery pipeline name, persisted with the environment record.
    pub pipeline: String,
    /// Directory holding the redb database.
    pub data_dir: PathBuf,
    /// Port for the daemon's HTTP surface.
    pub port: u16,
    pub intervals: IntervalsConfig,
    pub timeouts: TimeoutsConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub dispatch: DispatchConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntervalsConfig {
    /// Devmode collection and devmode cleanup period.
    pub devmode_status: String,
    /// Production pod collection period.
    pub camel_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub probe: String,
    pub upload: String,
    pub reload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Size of the rolling outcome window; the breaker never opens before it fills.
    pub volume_threshold: u32,
    /// Failure share of the window (0.0–1.0) at which the breaker opens.
    pub failure_ratio: f64,
    /// How long the breaker stays open before admitting a trial call.
    pub open_delay: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub workers: usize,
}

/// Fallback cluster identity used when not running inside Kubernetes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub name: String,
    pub namespace: String,
}

impl Default for PodwatchConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            pipeline: "false".to_string(),
            data_dir: PathBuf::from("/var/lib/podwatch"),
            port: 8080,
            intervals: IntervalsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            dispatch: DispatchConfig::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            devmode_status: "2s".to_string(),
            camel_status: "2s".to_string(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe: "500ms".to_string(),
            upload: "1000ms".to_string(),
            reload: "1000ms".to_string(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 10,
            failure_ratio: 0.5,
            open_delay: "1000ms".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            workers: 4,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "localhost".to_string(),
            namespace: "karavan".to_string(),
        }
    }
}

impl PodwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PodwatchConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would make the loops or breakers misbehave.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, value) in [
            ("intervals.devmode_status", &self.intervals.devmode_status),
            ("intervals.camel_status", &self.intervals.camel_status),
            ("timeouts.probe", &self.timeouts.probe),
            ("timeouts.upload", &self.timeouts.upload),
            ("timeouts.reload", &self.timeouts.reload),
            ("circuit_breaker.open_delay", &self.circuit_breaker.open_delay),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() || key == "circuit_breaker.open_delay" => {}
                _ => anyhow::bail!("invalid duration for {key}: {value:?}"),
            }
        }
        if !(0.0..=1.0).contains(&self.circuit_breaker.failure_ratio) {
            anyhow::bail!(
                "circuit_breaker.failure_ratio must be within 0.0..=1.0, got {}",
                self.circuit_breaker.failure_ratio
            );
        }
        if self.circuit_breaker.volume_threshold == 0 {
            anyhow::bail!("circuit_breaker.volume_threshold must be at least 1");
        }
        if self.dispatch.queue_capacity == 0 || self.dispatch.workers == 0 {
            anyhow::bail!("dispatch.queue_capacity and dispatch.workers must be at least 1");
        }
        Ok(())
    }

    pub fn devmode_status_interval(&self) -> Duration {
        parse_duration(&self.intervals.devmode_status).unwrap_or(Duration::from_secs(2))
    }

    pub fn camel_status_interval(&self) -> Duration {
        parse_duration(&self.intervals.camel_status).unwrap_or(Duration::from_secs(2))
    }

    pub fn probe_timeout(&self) -> Duration {
        parse_duration(&self.timeouts.probe).unwrap_or(Duration::from_millis(500))
    }

    pub fn upload_timeout(&self) -> Duration {
        parse_duration(&self.timeouts.upload).unwrap_or(Duration::from_millis(1000))
    }

    pub fn reload_timeout(&self) -> Duration {
        parse_duration(&self.timeouts.reload).unwrap_or(Duration::from_millis(1000))
    }

    pub fn open_delay(&self) -> Duration {
        parse_duration(&self.circuit_breaker.open_delay).unwrap_or(Duration::from_millis(1000))
    }
}
