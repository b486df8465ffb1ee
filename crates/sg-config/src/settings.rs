//! Server settings: concurrency and time limits, working directories and
//! external tool locations.

use std::env::consts::EXE_SUFFIX;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Maximum simultaneous simulations on the server.
    pub max_runs: usize,
    /// Maximum parallel executions per simulation.
    pub max_parallel_runs: u32,
    /// Maximum threads per execution.
    pub max_threads_per_run: u32,
    /// Wall-clock limit per simulation.
    pub max_time_minutes: f64,
    /// Sleep between supervisor status checks.
    pub poll_interval_secs: f64,
    /// Time allowed for a graceful shutdown before the process tree is
    /// killed.
    pub kill_grace_secs: f64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_runs: 3,
            max_parallel_runs: 4,
            max_threads_per_run: 1,
            max_time_minutes: 30.0,
            poll_interval_secs: 1.0,
            kill_grace_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Results, logs, manifests and saved configurations.
    pub output_dir: PathBuf,
    /// Intermediate configuration files and abort markers.
    pub config_dir: PathBuf,
    /// Occupancy markers.
    pub flag_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tmp"),
            config_dir: PathBuf::from("tmp"),
            flag_dir: PathBuf::from("tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub engine: PathBuf,
    pub config_generator: PathBuf,
    pub mc_stats: PathBuf,
    pub model_definition: PathBuf,
    pub parameter_catalog: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            engine: PathBuf::from(format!("lsdNW{EXE_SUFFIX}")),
            config_generator: PathBuf::from(format!("lsd_confgen{EXE_SUFFIX}")),
            mc_stats: PathBuf::from(format!("lsd_mcstats{EXE_SUFFIX}")),
            model_definition: PathBuf::from("model.lsd"),
            parameter_catalog: PathBuf::from("catalog.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub limits: RunLimits,
    /// Scheduling priority for the engine (unix `nice`); `None` runs it at
    /// normal priority.
    pub nice_level: Option<i32>,
    pub paths: PathSettings,
    pub tools: ToolSettings,
    /// The engine reads the Name,Value record directly, so no generator run
    /// is needed.
    pub reads_record_config: bool,
    /// Literal marking a missing value in result files.
    pub missing_marker: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            limits: RunLimits::default(),
            nice_level: if cfg!(windows) { None } else { Some(10) },
            paths: PathSettings::default(),
            tools: ToolSettings::default(),
            reads_record_config: false,
            missing_marker: "NA".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let settings: ServerSettings = if content.trim().is_empty() {
            ServerSettings::default()
        } else {
            serde_yaml::from_str(content)?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.limits;
        if limits.max_runs == 0 {
            return Err(ConfigError::InvalidSettings {
                field: "limits.max_runs",
                reason: "must be at least 1".to_string(),
            });
        }
        if limits.max_parallel_runs == 0 || limits.max_threads_per_run == 0 {
            return Err(ConfigError::InvalidSettings {
                field: "limits.max_parallel_runs",
                reason: "parallelism must be at least 1".to_string(),
            });
        }
        positive("limits.max_time_minutes", limits.max_time_minutes)?;
        positive("limits.poll_interval_secs", limits.poll_interval_secs)?;
        representable("limits.max_time_minutes", limits.max_time_minutes * 60.0)?;
        representable("limits.poll_interval_secs", limits.poll_interval_secs)?;
        representable("limits.kill_grace_secs", limits.kill_grace_secs)?;
        if self.missing_marker.is_empty() {
            return Err(ConfigError::InvalidSettings {
                field: "missing_marker",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        saturating_secs(self.limits.poll_interval_secs)
    }

    pub fn max_time(&self) -> Duration {
        saturating_secs(self.limits.max_time_minutes * 60.0)
    }

    pub fn kill_grace(&self) -> Duration {
        saturating_secs(self.limits.kill_grace_secs)
    }
}

/// Out-of-range values of unvalidated settings clamp instead of panicking.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

fn representable(field: &'static str, secs: f64) -> ConfigResult<()> {
    Duration::try_from_secs_f64(secs)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidSettings {
            field,
            reason: format!("{secs} seconds is not a valid duration"),
        })
}

fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidSettings {
            field,
            reason: format!("{value} must be a positive number"),
        })
    }
}
