//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `CROSSLIGHT_`-prefixed environment variables (double underscore as
//! the section separator, e.g. `CROSSLIGHT_SCHEDULER__DAY_GREEN_SECS`).

use phase_scheduler::{Mode, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address for device sessions.
    pub listen_addr: String,
    /// Site identifier namespacing the storage directory.
    pub site_id: String,
    /// Root directory for frames and reports.
    pub data_root: PathBuf,
    /// Upload cadence token sent to each device after registration,
    /// frames per second.
    pub poll_interval: u32,
    /// Session read timeout in seconds; 0 disables and a stalled device
    /// blocks its handler until the transport errors.
    pub read_timeout_secs: u64,
    /// Base URL of the report upload endpoint; unset keeps reports
    /// local.
    pub report_url: Option<String>,
    /// Phase algorithm active at startup.
    pub mode: Mode,
    /// Phase timing.
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50000".to_string(),
            site_id: "1".to_string(),
            data_root: PathBuf::from("files"),
            poll_interval: 1,
            read_timeout_secs: 0,
            report_url: None,
            mode: Mode::Day,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration, layering an optional file and the
    /// environment over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&ServerConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder
            .add_source(config::Environment::with_prefix("CROSSLIGHT").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Session read timeout as a duration, if enabled.
    pub fn read_timeout(&self) -> Option<std::time::Duration> {
        (self.read_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.read_timeout_secs))
    }
}
