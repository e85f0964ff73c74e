//! Configuration using Figment
//!
//! Configuration is layered, lowest priority first:
//! 1. built-in defaults
//! 2. a TOML file (`trace_daq.toml` unless another path is given)
//! 3. environment variables prefixed with `TRACE_DAQ_`, nested keys split by `__`
//!
//! # Example
//! ```no_run
//! use trace_daq::config::TraceConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // TRACE_DAQ_CONTROLLER__ADDRESS=10.0.0.5 overrides the file
//! let config = TraceConfig::load()?;
//! config.validate()?;
//! println!("Controller: {}", config.controller.address);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::artifacts::TransferMode;
use crate::correlation::MatchPolicy;
use crate::error::{TraceError, TraceResult};
use crate::logging::{parse_log_level, OutputFormat};
use crate::measurement::{DEFAULT_DB_NUMBER, POSITION_COUNT};
use crate::validation;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "trace_daq.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TRACE_DAQ_";

const FILE_HEADER: &str = "\
# trace_daq configuration
#
# Every key can be overridden from the environment, e.g.
#   TRACE_DAQ_CONTROLLER__ADDRESS=10.0.0.5
#   TRACE_DAQ_IMAGES__POLICY=exact
";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// `[controller]`
    pub controller: ControllerConfig,
    /// `[acquisition]`
    pub acquisition: AcquisitionConfig,
    /// `[storage]`
    pub storage: StorageConfig,
    /// `[images]`
    pub images: ImagesConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

/// Programmable controller connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// IP address of the controller
    pub address: String,
    /// CPU rack
    pub rack: u8,
    /// CPU slot
    pub slot: u8,
    /// ISO-on-TCP port
    pub port: u16,
    /// Data block holding the unit record
    pub db_number: u16,
    /// Connect and per-request timeout
    pub timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: "192.168.11.1".to_string(),
            rack: 0,
            slot: 1,
            port: 102,
            db_number: DEFAULT_DB_NUMBER,
            timeout_ms: 2000,
        }
    }
}

impl ControllerConfig {
    /// Timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Poll loop cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Seconds between two reads of the block
    pub poll_interval_secs: f64,
    /// Granularity at which the sleep checks for shutdown
    pub sleep_step_ms: u64,
    /// Positions correlated with images, counted from 1
    pub positions: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 4.0,
            sleep_step_ms: 100,
            positions: 3,
        }
    }
}

impl AcquisitionConfig {
    /// Poll interval as a `Duration`. Invalid values collapse to zero and
    /// are rejected by [`TraceConfig::validate`].
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or_default()
    }

    /// Sleep step as a `Duration`.
    pub fn sleep_step(&self) -> Duration {
        Duration::from_millis(self.sleep_step_ms)
    }
}

/// Output location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the per-day unit folders. Must exist at startup.
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("measurements"),
        }
    }
}

/// Image correlation and transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Root the file-transfer listener writes into. Must exist at startup.
    pub source_dir: PathBuf,
    /// `nearest` or `exact`
    pub policy: MatchPolicy,
    /// `copy` or `move`
    pub transfer: TransferMode,
    /// Quiet period required before a matched directory is transferred; 0 disables
    pub settle_ms: u64,
    /// Give up waiting for quiet after this long
    pub settle_timeout_ms: u64,
    /// Reject nearest matches further away than this; absent means unbounded
    pub max_delta_secs: Option<f64>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("ftp_incoming"),
            policy: MatchPolicy::Nearest,
            transfer: TransferMode::Copy,
            settle_ms: 0,
            settle_timeout_ms: 5000,
            max_delta_secs: None,
        }
    }
}

impl ImagesConfig {
    /// Settle period as a `Duration`.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Settle timeout as a `Duration`.
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// pretty, compact or json
    pub format: String,
    /// Log span open/close, which times each unit's event handling
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
        }
    }
}

impl TraceConfig {
    /// Load from `trace_daq.toml` and the environment.
    pub fn load() -> TraceResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> TraceResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// The provider stack behind [`TraceConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(TraceConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate semantic constraints after loading.
    pub fn validate(&self) -> TraceResult<()> {
        parse_log_level(&self.logging.level).map_err(TraceError::Configuration)?;
        OutputFormat::from_str(&self.logging.format).map_err(TraceError::Configuration)?;

        let c = &self.controller;
        check("controller.address", validation::is_valid_ip(&c.address))?;
        check("controller.port", validation::is_valid_port(c.port))?;
        check("controller.rack", validation::is_in_range(c.rack, 0..=7))?;
        check("controller.slot", validation::is_in_range(c.slot, 0..=31))?;

        let a = &self.acquisition;
        check(
            "acquisition.poll_interval_secs",
            validation::is_positive(a.poll_interval_secs),
        )?;
        check(
            "acquisition.positions",
            validation::is_in_range(a.positions, 1..=POSITION_COUNT),
        )?;
        if a.sleep_step_ms == 0 {
            return Err(TraceError::Configuration(
                "acquisition.sleep_step_ms: must be greater than 0".to_string(),
            ));
        }

        check("storage.base_dir", validation::is_valid_path(&self.storage.base_dir))?;
        check(
            "images.source_dir",
            validation::is_valid_path(&self.images.source_dir),
        )?;
        if let Some(max_delta) = self.images.max_delta_secs {
            check("images.max_delta_secs", validation::is_non_negative(max_delta))?;
        }

        Ok(())
    }

    /// Write a default configuration file if `path` does not exist.
    ///
    /// Returns `true` when a file was created.
    pub fn write_default<P: AsRef<Path>>(path: P) -> TraceResult<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(&TraceConfig::default())
            .map_err(|e| TraceError::Serialization(e.to_string()))?;
        std::fs::write(path, format!("{FILE_HEADER}\n{body}"))?;
        Ok(true)
    }
}

fn check(field: &str, result: Result<(), &'static str>) -> TraceResult<()> {
    result.map_err(|msg| TraceError::Configuration(format!("{field}: {msg}")))
}
