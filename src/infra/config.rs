//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument (parsed by the binaries)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/node.toml
//!
//! A missing or unparsable file falls back to defaults with a warning. A file
//! that parses but describes an impossible schedule is rejected: the node must
//! not start with a wake/sleep window it cannot honor.

use crate::domain::schedule::{parse_weekday, OperatingSchedule, TimeOfDay};
use crate::domain::types::CountMode;
use crate::infra::error::NodeError;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    pub serial_number: u32,
    pub location: String,
    #[serde(default)]
    pub count_mode: CountMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    /// [hour, minute]
    pub wake: [u32; 2],
    /// [hour, minute]
    pub sleep: [u32; 2],
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<String>,
    #[serde(default = "default_transmit_interval_secs")]
    pub transmit_interval_secs: u64,
    #[serde(default = "default_motion_timeout_ms")]
    pub motion_timeout_ms: u64,
    /// Cadence of the measurement tick
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Cadence of re-sampling while a crossing awaits confirmation
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_weekdays() -> Vec<String> {
    ["Sun", "Mon", "Tue", "Wed", "Thu"].iter().map(|d| d.to_string()).collect()
}

fn default_transmit_interval_secs() -> u64 {
    60
}

fn default_motion_timeout_ms() -> u64 {
    1000
}

fn default_sample_interval_ms() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorsSection {
    /// GPIO value file of the left beam
    pub left_path: String,
    /// GPIO value file of the right beam
    pub right_path: String,
    /// Beam reads 0 when triggered
    #[serde(default = "default_active_low")]
    pub active_low: bool,
}

fn default_active_low() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    /// Collector address as host:port
    pub collector_addr: String,
    #[serde(default = "default_transmit_timeout_secs")]
    pub transmit_timeout_secs: u64,
    #[serde(default = "default_lan_timeout_secs")]
    pub lan_timeout_secs: u64,
}

fn default_transmit_timeout_secs() -> u64 {
    5
}

fn default_lan_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    /// Capacity used for the load percentage
    pub max: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSection {
    #[serde(default = "default_collector_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_collector_port")]
    pub port: u16,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationEntry>,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            bind_address: default_collector_bind_address(),
            port: default_collector_port(),
            state_file: default_state_file(),
            log_file: default_log_file(),
            locations: default_locations(),
        }
    }
}

fn default_collector_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_collector_port() -> u16 {
    80
}

fn default_state_file() -> String {
    "current_state.csv".to_string()
}

fn default_log_file() -> String {
    "transmission_log.csv".to_string()
}

fn default_locations() -> Vec<LocationEntry> {
    [
        ("CSE Aquarium C100", 90),
        ("CSE Aquarium B100", 55),
        ("CSE Aquarium A100", 55),
        ("Harman Science Library - Floor 2 (Loud)", 100),
        ("Harman Science Library - Floor 2 (Quiet)", 50),
        ("Harman Science Library - Floor -1", 150),
        ("Einstein Institute Math Library", 50),
    ]
    .iter()
    .map(|(name, max)| LocationEntry { name: name.to_string(), max: *max })
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    /// Log a node summary every N windows (0 disables)
    #[serde(default = "default_report_every_windows")]
    pub report_every_windows: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { report_every_windows: default_report_every_windows() }
    }
}

fn default_report_every_windows() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub node: NodeSection,
    pub schedule: ScheduleSection,
    pub sensors: SensorsSection,
    pub network: NetworkSection,
    #[serde(default)]
    pub collector: CollectorSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    serial_number: u32,
    location: String,
    count_mode: CountMode,
    schedule: OperatingSchedule,
    sample_interval: Duration,
    poll_interval: Duration,
    left_sensor_path: String,
    right_sensor_path: String,
    sensors_active_low: bool,
    collector_addr: String,
    transmit_timeout: Duration,
    lan_timeout: Duration,
    collector_bind_address: String,
    collector_port: u16,
    state_file: String,
    log_file: String,
    locations: Vec<LocationEntry>,
    report_every_windows: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_number: 1,
            location: "Harman Science Library - Floor 2 (Quiet)".to_string(),
            count_mode: CountMode::Cumulative,
            schedule: OperatingSchedule::default(),
            sample_interval: Duration::from_millis(default_sample_interval_ms()),
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            left_sensor_path: "/sys/class/gpio/gpio12/value".to_string(),
            right_sensor_path: "/sys/class/gpio/gpio14/value".to_string(),
            sensors_active_low: true,
            collector_addr: "192.168.170.34:80".to_string(),
            transmit_timeout: Duration::from_secs(default_transmit_timeout_secs()),
            lan_timeout: Duration::from_secs(default_lan_timeout_secs()),
            collector_bind_address: default_collector_bind_address(),
            collector_port: default_collector_port(),
            state_file: default_state_file(),
            log_file: default_log_file(),
            locations: default_locations(),
            report_every_windows: default_report_every_windows(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Config path when none is given on the command line
    pub fn default_config_path() -> String {
        config_path_or_default(env::var("CONFIG_FILE").ok())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Self::from_toml(toml_config, path.display().to_string())
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Result<Self, NodeError> {
        let section = &toml_config.schedule;
        let weekdays = section
            .weekdays
            .iter()
            .map(|name| parse_weekday(name))
            .collect::<Result<Vec<_>, _>>()?;

        let schedule = OperatingSchedule::new(
            TimeOfDay::new(section.wake[0], section.wake[1])?,
            TimeOfDay::new(section.sleep[0], section.sleep[1])?,
            weekdays,
            Duration::from_secs(section.transmit_interval_secs),
            Duration::from_millis(section.motion_timeout_ms),
        )?;

        if section.sample_interval_ms == 0 || section.poll_interval_ms == 0 {
            return Err(NodeError::MalformedScheduleConfig(
                "sample and poll intervals must be positive".to_string(),
            ));
        }

        let network = &toml_config.network;
        if network.transmit_timeout_secs == 0 || network.lan_timeout_secs == 0 {
            return Err(NodeError::InvalidConfig(
                "transmit and LAN timeouts must be positive".to_string(),
            ));
        }

        Ok(Self {
            serial_number: toml_config.node.serial_number,
            location: toml_config.node.location,
            count_mode: toml_config.node.count_mode,
            schedule,
            sample_interval: Duration::from_millis(section.sample_interval_ms),
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            left_sensor_path: toml_config.sensors.left_path,
            right_sensor_path: toml_config.sensors.right_path,
            sensors_active_low: toml_config.sensors.active_low,
            collector_addr: toml_config.network.collector_addr,
            transmit_timeout: Duration::from_secs(toml_config.network.transmit_timeout_secs),
            lan_timeout: Duration::from_secs(toml_config.network.lan_timeout_secs),
            collector_bind_address: toml_config.collector.bind_address,
            collector_port: toml_config.collector.port,
            state_file: toml_config.collector.state_file,
            log_file: toml_config.collector.log_file,
            locations: toml_config.collector.locations,
            report_every_windows: toml_config.metrics.report_every_windows,
            config_file,
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults.
    /// Schedule errors are never papered over with defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        match Self::from_file(path) {
            Ok(config) => Ok(config),
            Err(NodeError::Config(e)) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Capacity of a collector location
    pub fn location_max(&self, name: &str) -> Option<u32> {
        self.locations.iter().find(|entry| entry.name == name).map(|entry| entry.max)
    }

    // Getters for all config fields
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn count_mode(&self) -> CountMode {
        self.count_mode
    }

    pub fn schedule(&self) -> &OperatingSchedule {
        &self.schedule
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn left_sensor_path(&self) -> &str {
        &self.left_sensor_path
    }

    pub fn right_sensor_path(&self) -> &str {
        &self.right_sensor_path
    }

    pub fn sensors_active_low(&self) -> bool {
        self.sensors_active_low
    }

    pub fn collector_addr(&self) -> &str {
        &self.collector_addr
    }

    pub fn transmit_timeout(&self) -> Duration {
        self.transmit_timeout
    }

    pub fn lan_timeout(&self) -> Duration {
        self.lan_timeout
    }

    pub fn collector_bind_address(&self) -> &str {
        &self.collector_bind_address
    }

    pub fn collector_port(&self) -> u16 {
        self.collector_port
    }

    pub fn state_file(&self) -> &str {
        &self.state_file
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn locations(&self) -> &[LocationEntry] {
        &self.locations
    }

    pub fn report_every_windows(&self) -> u64 {
        self.report_every_windows
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests and simulation to shorten the window
    pub fn with_schedule(mut self, schedule: OperatingSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Builder method for tests to point at a local collector
    pub fn with_collector_addr(mut self, addr: &str) -> Self {
        self.collector_addr = addr.to_string();
        self
    }

    /// Builder method for tests to shorten the transmit timeout
    pub fn with_transmit_timeout(mut self, timeout: Duration) -> Self {
        self.transmit_timeout = timeout;
        self
    }

    /// Builder method for tests to shorten the link bring-up timeout
    pub fn with_lan_timeout(mut self, timeout: Duration) -> Self {
        self.lan_timeout = timeout;
        self
    }

    /// Builder method for tests to switch what goes on the wire
    pub fn with_count_mode(mut self, mode: CountMode) -> Self {
        self.count_mode = mode;
        self
    }

    /// Builder method for the collector binary's `--port` override
    pub fn with_collector_port(mut self, port: u16) -> Self {
        self.collector_port = port;
        self
    }

    /// Builder method for tests to relocate the collector's CSV files
    pub fn with_collector_files(mut self, state_file: &str, log_file: &str) -> Self {
        self.state_file = state_file.to_string();
        self.log_file = log_file.to_string();
        self
    }
}

fn config_path_or_default(from_env: Option<String>) -> String {
    from_env.filter(|path| !path.is_empty()).unwrap_or_else(|| "config/node.toml".to_string())
}
