//! Integration tests for configuration loading

use chrono::Weekday;
use occupancy_sensor::domain::types::CountMode;
use occupancy_sensor::infra::{Config, NodeError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

const FULL_CONFIG: &str = r#"
[node]
serial_number = 4
location = "Einstein Institute Math Library"
count_mode = "per_window"

[schedule]
wake = [9, 30]
sleep = [17, 45]
weekdays = ["Mon", "Wed"]
transmit_interval_secs = 30
motion_timeout_ms = 800
sample_interval_ms = 5
poll_interval_ms = 20

[sensors]
left_path = "/tmp/left"
right_path = "/tmp/right"
active_low = false

[network]
collector_addr = "10.0.0.5:8080"
transmit_timeout_secs = 3
lan_timeout_secs = 10

[collector]
port = 8080
state_file = "/var/lib/occupancy/state.csv"
locations = [{ name = "Einstein Institute Math Library", max = 50 }]

[metrics]
report_every_windows = 0
"#;

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(FULL_CONFIG);
    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.serial_number(), 4);
    assert_eq!(config.location(), "Einstein Institute Math Library");
    assert_eq!(config.count_mode(), CountMode::PerWindow);

    let schedule = config.schedule();
    assert_eq!(schedule.wake().to_string(), "09:30");
    assert_eq!(schedule.sleep().to_string(), "17:45");
    assert_eq!(schedule.weekdays(), &[Weekday::Mon, Weekday::Wed]);
    assert_eq!(schedule.transmit_interval(), Duration::from_secs(30));
    assert_eq!(schedule.motion_timeout(), Duration::from_millis(800));

    assert_eq!(config.sample_interval(), Duration::from_millis(5));
    assert_eq!(config.poll_interval(), Duration::from_millis(20));
    assert_eq!(config.left_sensor_path(), "/tmp/left");
    assert!(!config.sensors_active_low());
    assert_eq!(config.collector_addr(), "10.0.0.5:8080");
    assert_eq!(config.transmit_timeout(), Duration::from_secs(3));
    assert_eq!(config.lan_timeout(), Duration::from_secs(10));

    assert_eq!(config.collector_port(), 8080);
    assert_eq!(config.collector_bind_address(), "0.0.0.0");
    assert_eq!(config.state_file(), "/var/lib/occupancy/state.csv");
    assert_eq!(config.log_file(), "transmission_log.csv");
    assert_eq!(config.location_max("Einstein Institute Math Library"), Some(50));
    assert_eq!(config.report_every_windows(), 0);
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/node.toml").unwrap();
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.serial_number(), 1);
}

#[test]
fn test_unparsable_file_falls_back() {
    let temp_file = write_config("[node\nserial_number = ");
    let config = Config::load_from_path(temp_file.path()).unwrap();
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_wake_after_sleep_is_fatal() {
    let content = FULL_CONFIG.replace("wake = [9, 30]", "wake = [20, 0]");
    let temp_file = write_config(&content);

    let err = Config::load_from_path(temp_file.path()).unwrap_err();
    assert!(matches!(err, NodeError::MalformedScheduleConfig(_)), "{err}");
}

#[test]
fn test_out_of_range_time_is_fatal() {
    let content = FULL_CONFIG.replace("sleep = [17, 45]", "sleep = [17, 75]");
    let temp_file = write_config(&content);

    let err = Config::load_from_path(temp_file.path()).unwrap_err();
    assert!(matches!(err, NodeError::MalformedScheduleConfig(_)), "{err}");
}

#[test]
fn test_unknown_weekday_is_fatal() {
    let content = FULL_CONFIG.replace(r#"["Mon", "Wed"]"#, r#"["Mon", "Someday"]"#);
    let temp_file = write_config(&content);

    let err = Config::load_from_path(temp_file.path()).unwrap_err();
    assert!(matches!(err, NodeError::MalformedScheduleConfig(_)), "{err}");
}

#[test]
fn test_zero_network_timeouts_are_fatal() {
    for (from, to) in [("transmit_timeout_secs = 3", "transmit_timeout_secs = 0"), ("lan_timeout_secs = 10", "lan_timeout_secs = 0")] {
        let temp_file = write_config(&FULL_CONFIG.replace(from, to));

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(matches!(err, NodeError::InvalidConfig(_)), "{to}: {err}");
    }
}

#[test]
fn test_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/node.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.locations().len(), 7);
    assert_eq!(config.schedule().weekdays().len(), 5);
}
