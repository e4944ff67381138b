//! Dual-beam sensor input
//!
//! The detector only needs an instantaneous read of both beams. Hardware is
//! read through the sysfs GPIO `value` files; tests and `--simulate` replay a
//! timeline against the tokio clock.

use crate::domain::types::{Level, Levels};
use crate::infra::config::Config;
use std::fs;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Instantaneous read of both beams
pub trait SensorPair: Send {
    fn read(&mut self) -> Levels;
}

/// Beams exposed as sysfs GPIO value files (`0` / `1`)
pub struct SysfsSensorPair {
    left_path: String,
    right_path: String,
    active_low: bool,
    /// Set while reads are failing so a dead line is logged once, not per tick
    read_failing: bool,
}

impl SysfsSensorPair {
    pub fn new(config: &Config) -> Self {
        Self {
            left_path: config.left_sensor_path().to_string(),
            right_path: config.right_sensor_path().to_string(),
            active_low: config.sensors_active_low(),
            read_failing: false,
        }
    }
}

/// Decode a GPIO value file's contents
fn decode_level(raw: &str, active_low: bool) -> Option<Level> {
    let high = match raw.trim() {
        "1" => true,
        "0" => false,
        _ => return None,
    };
    Some(if high != active_low { Level::On } else { Level::Off })
}

fn read_level(path: &str, active_low: bool) -> Option<Level> {
    fs::read_to_string(path).ok().and_then(|raw| decode_level(&raw, active_low))
}

impl SensorPair for SysfsSensorPair {
    /// Both files are read before anything is returned. A failed read counts
    /// as `Off`: it is transient and must never stall sampling.
    fn read(&mut self) -> Levels {
        let left = read_level(&self.left_path, self.active_low);
        let right = read_level(&self.right_path, self.active_low);

        let failing = left.is_none() || right.is_none();
        if failing && !self.read_failing {
            warn!(left = %self.left_path, right = %self.right_path, "sensor_read_failed");
        } else if !failing && self.read_failing {
            debug!("sensor_read_recovered");
        }
        self.read_failing = failing;

        Levels::new(left.unwrap_or(Level::Off), right.unwrap_or(Level::Off))
    }
}

/// Replays `(offset, levels)` steps measured from construction time
///
/// Each step holds until the next one. Before the first step both beams
/// read `Off`. With a period set, the timeline repeats.
pub struct ScriptedSensors {
    started_at: Instant,
    steps: Vec<(Duration, Levels)>,
    period: Option<Duration>,
}

impl ScriptedSensors {
    pub fn new(mut steps: Vec<(Duration, Levels)>) -> Self {
        steps.sort_by_key(|(offset, _)| *offset);
        Self { started_at: Instant::now(), steps, period: None }
    }

    /// Repeat the timeline every `period`
    pub fn looping(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            self.period = Some(period);
        }
        self
    }

    /// A walk through the portal: one beam, both, the other, clear
    pub fn crossing(start: Duration, first_right: bool, step: Duration) -> Vec<(Duration, Levels)> {
        let (first, second) = if first_right {
            (Levels::new(Level::Off, Level::On), Levels::new(Level::On, Level::Off))
        } else {
            (Levels::new(Level::On, Level::Off), Levels::new(Level::Off, Level::On))
        };
        vec![
            (start, first),
            (start + step, Levels::new(Level::On, Level::On)),
            (start + step * 2, second),
            (start + step * 3, Levels::IDLE),
        ]
    }

    fn levels_at(&self, elapsed: Duration) -> Levels {
        let elapsed = match self.period {
            Some(period) => Duration::from_nanos((elapsed.as_nanos() % period.as_nanos()) as u64),
            None => elapsed,
        };
        self.steps
            .iter()
            .take_while(|(offset, _)| *offset <= elapsed)
            .last()
            .map(|(_, levels)| *levels)
            .unwrap_or(Levels::IDLE)
    }
}

impl SensorPair for ScriptedSensors {
    fn read(&mut self) -> Levels {
        self.levels_at(self.started_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_scripted_steps_hold_until_next() {
        let sensors = ScriptedSensors::new(vec![
            (ms(100), Levels::new(Level::Off, Level::On)),
            (ms(300), Levels::new(Level::On, Level::Off)),
        ]);
        assert_eq!(sensors.levels_at(ms(0)), Levels::IDLE);
        assert_eq!(sensors.levels_at(ms(100)), Levels::new(Level::Off, Level::On));
        assert_eq!(sensors.levels_at(ms(299)), Levels::new(Level::Off, Level::On));
        assert_eq!(sensors.levels_at(ms(5000)), Levels::new(Level::On, Level::Off));
    }

    #[test]
    fn test_scripted_looping() {
        let sensors =
            ScriptedSensors::new(ScriptedSensors::crossing(ms(0), true, ms(100))).looping(ms(1000));
        assert_eq!(sensors.levels_at(ms(1000)), Levels::new(Level::Off, Level::On));
        assert_eq!(sensors.levels_at(ms(1150)), Levels::new(Level::On, Level::On));
        assert_eq!(sensors.levels_at(ms(1350)), Levels::IDLE);
    }

    fn gpio_file(value: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{value}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_sysfs_active_low_polarity() {
        let left = gpio_file("0");
        let right = gpio_file("1");
        let mut sensors = SysfsSensorPair {
            left_path: left.path().display().to_string(),
            right_path: right.path().display().to_string(),
            active_low: true,
            read_failing: false,
        };
        assert_eq!(sensors.read(), Levels::new(Level::On, Level::Off));

        sensors.active_low = false;
        assert_eq!(sensors.read(), Levels::new(Level::Off, Level::On));
    }

    #[test]
    fn test_sysfs_missing_file_reads_off() {
        let right = gpio_file("0");
        let mut sensors = SysfsSensorPair {
            left_path: "/nonexistent/gpio/value".to_string(),
            right_path: right.path().display().to_string(),
            active_low: true,
            read_failing: false,
        };
        assert_eq!(sensors.read(), Levels::new(Level::Off, Level::On));
        assert!(sensors.read_failing);
    }
}
