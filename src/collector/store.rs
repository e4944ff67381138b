//! CSV-backed occupancy store
//!
//! Two files:
//! - current state: one row per location (`Location,Current Amount,Max Amount`),
//!   rewritten in full on every accepted transmission
//! - transmission log: every accepted transmission appended as one row
//!
//! A node reports counts since the start of its operating day, so a
//! location's current amount is overwritten with `Entrances - Exits`, never
//! summed. The in-memory table is authoritative; the files mirror it.

use crate::domain::transmission::Transmission;
use crate::infra::config::LocationEntry;
use crate::infra::error::StoreError;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One row of the current-state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StateRow {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Current Amount")]
    current: u64,
    #[serde(rename = "Max Amount")]
    max: u32,
}

/// Point-in-time view of one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    pub location: String,
    pub current: u64,
    pub max: u32,
    /// `current / max` in percent; 0 when the capacity is 0
    pub load_pct: f64,
}

pub struct OccupancyStore {
    state_path: PathBuf,
    log_path: PathBuf,
    rows: Mutex<Vec<StateRow>>,
}

impl OccupancyStore {
    /// Create both files fresh and seed every location at zero
    pub fn bootstrap(
        state_path: impl AsRef<Path>,
        log_path: impl AsRef<Path>,
        locations: &[LocationEntry],
    ) -> Result<Self, StoreError> {
        let rows = locations
            .iter()
            .map(|entry| StateRow { location: entry.name.clone(), current: 0, max: entry.max })
            .collect();

        let store = Self {
            state_path: state_path.as_ref().to_path_buf(),
            log_path: log_path.as_ref().to_path_buf(),
            rows: Mutex::new(rows),
        };

        let mut log = csv::Writer::from_path(&store.log_path)?;
        log.write_record(["S.N.", "Location", "Weekday", "Date", "Time", "Entrances", "Exits"])?;
        log.flush()?;

        store.write_state(&store.rows.lock())?;

        info!(
            state_file = %store.state_path.display(),
            log_file = %store.log_path.display(),
            locations = %locations.len(),
            "store_bootstrapped"
        );
        Ok(store)
    }

    /// Record one transmission. Returns the location's new current amount.
    ///
    /// Both files are written before the in-memory table changes, so a failed
    /// write leaves memory and the state file agreeing on the old value.
    pub fn apply(&self, transmission: &Transmission) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock();

        let Some(index) = rows.iter().position(|row| row.location == transmission.location) else {
            warn!(
                serial_number = %transmission.serial_number,
                location = %transmission.location,
                "unknown_location"
            );
            return Err(StoreError::UnknownLocation(transmission.location.clone()));
        };

        let current = transmission.occupancy();
        let mut updated = rows.clone();
        updated[index].current = current;

        self.append_log(transmission)?;
        self.write_state(&updated)?;
        *rows = updated;

        info!(
            serial_number = %transmission.serial_number,
            location = %transmission.location,
            entrances = %transmission.entrances,
            exits = %transmission.exits,
            current = %current,
            "occupancy_updated"
        );
        Ok(current)
    }

    pub fn snapshot(&self) -> Vec<LocationSnapshot> {
        self.rows
            .lock()
            .iter()
            .map(|row| LocationSnapshot {
                location: row.location.clone(),
                current: row.current,
                max: row.max,
                load_pct: if row.max == 0 {
                    0.0
                } else {
                    row.current as f64 * 100.0 / f64::from(row.max)
                },
            })
            .collect()
    }

    fn append_log(&self, transmission: &Transmission) -> Result<(), StoreError> {
        let file = OpenOptions::new().append(true).create(true).open(&self.log_path)?;
        let mut log = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        log.serialize(transmission)?;
        log.flush()?;
        Ok(())
    }

    fn write_state(&self, rows: &[StateRow]) -> Result<(), StoreError> {
        let mut state = csv::Writer::from_path(&self.state_path)?;
        for row in rows {
            state.serialize(row)?;
        }
        if rows.is_empty() {
            state.write_record(["Location", "Current Amount", "Max Amount"])?;
        }
        state.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transmission::Timestamp;
    use std::fs;
    use tempfile::TempDir;

    fn locations() -> Vec<LocationEntry> {
        vec![
            LocationEntry { name: "CSE Aquarium C100".to_string(), max: 90 },
            LocationEntry { name: "Einstein Institute Math Library".to_string(), max: 50 },
        ]
    }

    fn report(location: &str, entrances: u64, exits: u64) -> Transmission {
        let stamp = Timestamp {
            weekday: "Wed".to_string(),
            date: "21/10/2026".to_string(),
            time: "14:30".to_string(),
        };
        Transmission::new(3, location, stamp, entrances, exits)
    }

    fn store(dir: &TempDir) -> OccupancyStore {
        OccupancyStore::bootstrap(
            dir.path().join("current_state.csv"),
            dir.path().join("transmission_log.csv"),
            &locations(),
        )
        .unwrap()
    }

    #[test]
    fn test_bootstrap_seeds_zeroes() {
        let dir = TempDir::new().unwrap();
        let _store = store(&dir);

        let state = fs::read_to_string(dir.path().join("current_state.csv")).unwrap();
        assert_eq!(
            state,
            "Location,Current Amount,Max Amount\n\
             CSE Aquarium C100,0,90\n\
             Einstein Institute Math Library,0,50\n"
        );
        let log = fs::read_to_string(dir.path().join("transmission_log.csv")).unwrap();
        assert_eq!(log, "S.N.,Location,Weekday,Date,Time,Entrances,Exits\n");
    }

    #[test]
    fn test_apply_overwrites_not_sums() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert_eq!(store.apply(&report("CSE Aquarium C100", 10, 4)).unwrap(), 6);
        assert_eq!(store.apply(&report("CSE Aquarium C100", 12, 9)).unwrap(), 3);

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].current, 3);
        assert_eq!(snapshot[1].current, 0);

        let state = fs::read_to_string(dir.path().join("current_state.csv")).unwrap();
        assert!(state.contains("CSE Aquarium C100,3,90"));

        let log = fs::read_to_string(dir.path().join("transmission_log.csv")).unwrap();
        let rows: Vec<&str> = log.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], "3,CSE Aquarium C100,Wed,21/10/2026,14:30,12,9");
    }

    #[test]
    fn test_negative_occupancy_clamped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.apply(&report("Einstein Institute Math Library", 2, 5)).unwrap(), 0);
    }

    #[test]
    fn test_unknown_location_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.apply(&report("CSE Aquarium C100", 5, 0)).unwrap();

        let err = store.apply(&report("Rothberg B220", 5, 0)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownLocation(ref name) if name == "Rothberg B220"));

        let log = fs::read_to_string(dir.path().join("transmission_log.csv")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert_eq!(store.snapshot()[0].current, 5);
    }

    #[test]
    fn test_huge_counts_do_not_wrap() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let huge = 1u64 << 63;

        assert_eq!(store.apply(&report("CSE Aquarium C100", huge, 0)).unwrap(), huge);
        assert_eq!(store.apply(&report("CSE Aquarium C100", 0, huge)).unwrap(), 0);
        assert_eq!(store.snapshot()[0].current, 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.apply(&report("Einstein Institute Math Library", 10, 0)).unwrap();

        // A directory where the log file should be makes every append fail
        let log_path = dir.path().join("transmission_log.csv");
        fs::remove_file(&log_path).unwrap();
        fs::create_dir(&log_path).unwrap();

        assert!(store.apply(&report("Einstein Institute Math Library", 15, 0)).is_err());

        assert_eq!(store.snapshot()[1].current, 10);
        let state = fs::read_to_string(dir.path().join("current_state.csv")).unwrap();
        assert!(state.contains("Einstein Institute Math Library,10,50"), "{state}");
    }

    #[test]
    fn test_load_percentage() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.apply(&report("Einstein Institute Math Library", 30, 5)).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot[1].load_pct, 50.0);
        assert_eq!(snapshot[0].load_pct, 0.0);
    }
}
