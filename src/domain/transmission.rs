//! Wire payload sent from a node to the collector
//!
//! Serialized as one JSON object whose keys appear in a fixed order:
//! `S.N.`, `Location`, `Weekday`, `Date`, `Time`, `Entrances`, `Exits`.

use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// Weekday, date and time strings derived from one wall-clock reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    /// `Mon` .. `Sun`
    pub weekday: String,
    /// `DD/MM/YYYY`
    pub date: String,
    /// `HH:MM`
    pub time: String,
}

/// Format a local wall-clock reading for the wire
pub fn format_timestamp(now: NaiveDateTime) -> Timestamp {
    Timestamp {
        weekday: weekday_name(now.weekday()).to_string(),
        date: now.format("%d/%m/%Y").to_string(),
        time: now.format("%H:%M").to_string(),
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// One report from a node. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transmission {
    #[serde(rename = "S.N.")]
    pub serial_number: u32,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Weekday")]
    pub weekday: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Entrances")]
    pub entrances: u64,
    #[serde(rename = "Exits")]
    pub exits: u64,
}

impl Transmission {
    pub fn new(
        serial_number: u32,
        location: &str,
        stamp: Timestamp,
        entrances: u64,
        exits: u64,
    ) -> Self {
        Self {
            serial_number,
            location: location.to_string(),
            weekday: stamp.weekday,
            date: stamp.date,
            time: stamp.time,
            entrances,
            exits,
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings and integers: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Occupancy implied by this report. Exits can exceed entrances when a
    /// crossing was missed; that reads as an empty room.
    pub fn occupancy(&self) -> u64 {
        self.entrances.saturating_sub(self.exits)
    }
}
