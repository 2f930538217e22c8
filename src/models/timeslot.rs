use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::engine::{day_start, local_hour, EngineError};

/// A calendar item exactly as a calendar source hands it over.
///
/// Timestamps stay raw strings (date-only or datetime, with or without an
/// offset) until the normalizer turns them into instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

fn default_summary() -> String {
    "No Title".to_string()
}

impl RawEvent {
    pub fn new(summary: &str, start: &str, end: &str) -> Self {
        Self {
            id: None,
            summary: summary.to_string(),
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }
}

/// A normalized busy period from the calendar
#[derive(Debug, Clone, PartialEq)]
pub struct BusyInterval {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub is_all_day: bool,
    pub label: String,
}

impl BusyInterval {
    pub fn new(
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        is_all_day: bool,
        label: impl Into<String>,
    ) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvertedInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self {
            start,
            end,
            is_all_day,
            label: label.into(),
        })
    }

    /// Check if the interval covers any part of the given local calendar day
    pub fn touches_day(&self, day: NaiveDate) -> bool {
        let tz = self.start.timezone();
        let midnight = day_start(tz, day);
        let next_midnight = match day.succ_opt() {
            Some(next) => day_start(tz, next),
            None => return false,
        };
        self.start < next_midnight && self.end > midnight
    }
}

/// Working hours for one calendar day in one timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkWindow {
    pub day: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
    pub tz: Tz,
}

impl WorkWindow {
    pub fn new(day: NaiveDate, start_hour: u32, end_hour: u32, tz: Tz) -> Result<Self, EngineError> {
        if end_hour > 24 || start_hour >= end_hour {
            return Err(EngineError::InvalidWindow {
                start_hour,
                end_hour,
            });
        }
        Ok(Self {
            day,
            start_hour,
            end_hour,
            tz,
        })
    }

    pub fn start(&self) -> DateTime<Tz> {
        local_hour(self.tz, self.day, self.start_hour)
    }

    pub fn end(&self) -> DateTime<Tz> {
        local_hour(self.tz, self.day, self.end_hour)
    }
}

/// An unscheduled stretch of working time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeSlot {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl FreeSlot {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Check if this slot overlaps with another
    pub fn overlaps(&self, other: &FreeSlot) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Check if this slot contains the given range
    pub fn contains(&self, start: DateTime<Tz>, end: DateTime<Tz>) -> bool {
        self.start <= start && self.end >= end
    }
}
