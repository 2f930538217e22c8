//! Timestamp normalization.
//!
//! Calendar providers hand out a mix of date-only strings, UTC datetimes and
//! datetimes with or without an offset. Everything is turned into an instant
//! in the planner's timezone before any comparison happens.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::warn;

use super::error::NormalizeError;
use crate::models::{BusyInterval, RawEvent};

/// How far past a DST gap we look for the first valid local time.
const GAP_SEARCH_MINUTES: i64 = 180;

/// Parse a raw timestamp into an instant in `tz`.
///
/// Datetimes with `Z` or an explicit offset are converted; datetimes without
/// one are read as local time in `tz`. A bare date is midnight local time.
pub fn normalize(raw: &str, tz: Tz) -> Result<DateTime<Tz>, NormalizeError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if !s.contains('T') {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| NormalizeError::Invalid(s.to_string()))?;
        return Ok(day_start(tz, date));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&tz));
    }

    // rfc3339 insists on seconds; accept "HH:MM" with a zone too
    let zoned = match s.strip_suffix(['Z', 'z']) {
        Some(rest) => format!("{}+00:00", rest),
        None => s.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_str(&zoned, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt.with_timezone(&tz));
    }

    let naive = s
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|_| NormalizeError::Invalid(s.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| NormalizeError::NonexistentLocalTime {
            time: naive.to_string(),
            tz: tz.name().to_string(),
        })
}

/// Like [`normalize`], but logs the failure and yields `None` so the caller
/// can skip the item.
pub fn normalize_opt(raw: Option<&str>, tz: Tz) -> Option<DateTime<Tz>> {
    let raw = raw?;
    match normalize(raw, tz) {
        Ok(dt) => Some(dt),
        Err(e) => {
            warn!(timestamp = raw, error = %e, "Could not parse timestamp");
            None
        }
    }
}

/// True for strings without a time component
pub fn is_date_only(raw: &str) -> bool {
    let s = raw.trim();
    !s.is_empty() && !s.contains('T')
}

/// Parse a task deadline. Datetimes keep only their own calendar date.
pub fn parse_deadline(raw: &str) -> Result<NaiveDate, NormalizeError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NormalizeError::Empty);
    }
    if !s.contains('T') {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| NormalizeError::Invalid(s.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    s.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.date())
        .map_err(|_| NormalizeError::Invalid(s.to_string()))
}

/// The instant at `hour`:00 local time on `day`. Hour 24 is the next midnight.
pub fn local_hour(tz: Tz, day: NaiveDate, hour: u32) -> DateTime<Tz> {
    let naive = day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
    resolve_local(tz, naive)
}

pub fn day_start(tz: Tz, day: NaiveDate) -> DateTime<Tz> {
    local_hour(tz, day, 0)
}

/// Resolve a wall-clock time, taking the earlier reading when it is ambiguous
/// and the first valid minute after a DST gap when it does not exist.
pub(crate) fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut probe = naive;
    for _ in 0..=GAP_SEARCH_MINUTES {
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt;
        }
        probe += Duration::minutes(1);
    }
    tz.from_utc_datetime(&naive)
}

/// Turn a raw calendar event into a busy interval, or skip it.
pub fn busy_from_raw(event: &RawEvent, tz: Tz) -> Option<BusyInterval> {
    let start = normalize_opt(event.start.as_deref(), tz);
    let end = normalize_opt(event.end.as_deref(), tz);
    let (Some(start), Some(end)) = (start, end) else {
        warn!(summary = %event.summary, "Skipping event due to parse error");
        return None;
    };

    let date_only = event.start.as_deref().is_some_and(is_date_only);
    let is_all_day =
        date_only || (start.time() == NaiveTime::MIN && end - start >= Duration::days(1));

    match BusyInterval::new(start, end, is_all_day, event.summary.clone()) {
        Ok(interval) => Some(interval),
        Err(e) => {
            warn!(summary = %event.summary, error = %e, "Skipping malformed event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::London;

    fn london(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        London.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_utc_marker_is_converted() {
        // BST is UTC+1 in October
        let dt = normalize("2026-10-16T09:00:00Z", London).unwrap();
        assert_eq!(dt, london(2026, 10, 16, 10, 0));
        assert_eq!(dt.timezone(), London);
    }

    #[test]
    fn test_explicit_offset_is_converted() {
        let dt = normalize("2026-10-16T10:00:00-04:00", London).unwrap();
        assert_eq!(dt, london(2026, 10, 16, 15, 0));
    }

    #[test]
    fn test_naive_datetime_is_local() {
        assert_eq!(
            normalize("2026-10-16T10:30:00", London).unwrap(),
            london(2026, 10, 16, 10, 30)
        );
        assert_eq!(
            normalize("2026-10-16T10:30", London).unwrap(),
            london(2026, 10, 16, 10, 30)
        );
        assert_eq!(
            normalize("2026-10-16T10:30Z", London).unwrap(),
            london(2026, 10, 16, 11, 30)
        );
    }

    #[test]
    fn test_date_only_is_local_midnight() {
        let dt = normalize("2026-10-16", New_York).unwrap();
        assert_eq!(dt, New_York.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());
        assert!(is_date_only("2026-10-16"));
        assert!(!is_date_only("2026-10-16T00:00:00"));
    }

    #[test]
    fn test_fractional_seconds() {
        let dt = normalize("2026-10-16T08:00:00.250Z", London).unwrap();
        assert_eq!(dt.with_timezone(&Utc).timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert_eq!(normalize("", London), Err(NormalizeError::Empty));
        assert!(matches!(
            normalize("tomorrow", London),
            Err(NormalizeError::Invalid(_))
        ));
        assert!(normalize("2026-13-40", London).is_err());
        assert!(normalize("2026-10-16Tnoon", London).is_err());
        assert_eq!(normalize_opt(Some("nope"), London), None);
        assert_eq!(normalize_opt(None, London), None);
    }

    #[test]
    fn test_nonexistent_local_time() {
        // Clocks jump from 01:00 to 02:00 on 2026-03-29 in London
        assert!(matches!(
            normalize("2026-03-29T01:30:00", London),
            Err(NormalizeError::NonexistentLocalTime { .. })
        ));
        // but a window boundary in the gap resolves forward
        let resolved = local_hour(London, NaiveDate::from_ymd_opt(2026, 3, 29).unwrap(), 1);
        assert_eq!(resolved, london(2026, 3, 29, 2, 0));
    }

    #[test]
    fn test_parse_deadline() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(parse_deadline("2026-10-18"), Ok(day));
        assert_eq!(parse_deadline("2026-10-18T23:00:00+02:00"), Ok(day));
        assert_eq!(parse_deadline("2026-10-18T10:00"), Ok(day));
        assert!(parse_deadline("18/10/2026").is_err());
    }

    #[test]
    fn test_busy_from_raw_flags_all_day() {
        let all_day = RawEvent::new("Holiday", "2026-10-16", "2026-10-17");
        let interval = busy_from_raw(&all_day, London).unwrap();
        assert!(interval.is_all_day);

        let meeting = RawEvent::new("Sync", "2026-10-16T10:00:00+01:00", "2026-10-16T11:00:00+01:00");
        let interval = busy_from_raw(&meeting, London).unwrap();
        assert!(!interval.is_all_day);
        assert_eq!(interval.label, "Sync");

        let broken = RawEvent::new("Broken", "2026-10-16T10:00:00", "soon");
        assert!(busy_from_raw(&broken, London).is_none());

        let inverted = RawEvent::new("Backwards", "2026-10-16T11:00:00", "2026-10-16T10:00:00");
        assert!(busy_from_raw(&inverted, London).is_none());
    }
}
