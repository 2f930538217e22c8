use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;

use crate::engine::EngineError;
use crate::models::WorkWindow;

pub use crate::engine::PriorityWeights;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::London;
pub const DEFAULT_WORK_START_HOUR: u32 = 9;
pub const DEFAULT_WORK_END_HOUR: u32 = 17;
pub const DEFAULT_MIN_SLOT_MINUTES: i64 = 15;
pub const DEFAULT_JOB_HOUR: u32 = 5;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Parameters of one planning run.
///
/// Process-wide for now, but always handed to the engine explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannerConfig {
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub min_slot_minutes: i64,
    pub priority_weights: PriorityWeights,
}

fn serialize_tz<S: serde::Serializer>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(tz.name())
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            work_start_hour: DEFAULT_WORK_START_HOUR,
            work_end_hour: DEFAULT_WORK_END_HOUR,
            min_slot_minutes: DEFAULT_MIN_SLOT_MINUTES,
            priority_weights: PriorityWeights::default(),
        }
    }
}

impl PlannerConfig {
    /// Read planner settings from `DAYPLAN_*` variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let defaults = Self::default();
        let timezone = match lookup("DAYPLAN_TIMEZONE") {
            Some(name) => parse_timezone(&name)?,
            None => defaults.timezone,
        };
        let config = Self {
            timezone,
            work_start_hour: parsed(&lookup, "DAYPLAN_WORK_START", defaults.work_start_hour),
            work_end_hour: parsed(&lookup, "DAYPLAN_WORK_END", defaults.work_end_hour),
            min_slot_minutes: parsed(&lookup, "DAYPLAN_MIN_SLOT_MINUTES", defaults.min_slot_minutes),
            priority_weights: defaults.priority_weights,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.work_end_hour > 24 || self.work_start_hour >= self.work_end_hour {
            return Err(EngineError::InvalidWindow {
                start_hour: self.work_start_hour,
                end_hour: self.work_end_hour,
            });
        }
        Ok(())
    }

    pub fn window_for(&self, day: NaiveDate) -> Result<WorkWindow, EngineError> {
        WorkWindow::new(day, self.work_start_hour, self.work_end_hour, self.timezone)
    }

    pub fn min_slot_duration(&self) -> Duration {
        Duration::minutes(self.min_slot_minutes.max(0))
    }

    /// Current calendar date in the planner timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, EngineError> {
    Tz::from_str(name.trim()).map_err(|_| EngineError::UnknownTimezone(name.to_string()))
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring invalid setting");
            default
        }),
        None => default,
    }
}

/// Process settings for the server and the daily job
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    /// Local hour at which the daily job runs
    pub job_hour: u32,
    pub fetch_timeout: StdDuration,
    pub planner: PlannerConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let planner = PlannerConfig::from_lookup(&lookup)?;
        let job_hour = parsed(&lookup, "DAYPLAN_JOB_HOUR", DEFAULT_JOB_HOUR);
        if job_hour > 23 {
            anyhow::bail!("DAYPLAN_JOB_HOUR must be between 0 and 23, got {}", job_hour);
        }
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            google_client_id: lookup("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: lookup("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            notion_token: non_empty("NOTION_TOKEN"),
            notion_database_id: non_empty("NOTION_DATABASE_ID"),
            job_hour,
            fetch_timeout: StdDuration::from_secs(parsed(
                &lookup,
                "DAYPLAN_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
            planner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.timezone.name(), "Europe/London");
        assert_eq!(config.min_slot_duration(), Duration::minutes(15));
    }

    #[test]
    fn test_overrides() {
        let config = PlannerConfig::from_lookup(lookup(&[
            ("DAYPLAN_TIMEZONE", "America/New_York"),
            ("DAYPLAN_WORK_START", "8"),
            ("DAYPLAN_WORK_END", "18"),
            ("DAYPLAN_MIN_SLOT_MINUTES", "30"),
        ]))
        .unwrap();
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!((config.work_start_hour, config.work_end_hour), (8, 18));
        assert_eq!(config.min_slot_minutes, 30);
    }

    #[test]
    fn test_unknown_timezone() {
        let err = PlannerConfig::from_lookup(lookup(&[("DAYPLAN_TIMEZONE", "Mars/Olympus")]));
        assert_eq!(err, Err(EngineError::UnknownTimezone("Mars/Olympus".to_string())));
    }

    #[test]
    fn test_inverted_hours_rejected() {
        let err = PlannerConfig::from_lookup(lookup(&[
            ("DAYPLAN_WORK_START", "17"),
            ("DAYPLAN_WORK_END", "9"),
        ]));
        assert!(matches!(err, Err(EngineError::InvalidWindow { .. })));
    }

    #[test]
    fn test_garbage_number_falls_back() {
        let config =
            PlannerConfig::from_lookup(lookup(&[("DAYPLAN_MIN_SLOT_MINUTES", "lots")])).unwrap();
        assert_eq!(config.min_slot_minutes, DEFAULT_MIN_SLOT_MINUTES);
    }

    #[test]
    fn test_server_config() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("NOTION_TOKEN", "secret"),
            ("NOTION_DATABASE_ID", "  "),
            ("DAYPLAN_JOB_HOUR", "6"),
        ]))
        .unwrap();
        assert_eq!(config.google_client_id, "id");
        assert_eq!(config.notion_token.as_deref(), Some("secret"));
        assert_eq!(config.notion_database_id, None);
        assert_eq!(config.job_hour, 6);
        assert_eq!(config.fetch_timeout, StdDuration::from_secs(30));

        assert!(ServerConfig::from_lookup(lookup(&[("DAYPLAN_JOB_HOUR", "24")])).is_err());
    }
}
