use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::parse_deadline;

/// Stated priority of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Case-insensitive; anything else is unranked
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A backlog item from the task source.
///
/// `priority` keeps the label exactly as the source spelled it so that
/// unrecognized values survive into the rendered plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient_deadline")]
    pub deadline: Option<NaiveDate>,
    /// Estimated effort in hours
    #[serde(default, alias = "estimate_hours")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_title() -> String {
    "Untitled".to_string()
}

fn lenient_deadline<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|s| match parse_deadline(s) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(deadline = s, error = %e, "Ignoring unparseable task deadline");
            None
        }
    }))
}

impl Task {
    pub fn new(id: &str, title: &str, duration_hours: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            status: None,
            priority: None,
            deadline: None,
            duration: Some(duration_hours),
            url: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority.as_str().to_string());
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn priority_level(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(Priority::parse)
    }

    /// Estimated effort rounded to whole seconds. `None` when the estimate
    /// is missing, not positive, or too large to represent.
    pub fn estimate(&self) -> Option<Duration> {
        let hours = self.duration?;
        if !hours.is_finite() || hours <= 0.0 {
            return None;
        }
        let seconds = (hours * 3600.0).round() as i64;
        if seconds <= 0 {
            return None;
        }
        let estimate = Duration::try_seconds(seconds);
        if estimate.is_none() {
            tracing::warn!(task_id = %self.id, hours, "Task estimate out of range");
        }
        estimate
    }

    /// Tasks without a positive estimate are never scheduled
    pub fn is_schedulable(&self) -> bool {
        self.estimate().is_some()
    }
}

/// A task pinned to a concrete time range
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub task: Task,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}
