use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::OutputFormat;
use crate::config::{parse_timezone, PlannerConfig};
use crate::engine;
use crate::models::{DayPlan, PlanItem, RawEvent, Task};
use crate::notify::time_label;

/// Flags for an offline planning run; `None` keeps the configured value
#[derive(Debug, Default, Clone)]
pub struct PlanOptions {
    pub date: Option<NaiveDate>,
    pub timezone: Option<String>,
    pub start_hour: Option<u32>,
    pub end_hour: Option<u32>,
    pub min_slot: Option<i64>,
}

impl PlanOptions {
    /// Layer the flags over `base`
    pub fn apply(&self, base: PlannerConfig) -> Result<PlannerConfig> {
        let mut config = base;
        if let Some(name) = &self.timezone {
            config.timezone = parse_timezone(name)?;
        }
        if let Some(hour) = self.start_hour {
            config.work_start_hour = hour;
        }
        if let Some(hour) = self.end_hour {
            config.work_end_hour = hour;
        }
        if let Some(minutes) = self.min_slot {
            config.min_slot_minutes = minutes;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Human view of a computed plan
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct PlanReport(pub DayPlan);

impl std::fmt::Display for PlanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = &self.0;
        writeln!(f, "Plan for {} ({})", plan.date, plan.timezone)?;
        write_items(f, &plan.items)?;

        if !plan.unplaced.is_empty() {
            writeln!(f)?;
            writeln!(f, "Did not fit:")?;
            for task in &plan.unplaced {
                match task.duration {
                    Some(hours) => writeln!(f, "  {} ({}h)", task.title, hours)?,
                    None => writeln!(f, "  {} (no estimate)", task.title)?,
                }
            }
        }

        let free_minutes: i64 = plan.free_slots.iter().map(|s| s.duration_minutes()).sum();
        writeln!(
            f,
            "\n{} task(s) scheduled, {} free slot(s) totalling {} min",
            plan.scheduled_count(),
            plan.free_slots.len(),
            free_minutes
        )
    }
}

/// One timeline line per item
pub(crate) fn write_items(f: &mut std::fmt::Formatter<'_>, items: &[PlanItem]) -> std::fmt::Result {
    if items.is_empty() {
        return writeln!(f, "  {}", crate::notify::EMPTY_PLAN_MESSAGE);
    }
    for item in items {
        writeln!(f, "  {:<24} [{}] {}", time_label(item), item.kind(), item.label())?;
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} file {}", what, path.display()))
}

/// Plan a day from JSON fixture files without touching any service
pub fn plan_from_files(
    events_path: &Path,
    tasks_path: &Path,
    options: &PlanOptions,
) -> Result<DayPlan> {
    let config = options.apply(PlannerConfig::from_env()?)?;
    let events: Vec<RawEvent> = read_json(events_path, "events")?;
    let tasks: Vec<Task> = read_json(tasks_path, "tasks")?;
    let date = options.date.unwrap_or_else(|| config.today());

    Ok(engine::plan_day(&events, tasks, date, &config)?)
}

/// Run the offline `plan` command
pub fn run_plan(
    events_path: &Path,
    tasks_path: &Path,
    options: &PlanOptions,
    format: OutputFormat,
) -> Result<()> {
    let plan = plan_from_files(events_path, tasks_path, options)?;
    format.print(&PlanReport(plan))
}
