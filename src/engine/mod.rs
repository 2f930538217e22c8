//! The planning engine.
//!
//! Pure, synchronous computation from a day's calendar events and a task
//! backlog to a merged timeline. Nothing in here performs I/O; the planner
//! driver fetches the inputs and persists the output.

mod assign;
mod error;
mod format;
mod free_slots;
mod normalize;
mod prioritize;

use chrono::NaiveDate;
use tracing::{info, warn};

pub use assign::{assign, Assignment};
pub use error::{EngineError, NormalizeError};
pub use format::format_plan;
pub use free_slots::{clip_to_window, compute_free_slots, merge_busy};
pub use normalize::{
    busy_from_raw, day_start, is_date_only, local_hour, normalize, normalize_opt, parse_deadline,
};
pub use prioritize::{prioritize, PriorityWeights, RankedTask, Urgency};

use crate::config::PlannerConfig;
use crate::models::{BusyInterval, DayPlan, RawEvent, Task};

/// Plan one day from raw inputs.
///
/// Unparseable events are skipped with a warning. Only an invalid
/// configuration fails the whole run.
pub fn plan_day(
    events: &[RawEvent],
    tasks: Vec<Task>,
    date: NaiveDate,
    config: &PlannerConfig,
) -> Result<DayPlan, EngineError> {
    let tz = config.timezone;
    let window = config.window_for(date)?;

    let busy: Vec<BusyInterval> = events
        .iter()
        .filter_map(|event| busy_from_raw(event, tz))
        .collect();
    info!(
        %date,
        events = events.len(),
        busy = busy.len(),
        tasks = tasks.len(),
        "Planning day"
    );

    let free_slots = compute_free_slots(&busy, &window, config.min_slot_duration());
    let ranked = prioritize(tasks, date, &config.priority_weights);
    let Assignment {
        scheduled,
        unplaced,
        ..
    } = assign(ranked, &free_slots);

    for task in &unplaced {
        warn!(title = %task.title, "Task left unplaced");
    }

    let items = format_plan(&scheduled, events, tz);
    Ok(DayPlan {
        date,
        timezone: tz.name().to_string(),
        items,
        free_slots,
        unplaced,
    })
}
