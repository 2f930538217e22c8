use chrono_tz::Tz;
use tracing::debug;

use super::normalize::{is_date_only, normalize};
use crate::models::{EventItem, PlanItem, RawEvent, ScheduledTask, TaskItem};

/// Merge calendar events and scheduled tasks into one chronological timeline.
///
/// Event datetimes are rewritten as RFC 3339 in `tz`; date-only values stay
/// dates so that all-day items remain recognizable. A timestamp that cannot
/// be parsed is kept as received.
///
/// Items are ordered by their `start` string. An item without a start sorts
/// first (its key is the empty string) and ties keep their input order,
/// events before tasks. Ordering is lexical, so inside the hour repeated when
/// clocks go back, `01:15+00:00` sorts before `01:30+01:00` even though it is
/// the later instant.
pub fn format_plan(scheduled: &[ScheduledTask], events: &[RawEvent], tz: Tz) -> Vec<PlanItem> {
    let mut items: Vec<PlanItem> = Vec::with_capacity(events.len() + scheduled.len());

    items.extend(events.iter().map(|event| {
        PlanItem::Event(EventItem {
            start: event.start.as_deref().map(|raw| canonical(raw, tz)),
            end: event.end.as_deref().map(|raw| canonical(raw, tz)),
            summary: event.summary.clone(),
            id: event.id.clone(),
        })
    }));
    items.extend(scheduled.iter().map(|task| PlanItem::Task(TaskItem::from(task))));

    items.sort_by(|a, b| a.start().unwrap_or("").cmp(b.start().unwrap_or("")));
    debug!(items = items.len(), "Formatted plan");
    items
}

fn canonical(raw: &str, tz: Tz) -> String {
    if is_date_only(raw) {
        if let Ok(date) = normalize(raw, tz) {
            return date.date_naive().format("%Y-%m-%d").to_string();
        }
        return raw.to_string();
    }
    match normalize(raw, tz) {
        Ok(dt) => dt.to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}
