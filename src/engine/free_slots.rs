use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use tracing::{debug, info};

use super::normalize::day_start;
use crate::models::{BusyInterval, FreeSlot, WorkWindow};

/// Clip a busy interval to the working window.
///
/// An all-day interval that touches the window's day starts at the window
/// start. It blocks through the window end only when it runs past the day;
/// otherwise it ends where it ends. Returns `None` when nothing of the
/// interval is left.
pub fn clip_to_window(
    interval: &BusyInterval,
    window: &WorkWindow,
) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let (work_start, work_end) = (window.start(), window.end());

    let (start, end) = if interval.is_all_day {
        if !interval.touches_day(window.day) {
            return None;
        }
        let runs_past_day = match window.day.succ_opt() {
            Some(next) => interval.end >= day_start(window.tz, next),
            None => true,
        };
        let end = if runs_past_day {
            work_end
        } else {
            interval.end.min(work_end)
        };
        (work_start, end)
    } else {
        (interval.start.max(work_start), interval.end.min(work_end))
    };

    (start < end).then_some((start, end))
}

/// Clip, sort and merge busy intervals into maximal non-overlapping runs.
/// Touching runs (`next.start == current.end`) are merged.
pub fn merge_busy(
    busy: &[BusyInterval],
    window: &WorkWindow,
) -> Vec<(DateTime<Tz>, DateTime<Tz>)> {
    let mut clipped: Vec<_> = busy
        .iter()
        .filter_map(|interval| clip_to_window(interval, window))
        .collect();
    clipped.sort_by_key(|&(start, end)| (start, end));

    let mut merged: Vec<(DateTime<Tz>, DateTime<Tz>)> = Vec::with_capacity(clipped.len());
    for (start, end) in clipped {
        match merged.last_mut() {
            Some(current) if start <= current.1 => {
                if end > current.1 {
                    current.1 = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Compute the free slots of a working window.
///
/// A gap becomes a slot only when it is strictly longer than `min_duration`.
pub fn compute_free_slots(
    busy: &[BusyInterval],
    window: &WorkWindow,
    min_duration: Duration,
) -> Vec<FreeSlot> {
    let (work_start, work_end) = (window.start(), window.end());
    let merged = merge_busy(busy, window);

    if merged.is_empty() {
        info!(day = %window.day, "No busy intervals found within working hours");
    } else {
        debug!(day = %window.day, runs = merged.len(), "Merged busy intervals");
    }

    let mut free = Vec::with_capacity(merged.len() + 1);
    let mut cursor = work_start;
    for &(start, end) in &merged {
        push_gap(&mut free, cursor, start, min_duration);
        cursor = cursor.max(end);
    }
    push_gap(&mut free, cursor, work_end, min_duration);

    info!(
        day = %window.day,
        tz = %window.tz,
        slots = free.len(),
        "Calculated free slots"
    );
    free
}

fn push_gap(free: &mut Vec<FreeSlot>, start: DateTime<Tz>, end: DateTime<Tz>, min: Duration) {
    if end - start > min {
        free.push(FreeSlot::new(start, end));
    }
}
