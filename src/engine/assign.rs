use tracing::{debug, info, warn};

use super::prioritize::RankedTask;
use crate::models::{FreeSlot, ScheduledTask, Task};

/// Result of placing ranked tasks into free slots
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub scheduled: Vec<ScheduledTask>,
    /// Tasks that fit in no remaining slot, in priority order
    pub unplaced: Vec<Task>,
    /// Slots left over after placement, in input order
    pub remaining: Vec<FreeSlot>,
}

/// First-fit placement.
///
/// Each task, in the given order, goes at the start of the earliest slot long
/// enough to hold it. The used prefix is cut off the slot; a slot used up
/// exactly disappears. Tasks are never split across slots.
///
/// Slots are scanned in the order given; `compute_free_slots` already
/// returns them chronologically.
pub fn assign(tasks: Vec<RankedTask>, slots: &[FreeSlot]) -> Assignment {
    let mut remaining: Vec<FreeSlot> = slots.to_vec();

    let mut scheduled = Vec::new();
    let mut unplaced = Vec::new();

    for ranked in tasks {
        let needed = ranked.duration;
        let Some(index) = remaining.iter().position(|slot| slot.duration() >= needed) else {
            warn!(
                title = %ranked.task.title,
                minutes = needed.num_minutes(),
                "Could not find a suitable slot for task"
            );
            unplaced.push(ranked.task);
            continue;
        };

        let slot = &mut remaining[index];
        let start = slot.start;
        let end = start + needed;
        debug!(title = %ranked.task.title, %start, %end, "Scheduled task");

        if end == slot.end {
            remaining.remove(index);
        } else {
            slot.start = end;
        }
        scheduled.push(ScheduledTask {
            task: ranked.task,
            start,
            end,
        });
    }

    info!(
        scheduled = scheduled.len(),
        unplaced = unplaced.len(),
        "Finished assigning tasks"
    );
    Assignment {
        scheduled,
        unplaced,
        remaining,
    }
}
