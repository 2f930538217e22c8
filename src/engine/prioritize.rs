use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{Priority, Task};

/// Scores assigned to each stated priority; unranked tasks score 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            high: 3,
            medium: 2,
            low: 1,
        }
    }
}

impl PriorityWeights {
    pub fn score(&self, priority: Option<Priority>) -> u32 {
        match priority {
            Some(Priority::High) => self.high,
            Some(Priority::Medium) => self.medium,
            Some(Priority::Low) => self.low,
            None => 0,
        }
    }
}

/// Days left until a deadline. Tasks without one sort after every dated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Days(i64),
    NoDeadline,
}

impl Urgency {
    pub fn for_deadline(deadline: Option<NaiveDate>, today: NaiveDate) -> Self {
        match deadline {
            Some(deadline) => Urgency::Days((deadline - today).num_days().max(0)),
            None => Urgency::NoDeadline,
        }
    }
}

/// A schedulable task with the scores of the current planning run
#[derive(Debug, Clone, PartialEq)]
pub struct RankedTask {
    pub task: Task,
    pub urgency: Urgency,
    pub priority_score: u32,
    pub duration: Duration,
}

/// Drop tasks without a usable estimate and order the rest: soonest deadline
/// first, then highest priority. Exact ties keep their input order.
pub fn prioritize(tasks: Vec<Task>, today: NaiveDate, weights: &PriorityWeights) -> Vec<RankedTask> {
    info!(count = tasks.len(), "Prioritizing tasks");

    let mut ranked: Vec<RankedTask> = tasks
        .into_iter()
        .filter_map(|task| {
            let Some(duration) = task.estimate() else {
                debug!(title = %task.title, "Skipping task without a valid estimate");
                return None;
            };
            Some(RankedTask {
                urgency: Urgency::for_deadline(task.deadline, today),
                priority_score: weights.score(task.priority_level()),
                duration,
                task,
            })
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| b.priority_score.cmp(&a.priority_score))
    });

    for (position, entry) in ranked.iter().enumerate() {
        debug!(
            position = position + 1,
            title = %entry.task.title,
            urgency = ?entry.urgency,
            priority = entry.priority_score,
            "Ranked task"
        );
    }
    info!(count = ranked.len(), "Finished prioritizing tasks");
    ranked
}
