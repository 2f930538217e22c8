use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{FreeSlot, ScheduledTask, Task};

/// One entry of the merged daily timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanItem {
    Event(EventItem),
    Task(TaskItem),
}

/// A calendar commitment as it appears in the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    pub start: Option<String>,
    pub end: Option<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A backlog task placed into a free slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub start: Option<String>,
    pub end: Option<String>,
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&ScheduledTask> for TaskItem {
    fn from(scheduled: &ScheduledTask) -> Self {
        let task = &scheduled.task;
        Self {
            start: Some(scheduled.start.to_rfc3339()),
            end: Some(scheduled.end.to_rfc3339()),
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status.clone(),
            priority: task.priority.clone(),
            deadline: task.deadline,
            duration: task.duration,
            url: task.url.clone(),
        }
    }
}

impl PlanItem {
    pub fn start(&self) -> Option<&str> {
        match self {
            PlanItem::Event(e) => e.start.as_deref(),
            PlanItem::Task(t) => t.start.as_deref(),
        }
    }

    pub fn end(&self) -> Option<&str> {
        match self {
            PlanItem::Event(e) => e.end.as_deref(),
            PlanItem::Task(t) => t.end.as_deref(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PlanItem::Event(e) => &e.summary,
            PlanItem::Task(t) => &t.title,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlanItem::Event(_) => "event",
            PlanItem::Task(_) => "task",
        }
    }
}

/// Everything one planning run produced
#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub timezone: String,
    pub items: Vec<PlanItem>,
    pub free_slots: Vec<FreeSlot>,
    pub unplaced: Vec<Task>,
}

impl DayPlan {
    pub fn scheduled_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, PlanItem::Task(_)))
            .count()
    }
}

/// The persisted plan for one user and one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPlan {
    pub user_id: String,
    pub plan_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<PlanItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_item_wire_shape() {
        let item = PlanItem::Event(EventItem {
            start: Some("2026-10-16T10:00:00+01:00".to_string()),
            end: None,
            summary: "Standup".to_string(),
            id: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["summary"], "Standup");
        assert!(json["end"].is_null());

        let back: PlanItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_task_item_tagged_as_task() {
        let json = serde_json::json!({
            "type": "task",
            "start": "2026-10-16T09:00:00+01:00",
            "end": "2026-10-16T10:00:00+01:00",
            "id": "t1",
            "title": "Review",
            "priority": "Someday",
            "deadline": null,
            "duration": 1.0
        });
        let item: PlanItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.kind(), "task");
        assert_eq!(item.label(), "Review");
        assert_eq!(item.start(), Some("2026-10-16T09:00:00+01:00"));
    }
}
