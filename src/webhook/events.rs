use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PlanItem;

/// Types of webhook events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// A daily plan was generated and saved
    PlanGenerated,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::PlanGenerated => "plan.generated",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Webhook event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event type
    pub event: String,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Event-specific data
    pub data: PlanEventData,
}

impl WebhookEvent {
    pub fn new(event_type: WebhookEventType, data: PlanEventData) -> Self {
        Self {
            event: event_type.as_str().to_string(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// The delivered plan, rendered and raw
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEventData {
    pub user_id: String,
    pub plan_date: NaiveDate,
    /// Message subject, e.g. "Your Daily Plan for 2026-10-16"
    pub subject: String,
    /// HTML summary of the plan
    pub html: String,
    pub items: Vec<PlanItem>,
}
