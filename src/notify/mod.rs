//! Plan delivery: an HTML summary pushed to the user's webhook.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use tracing::{debug, info};

use crate::models::{PlanItem, User};
use crate::webhook::{PlanEventData, WebhookClient, WebhookEvent, WebhookEventType};

const STYLE: &str = "body { font-family: sans-serif; }\
    ul { list-style: none; padding-left: 0; }\
    li { margin-bottom: 15px; padding: 10px; border-radius: 5px; }\
    .event { background-color: #e0f2fe; border-left: 5px solid #3b82f6; }\
    .task { background-color: #fef3c7; border-left: 5px solid #f59e0b; }\
    .time { font-weight: bold; display: block; margin-bottom: 5px; }\
    .title { font-size: 1.1em; }\
    .details { font-size: 0.9em; color: #555; }";

pub const EMPTY_PLAN_MESSAGE: &str = "No events or scheduled tasks for today.";

/// Whether a notification actually left the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The user has no delivery destination configured
    Skipped,
}

/// Delivers a rendered plan to its owner
#[async_trait]
pub trait PlanNotifier: Send + Sync {
    async fn notify(&self, user: &User, date: NaiveDate, items: &[PlanItem]) -> Result<Delivery>;
}

pub fn subject_for(date: NaiveDate) -> String {
    format!("Your Daily Plan for {}", date.format("%Y-%m-%d"))
}

/// Render a plan as a self-contained HTML document
pub fn render_html(items: &[PlanItem]) -> String {
    let mut html = format!(
        "<html><head><style>{}</style></head><body><h2>Your Daily Plan</h2><ul>",
        STYLE
    );

    if items.is_empty() {
        html.push_str(&format!("<li>{}</li>", EMPTY_PLAN_MESSAGE));
    }

    for item in items {
        html.push_str(&format!(
            r#"<li class="{}"><span class="time">{}</span><span class="title">{}</span>"#,
            item.kind(),
            escape_html(&time_label(item)),
            escape_html(item.label())
        ));

        if let PlanItem::Task(task) = item {
            let mut details = Vec::new();
            if let Some(priority) = &task.priority {
                details.push(format!("Priority: {}", priority));
            }
            if let Some(hours) = task.duration {
                details.push(format!("Est: {}h", hours));
            }
            if let Some(deadline) = task.deadline {
                details.push(format!("Deadline: {}", deadline));
            }
            if !details.is_empty() {
                html.push_str(&format!(
                    r#"<div class="details">{}</div>"#,
                    escape_html(&details.join(" | "))
                ));
            }
            if let Some(url) = &task.url {
                html.push_str(&format!(
                    r#"<div class="details"><a href="{}">View in Notion</a></div>"#,
                    escape_html(url)
                ));
            }
        }
        html.push_str("</li>");
    }

    html.push_str("</ul></body></html>");
    html
}

/// "09:00 AM - 10:30 AM", "All Day (2026-10-16)" or "Time TBD"
pub fn time_label(item: &PlanItem) -> String {
    let Some(start) = item.start() else {
        return "Time TBD".to_string();
    };
    if !start.contains('T') {
        return match start.parse::<NaiveDate>() {
            Ok(day) => format!("All Day ({})", day),
            Err(_) => "All Day".to_string(),
        };
    }
    let Ok(start) = DateTime::parse_from_rfc3339(start) else {
        debug!(start, "Unreadable start time in plan item");
        return "Time TBD".to_string();
    };
    let start_label = start.format("%I:%M %p").to_string();
    match item.end().map(DateTime::parse_from_rfc3339) {
        Some(Ok(end)) => format!("{} - {}", start_label, end.format("%I:%M %p")),
        _ => start_label,
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sends `plan.generated` events to each user's registered webhook
pub struct WebhookNotifier {
    client: WebhookClient,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: WebhookClient::new(),
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanNotifier for WebhookNotifier {
    async fn notify(&self, user: &User, date: NaiveDate, items: &[PlanItem]) -> Result<Delivery> {
        let (Some(url), Some(secret)) = (&user.webhook_url, &user.webhook_secret) else {
            debug!(user_id = %user.id, "No webhook configured, skipping notification");
            return Ok(Delivery::Skipped);
        };

        let event = WebhookEvent::new(
            WebhookEventType::PlanGenerated,
            PlanEventData {
                user_id: user.id.clone(),
                plan_date: date,
                subject: subject_for(date),
                html: render_html(items),
                items: items.to_vec(),
            },
        );
        self.client.deliver(url, secret, &event).await?;
        info!(user_id = %user.id, %date, "Sent daily plan");
        Ok(Delivery::Sent)
    }
}
