use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::TaskSource;
use crate::engine::parse_deadline;
use crate::models::Task;

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Names of the database properties tasks are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionProperties {
    pub title: String,
    pub status: String,
    pub priority: String,
    pub deadline: String,
    pub estimate: String,
}

impl Default for NotionProperties {
    fn default() -> Self {
        Self {
            title: "Task".to_string(),
            status: "Status".to_string(),
            priority: "Type".to_string(),
            deadline: "With".to_string(),
            estimate: "Duration".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub properties: NotionProperties,
    /// Status value that marks a task finished
    pub done_status: String,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            properties: NotionProperties::default(),
            done_status: "Done".to_string(),
        }
    }

    /// Database query body: everything whose status is not done
    fn filter(&self) -> Value {
        json!({
            "property": self.properties.status,
            "status": { "does_not_equal": self.done_status }
        })
    }
}

/// Tasks from a Notion database
pub struct NotionTasks {
    client: reqwest::Client,
    config: NotionConfig,
}

impl NotionTasks {
    pub fn new(config: NotionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[async_trait::async_trait]
impl TaskSource for NotionTasks {
    async fn open_tasks(&self) -> Result<Vec<Task>> {
        let url = format!("{}/databases/{}/query", NOTION_API, self.config.database_id);
        info!(database = %self.config.database_id, "Fetching tasks from Notion");

        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "filter": self.config.filter() });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.config.token)
                .header("Notion-Version", NOTION_VERSION)
                .json(&body)
                .send()
                .await
                .context("Failed to query Notion database")?;

            if !resp.status().is_success() {
                let error = resp.text().await.unwrap_or_default();
                anyhow::bail!("Notion query failed: {}", error);
            }

            let page: QueryPage = resp
                .json()
                .await
                .context("Failed to parse Notion response")?;
            debug!(results = page.results.len(), "Received Notion page");
            tasks.extend(
                page.results
                    .iter()
                    .map(|p| extract_task(p, &self.config.properties)),
            );

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(count = tasks.len(), "Fetched tasks from Notion");
        Ok(tasks)
    }
}

/// Read one database page into a task. Missing or mistyped properties leave
/// the field empty; they never fail the page.
pub fn extract_task(page: &Value, names: &NotionProperties) -> Task {
    let empty = Map::new();
    let props = page
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let prop = |name: &str| props.get(name);

    let title = prop(&names.title)
        .filter(|p| type_is(p, "title"))
        .and_then(|p| p.get("title")?.as_array()?.first()?.get("plain_text")?.as_str())
        .unwrap_or("Untitled")
        .to_string();

    let status = prop(&names.status).and_then(|p| {
        ["status", "select"]
            .iter()
            .find(|kind| type_is(p, kind))
            .and_then(|kind| select_name(p, kind))
    });

    let priority = prop(&names.priority)
        .filter(|p| type_is(p, "select"))
        .and_then(|p| select_name(p, "select"));

    let deadline = prop(&names.deadline)
        .filter(|p| type_is(p, "date"))
        .and_then(|p| p.get("date")?.get("start")?.as_str())
        .and_then(|raw| match parse_deadline(raw) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(deadline = raw, task = %title, error = %e, "Could not parse deadline date");
                None
            }
        });

    let duration = prop(&names.estimate)
        .filter(|p| type_is(p, "number"))
        .and_then(|p| p.get("number")?.as_f64());

    Task {
        id: page
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        title,
        status,
        priority,
        deadline,
        duration,
        url: page.get("url").and_then(Value::as_str).map(str::to_string),
    }
}

fn type_is(prop: &Value, kind: &str) -> bool {
    prop.get("type").and_then(Value::as_str) == Some(kind)
}

fn select_name(prop: &Value, kind: &str) -> Option<String> {
    prop.get(kind)?.get("name")?.as_str().map(str::to_string)
}
