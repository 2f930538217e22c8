use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{check_response, get_api_client, get_api_key, get_server_url, OutputFormat};
use crate::models::LocalConfig;

/// Planner settings as the server reports them
#[derive(Debug, Serialize, Deserialize)]
pub struct RemotePlannerSettings {
    pub timezone: String,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub min_slot_minutes: i64,
}

/// Config show response
#[derive(Debug, Serialize)]
pub struct ConfigShowResponse {
    pub email: Option<String>,
    pub server_url: Option<String>,
    pub calendar_connected: bool,
    pub webhook_url: Option<String>,
    pub planner: RemotePlannerSettings,
    pub job_hour: u32,
}

impl std::fmt::Display for ConfigShowResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Email: {}", self.email.as_deref().unwrap_or("not set"))?;
        writeln!(
            f,
            "Server: {}",
            self.server_url.as_deref().unwrap_or("not set")
        )?;
        writeln!(
            f,
            "Calendar: {}",
            if self.calendar_connected {
                "connected"
            } else {
                "not connected"
            }
        )?;
        writeln!(
            f,
            "Webhook URL: {}",
            self.webhook_url.as_deref().unwrap_or("not set")
        )?;
        writeln!(
            f,
            "Working hours: {:02}:00-{:02}:00 {}",
            self.planner.work_start_hour, self.planner.work_end_hour, self.planner.timezone
        )?;
        writeln!(f, "Minimum slot: {} min", self.planner.min_slot_minutes)?;
        writeln!(f, "Daily plan at: {:02}:00", self.job_hour)
    }
}

/// Show current configuration
pub async fn run_config_show(format: OutputFormat) -> Result<()> {
    let local_config = LocalConfig::load()?;
    let api_key = get_api_key()?;
    let server_url = get_server_url();

    let resp = get_api_client()?
        .get(format!("{}/v1/config", server_url))
        .bearer_auth(&api_key)
        .send()
        .await
        .context("Failed to fetch config")?;
    let resp = check_response(resp, "get config").await?;

    #[derive(Deserialize)]
    struct ServerConfig {
        calendar_connected: bool,
        webhook_url: Option<String>,
        planner: RemotePlannerSettings,
        job_hour: u32,
    }

    let server_config: ServerConfig = resp.json().await.context("Failed to parse config")?;

    format.print(&ConfigShowResponse {
        email: local_config.email,
        server_url: local_config.server_url,
        calendar_connected: server_config.calendar_connected,
        webhook_url: server_config.webhook_url,
        planner: server_config.planner,
        job_hour: server_config.job_hour,
    })
}

/// Webhook update response; the secret is only ever shown here
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl std::fmt::Display for WebhookResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.webhook_url, &self.webhook_secret) {
            (Some(url), Some(secret)) => {
                writeln!(f, "Webhook URL set to: {}", url)?;
                writeln!(f, "Signing secret: {}", secret)
            }
            _ => writeln!(f, "Webhook URL removed"),
        }
    }
}

/// Set or clear the webhook URL
pub async fn run_config_webhook(url: Option<&str>, format: OutputFormat) -> Result<()> {
    let api_key = get_api_key()?;
    let server_url = get_server_url();

    let resp = get_api_client()?
        .patch(format!("{}/v1/config", server_url))
        .bearer_auth(&api_key)
        .json(&serde_json::json!({
            "webhook_url": url.unwrap_or(""),
        }))
        .send()
        .await
        .context("Failed to update config")?;
    let resp = check_response(resp, "update webhook").await?;

    let response: WebhookResponse = resp.json().await.context("Failed to parse response")?;
    format.print(&response)
}

/// Set server URL (local only)
pub fn run_config_server(url: &str, format: OutputFormat) -> Result<()> {
    let mut config = LocalConfig::load().unwrap_or_default();
    config.server_url = Some(url.trim_end_matches('/').to_string());
    config.save()?;

    format.print(&super::SuccessResponse {
        message: format!("Server URL set to: {}", url),
    })
}
