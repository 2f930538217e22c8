use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::plan::write_items;
use super::{check_response, get_api_client, get_api_key, get_server_url, OutputFormat};
use crate::models::{PlanItem, StoredPlan, Task};

/// Latest stored plan, as `dayplan today` shows it
#[derive(Debug, Serialize, Deserialize)]
pub struct TodayResponse {
    pub plan: Option<StoredPlan>,
}

impl std::fmt::Display for TodayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.plan {
            Some(plan) => {
                writeln!(
                    f,
                    "Plan for {} (generated {})",
                    plan.plan_date,
                    plan.generated_at.format("%Y-%m-%d %H:%M UTC")
                )?;
                write_items(f, &plan.items)
            }
            None => writeln!(f, "No plan yet. Run 'dayplan generate' to create one."),
        }
    }
}

/// Show the most recent plan stored on the server
pub async fn run_today(format: OutputFormat) -> Result<()> {
    let api_key = get_api_key()?;
    let server_url = get_server_url();

    let resp = get_api_client()?
        .get(format!("{}/v1/dashboard", server_url))
        .bearer_auth(&api_key)
        .send()
        .await
        .context("Failed to fetch plan")?;
    let resp = check_response(resp, "fetch plan").await?;

    let response: TodayResponse = resp.json().await.context("Failed to parse response")?;
    format.print(&response)
}

/// Result of an on-demand planning run
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub plan: GeneratedPlan,
    pub saved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub date: NaiveDate,
    pub timezone: String,
    pub items: Vec<PlanItem>,
    #[serde(default)]
    pub unplaced: Vec<Task>,
}

impl std::fmt::Display for GenerateResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plan for {} ({})", self.plan.date, self.plan.timezone)?;
        write_items(f, &self.plan.items)?;
        for task in &self.plan.unplaced {
            writeln!(f, "  Did not fit: {}", task.title)?;
        }
        if !self.saved {
            writeln!(f, "Warning: the server could not store this plan")?;
        }
        Ok(())
    }
}

/// Ask the server to plan today now
pub async fn run_generate(format: OutputFormat) -> Result<()> {
    let api_key = get_api_key()?;
    let server_url = get_server_url();

    let resp = get_api_client()?
        .post(format!("{}/v1/plans/generate", server_url))
        .bearer_auth(&api_key)
        .send()
        .await
        .context("Failed to generate plan")?;
    let resp = check_response(resp, "generate plan").await?;

    let response: GenerateResponse = resp.json().await.context("Failed to parse response")?;
    format.print(&response)
}
