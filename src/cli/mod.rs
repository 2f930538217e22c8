mod auth;
mod config;
mod plan;
mod remote;

pub use auth::*;
pub use config::*;
pub use plan::*;
pub use remote::*;

use anyhow::{Context, Result};
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn print<T: Serialize + std::fmt::Display>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Human => println!("{}", value),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
            }
        }
        Ok(())
    }
}

/// Success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl std::fmt::Display for SuccessResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Get the API client for making requests to the server
pub fn get_api_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("{}/{}", crate::APP_NAME, env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to create HTTP client")
}

/// Get the server URL from config or default
pub fn get_server_url() -> String {
    crate::models::LocalConfig::load()
        .ok()
        .and_then(|c| c.server_url)
        .unwrap_or_else(|| crate::DEFAULT_SERVER_URL.to_string())
}

/// Get the API key from local config
pub fn get_api_key() -> Result<String> {
    let config = crate::models::LocalConfig::load()?;
    config
        .api_key
        .ok_or_else(|| anyhow::anyhow!("Not logged in. Run 'dayplan login' first."))
}

/// Turn a non-2xx response into an error carrying the server's message
pub(crate) async fn check_response(
    resp: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    anyhow::bail!("Failed to {} ({}): {}", action, status, message)
}
