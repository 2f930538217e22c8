use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error_response;
use crate::config::PlannerConfig;
use crate::crypto::generate_webhook_secret;
use crate::server::middleware::AuthenticatedUser;
use crate::server::AppState;

#[derive(Serialize)]
pub struct ConfigResponse {
    pub webhook_url: Option<String>,
    pub calendar_connected: bool,
    /// Server-wide planner settings, read-only over the API
    pub planner: PlannerConfig,
    pub job_hour: u32,
}

/// Get current user config
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        calendar_connected: user
            .google_refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty()),
        webhook_url: user.webhook_url,
        planner: state.job.planner.config().clone(),
        job_hour: state.job.hour,
    })
}

#[derive(Deserialize)]
pub struct UpdateConfigRequest {
    pub webhook_url: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateConfigResponse {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Update user config. An empty webhook URL removes the webhook.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateConfigRequest>,
) -> Response {
    let Some(webhook_url) = req.webhook_url else {
        return Json(UpdateConfigResponse {
            webhook_url: user.webhook_url,
            webhook_secret: None,
        })
        .into_response();
    };

    let (url, secret) = if webhook_url.is_empty() {
        (None, None)
    } else {
        if url::Url::parse(&webhook_url).is_err() {
            return error_response(StatusCode::BAD_REQUEST, "Invalid webhook URL");
        }
        // New secret whenever the URL changes
        (Some(webhook_url), Some(generate_webhook_secret()))
    };

    if let Err(e) = state
        .db
        .update_user_webhook(&user.id, url.as_deref(), secret.as_deref())
    {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    Json(UpdateConfigResponse {
        webhook_url: url,
        webhook_secret: secret,
    })
    .into_response()
}
