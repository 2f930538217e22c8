use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::error_response;
use crate::server::middleware::AuthenticatedUser;
use crate::server::AppState;

/// Open tasks as the task source reports them
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let tasks = state.job.sources.tasks_for(&user);
    match tasks.open_tasks().await {
        Ok(tasks) => Json(tasks).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e)),
    }
}

/// Today's raw calendar events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let planner = &state.job.planner;
    let calendar = match state.job.sources.calendar_for(&user) {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{:#}", e)),
    };

    match calendar
        .events_for_day(planner.today(), planner.config().timezone)
        .await
    {
        Ok(events) => Json(events).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e)),
    }
}
