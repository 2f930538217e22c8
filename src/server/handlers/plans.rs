use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use super::error_response;
use crate::models::{StoredPlan, UserInfo};
use crate::planner::PlanError;
use crate::server::middleware::AuthenticatedUser;
use crate::server::AppState;

/// Current user info
pub async fn me(Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>) -> Json<UserInfo> {
    Json(UserInfo::from(user))
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub user: UserInfo,
    /// Most recent stored plan, if one has ever been generated
    pub plan: Option<StoredPlan>,
}

/// Latest plan for the authenticated user
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    match state.db.get_latest_plan(&user.id) {
        Ok(plan) => Json(DashboardResponse {
            user: UserInfo::from(user),
            plan,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Stored plan for one date (YYYY-MM-DD)
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(date): Path<String>,
) -> Response {
    let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid date, expected YYYY-MM-DD");
    };

    match state.db.get_plan(&user.id, date) {
        Ok(Some(plan)) => Json(plan).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("No plan for {}", date)),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Plan today right now and return the result
pub async fn generate_plan(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let job = &state.job;
    let date = job.planner.today();

    match job
        .planner
        .generate_for(&user, job.sources.as_ref(), &job.db, date)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e @ PlanError::Engine(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "On-demand plan failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[derive(Serialize)]
pub struct RunScheduleResponse {
    pub status: &'static str,
    pub date: NaiveDate,
}

/// Plan and notify in the background, the same way the daily job does
pub async fn run_schedule(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let job = state.job.clone();
    let date = job.planner.today();

    tokio::spawn(async move {
        if let Err(e) = job.run_for_user(&user).await {
            tracing::error!(user_id = %user.id, error = %format!("{:#}", e), "Manual plan run failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(RunScheduleResponse {
            status: "accepted",
            date,
        }),
    )
        .into_response()
}
