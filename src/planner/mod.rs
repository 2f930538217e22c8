//! The planning driver: fetch inputs, run the engine, persist the result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info};

use crate::calendar::{CalendarSource, GoogleCalendar};
use crate::config::{PlannerConfig, ServerConfig};
use crate::engine::{self, EngineError};
use crate::models::{DayPlan, PlanItem, RawEvent, Task, User};
use crate::tasks::{NoTasks, NotionConfig, NotionTasks, TaskSource};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("calendar fetch failed: {0:#}")]
    CalendarFetch(anyhow::Error),
    #[error("task fetch failed: {0:#}")]
    TaskFetch(anyhow::Error),
    #[error("{0} fetch timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Where generated plans are kept
pub trait PlanStore: Send + Sync {
    /// Atomically replace the plan for (user, date)
    fn save_plan(&self, user_id: &str, date: NaiveDate, items: &[PlanItem]) -> Result<()>;
}

/// Builds the per-user data sources
pub trait SourceProvider: Send + Sync {
    fn calendar_for(&self, user: &User) -> Result<Arc<dyn CalendarSource>>;
    fn tasks_for(&self, user: &User) -> Arc<dyn TaskSource>;
}

/// Google Calendar with each user's own refresh token; one shared Notion
/// database for tasks
pub struct LiveSources {
    google_client_id: String,
    google_client_secret: String,
    tasks: Arc<dyn TaskSource>,
}

impl LiveSources {
    pub fn new(config: &ServerConfig) -> Self {
        let tasks: Arc<dyn TaskSource> = match (&config.notion_token, &config.notion_database_id) {
            (Some(token), Some(database_id)) => {
                Arc::new(NotionTasks::new(NotionConfig::new(token, database_id)))
            }
            _ => {
                tracing::warn!("NOTION_TOKEN or NOTION_DATABASE_ID not set, tasks will be empty");
                Arc::new(NoTasks)
            }
        };
        Self {
            google_client_id: config.google_client_id.clone(),
            google_client_secret: config.google_client_secret.clone(),
            tasks,
        }
    }
}

impl SourceProvider for LiveSources {
    fn calendar_for(&self, user: &User) -> Result<Arc<dyn CalendarSource>> {
        let token = user
            .google_refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("User {} has not connected a calendar", user.email))?;
        Ok(Arc::new(GoogleCalendar::new(
            &self.google_client_id,
            &self.google_client_secret,
            token,
        )))
    }

    fn tasks_for(&self, _user: &User) -> Arc<dyn TaskSource> {
        self.tasks.clone()
    }
}

/// A computed plan and whether it reached the store
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub plan: DayPlan,
    pub saved: bool,
}

pub struct Planner {
    config: PlannerConfig,
    fetch_timeout: Duration,
}

impl Planner {
    pub fn new(config: PlannerConfig, fetch_timeout: Duration) -> Self {
        Self {
            config,
            fetch_timeout,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Today in the planner timezone
    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }

    /// Fetch both inputs concurrently. Either one failing or timing out fails
    /// the whole fetch.
    pub async fn fetch(
        &self,
        calendar: &dyn CalendarSource,
        tasks: &dyn TaskSource,
        date: NaiveDate,
    ) -> Result<(Vec<RawEvent>, Vec<Task>), PlanError> {
        let (events, tasks) = tokio::join!(
            timeout(
                self.fetch_timeout,
                calendar.events_for_day(date, self.config.timezone)
            ),
            timeout(self.fetch_timeout, tasks.open_tasks()),
        );

        let events = events
            .map_err(|_| PlanError::Timeout("calendar", self.fetch_timeout))?
            .map_err(PlanError::CalendarFetch)?;
        let tasks = tasks
            .map_err(|_| PlanError::Timeout("task", self.fetch_timeout))?
            .map_err(PlanError::TaskFetch)?;
        Ok((events, tasks))
    }

    /// Fetch, plan and persist one user's day.
    ///
    /// A store failure is logged and reported through `saved`; the plan is
    /// still returned.
    pub async fn generate(
        &self,
        user_id: &str,
        calendar: &dyn CalendarSource,
        tasks: &dyn TaskSource,
        store: &dyn PlanStore,
        date: NaiveDate,
    ) -> Result<PlanOutcome, PlanError> {
        info!(user_id, %date, "Generating daily plan");
        let (events, tasks) = self.fetch(calendar, tasks, date).await?;
        let plan = engine::plan_day(&events, tasks, date, &self.config)?;

        let saved = match store.save_plan(user_id, date, &plan.items) {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, %date, error = %format!("{:#}", e), "Failed to save plan");
                false
            }
        };

        info!(
            user_id,
            %date,
            items = plan.items.len(),
            scheduled = plan.scheduled_count(),
            unplaced = plan.unplaced.len(),
            saved,
            "Daily plan ready"
        );
        Ok(PlanOutcome { plan, saved })
    }

    /// [`Planner::generate`] with sources resolved for `user`
    pub async fn generate_for(
        &self,
        user: &User,
        sources: &dyn SourceProvider,
        store: &dyn PlanStore,
        date: NaiveDate,
    ) -> Result<PlanOutcome, PlanError> {
        let calendar = sources.calendar_for(user).map_err(PlanError::CalendarFetch)?;
        let tasks = sources.tasks_for(user);
        self.generate(&user.id, calendar.as_ref(), tasks.as_ref(), store, date)
            .await
    }
}
