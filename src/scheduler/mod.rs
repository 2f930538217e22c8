//! Daily batch job: plan and notify every registered user.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::engine::local_hour;
use crate::models::User;
use crate::notify::{Delivery, PlanNotifier};
use crate::planner::{PlanOutcome, Planner, SourceProvider};

/// Summary of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    /// (user id, error message)
    pub failed: Vec<(String, String)>,
    pub notified: usize,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Planned {} user(s), {} notified, {} failed",
            self.succeeded.len(),
            self.notified,
            self.failed.len()
        )?;
        for (user_id, error) in &self.failed {
            writeln!(f, "  {}: {}", user_id, error)?;
        }
        Ok(())
    }
}

/// Everything the daily job needs, shared with the API server
pub struct DailyJob {
    pub db: Database,
    pub planner: Arc<Planner>,
    pub sources: Arc<dyn SourceProvider>,
    pub notifier: Arc<dyn PlanNotifier>,
    /// Local hour of the planner timezone at which the job fires
    pub hour: u32,
}

impl DailyJob {
    /// Plan today for one user and deliver the result.
    ///
    /// Returns the outcome and whether a notification went out. A failed
    /// delivery is logged but does not fail the run.
    pub async fn run_for_user(&self, user: &User) -> Result<(PlanOutcome, bool)> {
        let date = self.planner.today();
        let outcome = self
            .planner
            .generate_for(user, self.sources.as_ref(), &self.db, date)
            .await?;

        let notified = match self.notifier.notify(user, date, &outcome.plan.items).await {
            Ok(Delivery::Sent) => true,
            Ok(Delivery::Skipped) => false,
            Err(e) => {
                error!(user_id = %user.id, error = %format!("{:#}", e), "Failed to send daily plan");
                false
            }
        };
        Ok((outcome, notified))
    }

    /// Run the job once over every user. One user's failure never stops the
    /// others; only failing to list users fails the batch.
    pub async fn run_once(&self) -> Result<BatchReport> {
        info!("Starting daily planning job");
        let users = self.db.list_users()?;
        if users.is_empty() {
            info!("No registered users, skipping plan generation");
        }

        let mut report = BatchReport::default();
        for user in &users {
            info!(user_id = %user.id, email = %user.email, "Processing user");
            match self.run_for_user(user).await {
                Ok((_, notified)) => {
                    report.succeeded.push(user.id.clone());
                    if notified {
                        report.notified += 1;
                    }
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(user_id = %user.id, error = %message, "Plan generation failed");
                    report.failed.push((user.id.clone(), message));
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            notified = report.notified,
            "Daily planning job finished"
        );
        Ok(report)
    }

    /// Run forever at the configured hour. Abort the handle to stop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let tz = self.planner.config().timezone;
            loop {
                let now = Utc::now().with_timezone(&tz);
                let next = next_run_after(now, self.hour);
                let wait = (next - now).to_std().unwrap_or_default();
                info!(next_run = %next.to_rfc3339(), "Scheduled daily planning job");
                tokio::time::sleep(wait).await;

                if let Err(e) = self.run_once().await {
                    warn!(error = %format!("{:#}", e), "Daily planning job failed");
                }
            }
        })
    }
}

/// The first `hour`:00 local time strictly after `now`
pub fn next_run_after(now: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        let candidate = local_hour(tz, day, hour);
        if candidate > now {
            return candidate;
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => return now + Duration::days(1),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarSource;
    use crate::config::PlannerConfig;
    use crate::models::PlanItem;
    use crate::planner::testing::{BrokenCalendar, FixedCalendar, FixedTasks};
    use crate::tasks::TaskSource;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Europe::London;
    use std::sync::Mutex;

    /// Calendar fails for users whose email starts with "broken"
    struct PerUserSources;

    impl SourceProvider for PerUserSources {
        fn calendar_for(&self, user: &User) -> Result<Arc<dyn CalendarSource>> {
            if user.email.starts_with("broken") {
                Ok(Arc::new(BrokenCalendar))
            } else {
                Ok(Arc::new(FixedCalendar(vec![])))
            }
        }

        fn tasks_for(&self, _user: &User) -> Arc<dyn TaskSource> {
            Arc::new(FixedTasks(vec![crate::models::Task::new("t", "Task", 1.0)]))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlanNotifier for RecordingNotifier {
        async fn notify(&self, user: &User, _date: NaiveDate, _items: &[PlanItem]) -> Result<Delivery> {
            self.sent.lock().unwrap().push(user.id.clone());
            Ok(Delivery::Sent)
        }
    }

    fn user(id: &str, email: &str, created_at: i64) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            google_refresh_token: Some("token".to_string()),
            api_key_hash: String::new(),
            webhook_url: None,
            webhook_secret: None,
            created_at,
        }
    }

    fn job(db: Database, notifier: Arc<RecordingNotifier>) -> DailyJob {
        DailyJob {
            db,
            planner: Arc::new(Planner::new(
                PlannerConfig::default(),
                std::time::Duration::from_secs(5),
            )),
            sources: Arc::new(PerUserSources),
            notifier,
            hour: 5,
        }
    }

    #[tokio::test]
    async fn test_failing_user_does_not_stop_batch() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("a", "alice@example.com", 1)).unwrap();
        db.create_user(&user("b", "broken@example.com", 2)).unwrap();
        db.create_user(&user("c", "carol@example.com", 3)).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let job = job(db.clone(), notifier.clone());
        let report = job.run_once().await.unwrap();

        assert_eq!(report.succeeded, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(report.failed[0].1.contains("calendar unavailable"));
        assert_eq!(report.notified, 2);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["a".to_string(), "c".to_string()]);

        let today = job.planner.today();
        assert!(db.get_plan("a", today).unwrap().is_some());
        assert!(db.get_plan("b", today).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_user_list() {
        let job = job(
            Database::open_in_memory().unwrap(),
            Arc::new(RecordingNotifier::default()),
        );
        let report = job.run_once().await.unwrap();
        assert!(report.succeeded.is_empty() && report.failed.is_empty());
    }

    #[test]
    fn test_next_run_later_today() {
        let now = London.with_ymd_and_hms(2026, 10, 16, 3, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, 5),
            London.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_tomorrow() {
        let now = London.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, 5),
            London.with_ymd_and_hms(2026, 10, 17, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_across_clock_change() {
        // 2026-10-25 is 25 hours long in London
        let now = London.with_ymd_and_hms(2026, 10, 24, 6, 0, 0).unwrap();
        let next = next_run_after(now, 5);
        assert_eq!(next, London.with_ymd_and_hms(2026, 10, 25, 5, 0, 0).unwrap());
        assert_eq!((next - now).num_hours(), 24);
    }
}
