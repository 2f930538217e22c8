use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{PlanItem, StoredPlan, User};
use crate::planner::PlanStore;

const MIGRATION_001: &str = include_str!("migrations/001_initial.sql");

const USER_COLUMNS: &str =
    "id, email, google_refresh_token, api_key_hash, webhook_url, webhook_secret, created_at";

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(MIGRATION_001)
            .context("Failed to run migration 001")?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Create a new user
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO users (id, email, google_refresh_token, api_key_hash,
                               webhook_url, webhook_secret, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.id,
                user.email,
                user.google_refresh_token,
                user.api_key_hash,
                user.webhook_url,
                user.webhook_secret,
                user.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
        stmt.query_row(params![id], user_from_row)
            .optional()
            .context("Failed to get user")
    }

    /// Get a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))?;
        stmt.query_row(params![email], user_from_row)
            .optional()
            .context("Failed to get user by email")
    }

    /// All registered users, oldest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id ASC",
            USER_COLUMNS
        ))?;
        let users = stmt.query_map([], user_from_row)?;
        users
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")
    }

    /// Update user's refresh token
    pub fn update_user_refresh_token(&self, user_id: &str, token: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET google_refresh_token = ?1 WHERE id = ?2",
            params![token, user_id],
        )?;
        Ok(())
    }

    /// Update user's webhook configuration
    pub fn update_user_webhook(
        &self,
        user_id: &str,
        webhook_url: Option<&str>,
        webhook_secret: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET webhook_url = ?1, webhook_secret = ?2 WHERE id = ?3",
            params![webhook_url, webhook_secret, user_id],
        )?;
        Ok(())
    }

    /// Update user's API key hash
    pub fn update_user_api_key_hash(&self, user_id: &str, api_key_hash: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET api_key_hash = ?1 WHERE id = ?2",
            params![api_key_hash, user_id],
        )?;
        Ok(())
    }

    /// Find user by validating API key against stored hashes
    pub fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        for user in self.list_users()? {
            if crate::crypto::verify_api_key(api_key, &user.api_key_hash) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    // ==================== Plan Operations ====================

    /// Replace the plan stored for (user, date).
    ///
    /// Delete and insert run in one transaction; on any error the previous
    /// plan stays in place.
    pub fn save_plan(&self, user_id: &str, date: NaiveDate, items: &[PlanItem]) -> Result<()> {
        let payload = serde_json::to_string(items).context("Failed to serialize plan")?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM daily_plans WHERE user_id = ?1 AND plan_date = ?2",
            params![user_id, date.to_string()],
        )?;
        tx.execute(
            "INSERT INTO daily_plans (user_id, plan_date, items, generated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, date.to_string(), payload, Utc::now().timestamp()],
        )?;
        tx.commit().context("Failed to commit plan")?;
        Ok(())
    }

    /// Get the plan stored for a date
    pub fn get_plan(&self, user_id: &str, date: NaiveDate) -> Result<Option<StoredPlan>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, plan_date, items, generated_at
             FROM daily_plans WHERE user_id = ?1 AND plan_date = ?2",
        )?;
        let raw = stmt
            .query_row(params![user_id, date.to_string()], raw_plan_from_row)
            .optional()
            .context("Failed to get plan")?;
        raw.map(RawPlan::into_stored).transpose()
    }

    /// Get the plan with the most recent date
    pub fn get_latest_plan(&self, user_id: &str) -> Result<Option<StoredPlan>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, plan_date, items, generated_at
             FROM daily_plans WHERE user_id = ?1
             ORDER BY plan_date DESC LIMIT 1",
        )?;
        let raw = stmt
            .query_row(params![user_id], raw_plan_from_row)
            .optional()
            .context("Failed to get latest plan")?;
        raw.map(RawPlan::into_stored).transpose()
    }
}

impl PlanStore for Database {
    fn save_plan(&self, user_id: &str, date: NaiveDate, items: &[PlanItem]) -> Result<()> {
        Database::save_plan(self, user_id, date, items)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        google_refresh_token: row.get(2)?,
        api_key_hash: row.get(3)?,
        webhook_url: row.get(4)?,
        webhook_secret: row.get(5)?,
        created_at: row.get(6)?,
    })
}

struct RawPlan {
    user_id: String,
    plan_date: String,
    items: String,
    generated_at: i64,
}

fn raw_plan_from_row(row: &Row<'_>) -> rusqlite::Result<RawPlan> {
    Ok(RawPlan {
        user_id: row.get(0)?,
        plan_date: row.get(1)?,
        items: row.get(2)?,
        generated_at: row.get(3)?,
    })
}

impl RawPlan {
    fn into_stored(self) -> Result<StoredPlan> {
        let plan_date = self
            .plan_date
            .parse::<NaiveDate>()
            .with_context(|| format!("Invalid stored plan date '{}'", self.plan_date))?;
        let items: Vec<PlanItem> =
            serde_json::from_str(&self.items).context("Failed to parse stored plan")?;
        Ok(StoredPlan {
            user_id: self.user_id,
            plan_date,
            generated_at: DateTime::from_timestamp(self.generated_at, 0).unwrap_or_else(Utc::now),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventItem;

    fn create_test_user(email: &str) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            google_refresh_token: Some("token123".to_string()),
            api_key_hash: bcrypt::hash("test_api_key", 4).unwrap(),
            webhook_url: None,
            webhook_secret: None,
            created_at: Utc::now().timestamp(),
        }
    }

    fn event(summary: &str, start: &str) -> PlanItem {
        PlanItem::Event(EventItem {
            start: Some(start.to_string()),
            end: None,
            summary: summary.to_string(),
            id: None,
        })
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_create_and_get_user() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("test@example.com");

        db.create_user(&user).unwrap();

        let retrieved = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(retrieved.email, user.email);
        assert_eq!(retrieved.google_refresh_token.as_deref(), Some("token123"));

        let by_email = db.get_user_by_email("test@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn test_find_user_by_api_key() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("test@example.com");

        db.create_user(&user).unwrap();

        let found = db.find_user_by_api_key("test_api_key").unwrap();
        assert_eq!(found.unwrap().id, user.id);

        let not_found = db.find_user_by_api_key("wrong_key").unwrap();
        assert!(not_found.is_none());
    }

    #[test]
    fn test_update_webhook() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("hook@example.com");
        db.create_user(&user).unwrap();

        db.update_user_webhook(&user.id, Some("https://example.com/hook"), Some("s3cret"))
            .unwrap();
        let updated = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(updated.webhook_url.as_deref(), Some("https://example.com/hook"));
        assert_eq!(updated.webhook_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_save_replaces_plan_for_same_date() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("plan@example.com");
        db.create_user(&user).unwrap();

        db.save_plan(&user.id, date(15), &[event("Yesterday", "2026-10-15T09:00:00+01:00")])
            .unwrap();
        db.save_plan(&user.id, date(16), &[event("First", "2026-10-16T09:00:00+01:00")])
            .unwrap();
        db.save_plan(&user.id, date(16), &[event("Second", "2026-10-16T10:00:00+01:00")])
            .unwrap();

        let today = db.get_plan(&user.id, date(16)).unwrap().unwrap();
        assert_eq!(today.items.len(), 1);
        assert_eq!(today.items[0].label(), "Second");

        let yesterday = db.get_plan(&user.id, date(15)).unwrap().unwrap();
        assert_eq!(yesterday.items[0].label(), "Yesterday");

        let latest = db.get_latest_plan(&user.id).unwrap().unwrap();
        assert_eq!(latest.plan_date, date(16));

        assert!(db.get_plan(&user.id, date(17)).unwrap().is_none());
    }

    #[test]
    fn test_empty_plan_is_stored() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("empty@example.com");
        db.create_user(&user).unwrap();

        db.save_plan(&user.id, date(16), &[]).unwrap();
        let stored = db.get_plan(&user.id, date(16)).unwrap().unwrap();
        assert!(stored.items.is_empty());
    }

    #[test]
    fn test_save_for_unknown_user_fails() {
        let db = Database::open_in_memory().unwrap();
        let user = create_test_user("keep@example.com");
        db.create_user(&user).unwrap();
        db.save_plan(&user.id, date(16), &[event("Kept", "2026-10-16T09:00:00+01:00")])
            .unwrap();

        // unknown user violates the foreign key
        assert!(db.save_plan("ghost", date(16), &[]).is_err());
        let stored = db.get_plan(&user.id, date(16)).unwrap().unwrap();
        assert_eq!(stored.items[0].label(), "Kept");
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dayplan.db");
        let user = create_test_user("disk@example.com");
        {
            let db = Database::open(&path).unwrap();
            db.create_user(&user).unwrap();
            db.save_plan(&user.id, date(16), &[event("Saved", "2026-10-16T09:00:00+01:00")])
                .unwrap();
        }
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.list_users().unwrap().len(), 1);
        let plan = reopened.get_plan(&user.id, date(16)).unwrap().unwrap();
        assert_eq!(plan.items[0].label(), "Saved");
    }
}
