use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{day_bounds, CalendarSource};
use crate::models::RawEvent;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested during consent
pub const GOOGLE_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/userinfo.email",
    "openid",
];

/// Google Calendar implementation using direct API calls
pub struct GoogleCalendar {
    client: reqwest::Client,
    token_manager: Arc<RwLock<TokenManager>>,
}

struct TokenManager {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenManager {
    fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            access_token: None,
            expires_at: None,
        }
    }

    async fn get_access_token(&mut self, client: &reqwest::Client) -> Result<String> {
        if let (Some(token), Some(expires)) = (&self.access_token, self.expires_at) {
            if Utc::now() < expires - chrono::Duration::minutes(5) {
                return Ok(token.clone());
            }
        }

        let resp = client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to refresh token")?;

        if !resp.status().is_success() {
            let error = resp.text().await.unwrap_or_default();
            anyhow::bail!("Token refresh failed: {}", error);
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse token response")?;

        self.access_token = Some(tokens.access_token.clone());
        self.expires_at = Some(Utc::now() + chrono::Duration::seconds(tokens.expires_in));

        Ok(tokens.access_token)
    }
}

/// Tokens returned by the authorization-code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// One entry of an events.list response
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleEvent {
    pub id: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
}

/// `dateTime` for timed events, `date` for all-day ones
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl EventTime {
    fn raw(&self) -> Option<String> {
        self.date_time.clone().or_else(|| self.date.clone())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

/// Convert provider events into raw engine input, dropping cancelled ones
pub fn to_raw_events(events: Vec<GoogleEvent>) -> Vec<RawEvent> {
    events
        .into_iter()
        .filter(|e| e.status.as_deref() != Some("cancelled"))
        .map(|e| RawEvent {
            id: e.id,
            summary: e.summary.unwrap_or_else(|| "No Title".to_string()),
            start: e.start.as_ref().and_then(EventTime::raw),
            end: e.end.as_ref().and_then(EventTime::raw),
        })
        .collect()
}

impl GoogleCalendar {
    /// Create a calendar client for one user's refresh token
    pub fn new(client_id: &str, client_secret: &str, refresh_token: &str) -> Self {
        let client = reqwest::Client::new();
        let token_manager = Arc::new(RwLock::new(TokenManager::new(
            client_id.to_string(),
            client_secret.to_string(),
            refresh_token.to_string(),
        )));

        Self {
            client,
            token_manager,
        }
    }

    async fn get_token(&self) -> Result<String> {
        let mut manager = self.token_manager.write().await;
        manager.get_access_token(&self.client).await
    }

    /// Consent screen URL; `state` is echoed back to the callback
    pub fn authorization_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&GOOGLE_SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens> {
        let client = reqwest::Client::new();
        let resp = client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Failed to exchange code for token")?;

        if !resp.status().is_success() {
            let error = resp.text().await.unwrap_or_default();
            anyhow::bail!("Token exchange failed: {}", error);
        }

        resp.json().await.context("Failed to parse token response")
    }

    /// Get the user's email from Google
    pub async fn get_user_email(access_token: &str) -> Result<String> {
        let client = reqwest::Client::new();
        let resp = client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to fetch user info")?;

        if !resp.status().is_success() {
            anyhow::bail!("Failed to get user info: {}", resp.status());
        }

        #[derive(Deserialize)]
        struct UserInfo {
            email: String,
        }

        let info: UserInfo = resp.json().await.context("Failed to parse user info")?;
        Ok(info.email)
    }
}

#[async_trait::async_trait]
impl CalendarSource for GoogleCalendar {
    async fn events_for_day(&self, day: NaiveDate, tz: Tz) -> Result<Vec<RawEvent>> {
        let token = self.get_token().await?;
        let (start, end) = day_bounds(day, tz);
        let time_min = start.to_rfc3339();
        let time_max = end.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let resp = self
                .client
                .get(EVENTS_URL)
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await
                .context("Failed to list calendar events")?;

            if !resp.status().is_success() {
                let error = resp.text().await.unwrap_or_default();
                anyhow::bail!("Calendar events query failed: {}", error);
            }

            let page: EventsPage = resp
                .json()
                .await
                .context("Failed to parse calendar events")?;
            events.extend(page.items);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        let events = to_raw_events(events);
        tracing::info!(%day, count = events.len(), "Fetched calendar events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_page_parsing() {
        let page: EventsPage = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "a", "summary": "Standup",
                     "start": {"dateTime": "2026-10-16T09:00:00+01:00", "timeZone": "Europe/London"},
                     "end": {"dateTime": "2026-10-16T09:15:00+01:00"}},
                    {"id": "b", "start": {"date": "2026-10-16"}, "end": {"date": "2026-10-17"}},
                    {"id": "c", "status": "cancelled", "summary": "Gone",
                     "start": {"dateTime": "2026-10-16T12:00:00Z"}, "end": {"dateTime": "2026-10-16T13:00:00Z"}}
                ],
                "nextPageToken": "p2"
            }"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));

        let raw = to_raw_events(page.items);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].summary, "Standup");
        assert_eq!(raw[0].start.as_deref(), Some("2026-10-16T09:00:00+01:00"));
        assert_eq!(raw[1].summary, "No Title");
        assert_eq!(raw[1].start.as_deref(), Some("2026-10-16"));
        assert_eq!(raw[1].id.as_deref(), Some("b"));
    }

    #[test]
    fn test_authorization_url() {
        let url = GoogleCalendar::authorization_url("cid", "http://localhost:8080/auth/callback", "");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("calendar.readonly"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
    }
}
