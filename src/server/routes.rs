use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::auth_middleware;
use super::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/google", get(handlers::auth::google_redirect))
        .route("/auth/callback", get(handlers::auth::google_callback));

    // Protected routes (require API key)
    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::plans::me))
        // Plans
        .route("/v1/dashboard", get(handlers::plans::dashboard))
        .route("/v1/plans/generate", post(handlers::plans::generate_plan))
        .route("/v1/plans/:date", get(handlers::plans::get_plan))
        .route("/v1/schedule/run", post(handlers::plans::run_schedule))
        // Sources
        .route("/v1/tasks", get(handlers::sources::list_tasks))
        .route("/v1/calendar/events", get(handlers::sources::list_events))
        // Config
        .route(
            "/v1/config",
            get(handlers::config::get_config).patch(handlers::config::update_config),
        )
        // API key rotation
        .route("/auth/key/rotate", post(handlers::auth::rotate_api_key))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarSource;
    use crate::config::PlannerConfig;
    use crate::crypto::generate_api_key;
    use crate::db::Database;
    use crate::models::{PlanItem, Task, User};
    use crate::notify::{Delivery, PlanNotifier};
    use crate::planner::testing::{BrokenCalendar, FixedCalendar, FixedTasks};
    use crate::planner::{Planner, SourceProvider};
    use crate::scheduler::DailyJob;
    use crate::tasks::TaskSource;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    struct TestSources {
        broken_calendar: bool,
    }

    impl SourceProvider for TestSources {
        fn calendar_for(&self, _user: &User) -> anyhow::Result<Arc<dyn CalendarSource>> {
            if self.broken_calendar {
                Ok(Arc::new(BrokenCalendar))
            } else {
                Ok(Arc::new(FixedCalendar(vec![])))
            }
        }

        fn tasks_for(&self, _user: &User) -> Arc<dyn TaskSource> {
            Arc::new(FixedTasks(vec![Task::new("t1", "Write report", 1.0)]))
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl PlanNotifier for SilentNotifier {
        async fn notify(
            &self,
            _user: &User,
            _date: NaiveDate,
            _items: &[PlanItem],
        ) -> anyhow::Result<Delivery> {
            Ok(Delivery::Skipped)
        }
    }

    /// State with one registered user; returns the user's API key
    fn test_state(broken_calendar: bool) -> (Arc<AppState>, String) {
        let db = Database::open_in_memory().unwrap();
        let api_key = generate_api_key();
        db.create_user(&User {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            google_refresh_token: Some("refresh".to_string()),
            api_key_hash: bcrypt::hash(&api_key, 4).unwrap(),
            webhook_url: None,
            webhook_secret: None,
            created_at: 0,
        })
        .unwrap();

        let job = Arc::new(DailyJob {
            db,
            planner: Arc::new(Planner::new(
                PlannerConfig::default(),
                std::time::Duration::from_secs(5),
            )),
            sources: Arc::new(TestSources { broken_calendar }),
            notifier: Arc::new(SilentNotifier),
            hour: 5,
        });
        let state = AppState::new(
            job,
            String::new(),
            String::new(),
            "http://localhost:8080".to_string(),
        );
        (Arc::new(state), api_key)
    }

    fn request(method: &str, uri: &str, api_key: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = create_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state(false);
        let (status, body) = send(&state, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_require_valid_key() {
        let (state, _) = test_state(false);
        let (status, _) = send(&state, request("GET", "/v1/me", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&state, request("GET", "/v1/me", Some("dpk_wrong"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me() {
        let (state, key) = test_state(false);
        let (status, body) = send(&state, request("GET", "/v1/me", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["calendar_connected"], true);
        assert!(body.get("api_key_hash").is_none());
    }

    #[tokio::test]
    async fn test_get_plan_bad_date_and_missing() {
        let (state, key) = test_state(false);
        let (status, _) = send(&state, request("GET", "/v1/plans/tomorrow", Some(&key), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&state, request("GET", "/v1/plans/2026-01-05", Some(&key), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generate_then_read_back() {
        let (state, key) = test_state(false);
        let (status, body) =
            send(&state, request("POST", "/v1/plans/generate", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);
        let items = body["plan"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["type"], "task");
        assert_eq!(items[0]["title"], "Write report");

        let date = body["plan"]["date"].as_str().unwrap().to_string();
        let (status, stored) =
            send(&state, request("GET", &format!("/v1/plans/{}", date), Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["items"], body["plan"]["items"]);

        let (_, dashboard) = send(&state, request("GET", "/v1/dashboard", Some(&key), None)).await;
        assert_eq!(dashboard["plan"]["plan_date"], date.as_str());
    }

    #[tokio::test]
    async fn test_generate_upstream_failure_is_bad_gateway() {
        let (state, key) = test_state(true);
        let (status, body) =
            send(&state, request("POST", "/v1/plans/generate", Some(&key), None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("calendar unavailable"));
    }

    #[tokio::test]
    async fn test_dashboard_empty_before_first_plan() {
        let (state, key) = test_state(false);
        let (status, body) = send(&state, request("GET", "/v1/dashboard", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["plan"].is_null());
    }

    #[tokio::test]
    async fn test_schedule_run_is_accepted() {
        let (state, key) = test_state(false);
        let (status, body) =
            send(&state, request("POST", "/v1/schedule/run", Some(&key), None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "accepted");
    }

    #[tokio::test]
    async fn test_sources_endpoints() {
        let (state, key) = test_state(false);
        let (status, tasks) = send(&state, request("GET", "/v1/tasks", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tasks[0]["id"], "t1");

        let (status, events) =
            send(&state, request("GET", "/v1/calendar/events", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(events, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_webhook_config() {
        let (state, key) = test_state(false);
        let body = serde_json::json!({ "webhook_url": "https://hooks.example.com/plan" });
        let (status, updated) =
            send(&state, request("PATCH", "/v1/config", Some(&key), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["webhook_url"], "https://hooks.example.com/plan");
        assert_eq!(updated["webhook_secret"].as_str().unwrap().len(), 64);

        let (_, config) = send(&state, request("GET", "/v1/config", Some(&key), None)).await;
        assert_eq!(config["webhook_url"], "https://hooks.example.com/plan");
        assert_eq!(config["planner"]["timezone"], "Europe/London");
        assert_eq!(config["planner"]["work_start_hour"], 9);

        let bad = serde_json::json!({ "webhook_url": "not a url" });
        let (status, _) = send(&state, request("PATCH", "/v1/config", Some(&key), Some(bad))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let clear = serde_json::json!({ "webhook_url": "" });
        let (_, cleared) =
            send(&state, request("PATCH", "/v1/config", Some(&key), Some(clear))).await;
        assert!(cleared["webhook_url"].is_null());
    }

    #[tokio::test]
    async fn test_rotate_key_invalidates_old_key() {
        let (state, key) = test_state(false);
        let (status, body) =
            send(&state, request("POST", "/auth/key/rotate", Some(&key), None)).await;
        assert_eq!(status, StatusCode::OK);
        let new_key = body["api_key"].as_str().unwrap().to_string();

        let (status, _) = send(&state, request("GET", "/v1/me", Some(&key), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&state, request("GET", "/v1/me", Some(&new_key), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_google_auth_unconfigured_and_denied() {
        let (state, _) = test_state(false);
        let (status, _) = send(&state, request("GET", "/auth/google", None, None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let resp = create_router(state.clone())
            .oneshot(request(
                "GET",
                "/auth/callback?error=access_denied&state=http%3A%2F%2Flocalhost%3A8899",
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = resp.headers()["location"].to_str().unwrap();
        assert_eq!(location, "http://localhost:8899?error=access_denied");
    }
}
