mod handlers;
mod middleware;
mod routes;

pub use routes::create_router;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::notify::WebhookNotifier;
use crate::planner::{LiveSources, Planner};
use crate::scheduler::DailyJob;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub job: Arc<DailyJob>,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub server_url: String,
}

impl AppState {
    pub fn new(
        job: Arc<DailyJob>,
        google_client_id: String,
        google_client_secret: String,
        server_url: String,
    ) -> Self {
        Self {
            db: job.db.clone(),
            job,
            google_client_id,
            google_client_secret,
            server_url,
        }
    }
}

/// Wire the live collaborators around an open database
pub fn build_job(db: Database, config: &ServerConfig) -> DailyJob {
    DailyJob {
        db,
        planner: Arc::new(Planner::new(config.planner.clone(), config.fetch_timeout)),
        sources: Arc::new(LiveSources::new(config)),
        notifier: Arc::new(WebhookNotifier::new()),
        hour: config.job_hour,
    }
}

/// Run the API server and the daily job loop
pub async fn run_server(addr: SocketAddr, db_path: &str, server_url: &str) -> Result<()> {
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    if config.google_client_id.is_empty() {
        tracing::warn!("GOOGLE_CLIENT_ID not set, Google sign-in is disabled");
    }

    let db = Database::open(db_path)?;
    let job = Arc::new(build_job(db, &config));
    let scheduler = job.clone().spawn();

    let state = Arc::new(AppState::new(
        job,
        config.google_client_id,
        config.google_client_secret,
        server_url.trim_end_matches('/').to_string(),
    ));

    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let served = axum::serve(listener, app).await;
    scheduler.abort();
    served?;

    Ok(())
}
