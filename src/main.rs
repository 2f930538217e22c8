use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use dayplan::cli::{self, OutputFormat, PlanOptions};
use dayplan::config::ServerConfig;
use dayplan::db::Database;
use dayplan::DEFAULT_SERVER_URL;

#[derive(Parser)]
#[command(name = "dayplan")]
#[command(about = "Fit your task backlog into the free time on your calendar", version)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a day offline from JSON files
    Plan {
        /// JSON array of calendar events ({summary, start, end})
        #[arg(long)]
        events: PathBuf,
        /// JSON array of tasks ({id, title, priority, deadline, estimate_hours})
        #[arg(long)]
        tasks: PathBuf,
        /// Day to plan (default: today in the planner timezone)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Timezone (e.g., "America/New_York")
        #[arg(long)]
        timezone: Option<String>,
        /// First working hour
        #[arg(long)]
        start_hour: Option<u32>,
        /// End of the working day (exclusive)
        #[arg(long)]
        end_hour: Option<u32>,
        /// Shortest free slot worth keeping, in minutes
        #[arg(long)]
        min_slot: Option<i64>,
    },
    /// Run the API server and the daily planning job
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Database file path
        #[arg(long, default_value = "./dayplan.db")]
        db: String,
        /// Public server URL (for OAuth callbacks)
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        url: String,
    },
    /// Run the daily planning job once for every user and exit
    RunJob {
        /// Database file path
        #[arg(long, default_value = "./dayplan.db")]
        db: String,
    },
    /// Sign in with Google
    Login {
        /// Server URL
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,
    },
    /// Log out and remove local credentials
    Logout,
    /// Show today's plan from the server
    Today,
    /// Generate today's plan on the server now
    Generate,
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set webhook URL for plan delivery
    Webhook {
        /// Webhook URL (leave empty to remove)
        url: Option<String>,
    },
    /// Set server URL
    Server {
        /// Server URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dayplan=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Plan {
            events,
            tasks,
            date,
            timezone,
            start_hour,
            end_hour,
            min_slot,
        } => {
            let options = PlanOptions {
                date,
                timezone,
                start_hour,
                end_hour,
                min_slot,
            };
            cli::run_plan(&events, &tasks, &options, format)?;
        }
        Commands::Serve { port, db, url } => {
            let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
            dayplan::server::run_server(addr, &db, &url).await?;
        }
        Commands::RunJob { db } => {
            let config = ServerConfig::from_env().context("Invalid server configuration")?;
            let db = Database::open(&db)?;
            let job = dayplan::server::build_job(db, &config);
            let report = job.run_once().await?;
            format.print(&report)?;
            if !report.failed.is_empty() {
                anyhow::bail!("{} user(s) failed", report.failed.len());
            }
        }
        Commands::Login { server } => {
            cli::run_login(&server, format).await?;
        }
        Commands::Logout => {
            cli::run_logout(format)?;
        }
        Commands::Today => {
            cli::run_today(format).await?;
        }
        Commands::Generate => {
            cli::run_generate(format).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                cli::run_config_show(format).await?;
            }
            ConfigAction::Webhook { url } => {
                cli::run_config_webhook(url.as_deref(), format).await?;
            }
            ConfigAction::Server { url } => {
                cli::run_config_server(&url, format)?;
            }
        },
    }

    Ok(())
}
