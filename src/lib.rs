pub mod calendar;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod db;
pub mod engine;
pub mod models;
pub mod notify;
pub mod planner;
pub mod scheduler;
pub mod server;
pub mod tasks;
pub mod webhook;

pub use models::*;

/// Default server URL for the dayplan API
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Application name
pub const APP_NAME: &str = "dayplan";
