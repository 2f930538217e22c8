mod notion;

pub use notion::*;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Task;

/// Trait for task backlog providers
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Open tasks, in the provider's order
    async fn open_tasks(&self) -> Result<Vec<Task>>;
}

/// Stand-in when no task provider is configured. Always empty.
pub struct NoTasks;

#[async_trait]
impl TaskSource for NoTasks {
    async fn open_tasks(&self) -> Result<Vec<Task>> {
        tracing::warn!("No task source configured, planning without tasks");
        Ok(Vec::new())
    }
}
