use crate::model::error::Error;
use crate::model::round_schedule::RoundSchedule;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Uniform contract over the host's native recurring-task facility. One
/// implementation is selected at startup for the current platform.
///
/// Every call has exactly one terminal outcome. `schedule` is a
/// full-replacement save, not a diff: every job carrying the application's
/// round tag is removed before the supplied rounds are created. The write
/// path is not atomic; on error the native store may hold a partial
/// application of the request and callers should re-read through
/// `scheduled_rounds` to learn the true state.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Discovers the rounds that currently have a native job. Never mutates
    /// native state; rounds without a job are simply absent from the map.
    async fn scheduled_rounds(&mut self) -> Result<BTreeMap<u32, RoundSchedule>, Error>;

    /// Replaces the application's native jobs with the supplied mapping.
    async fn schedule(&mut self, rounds: &BTreeMap<u32, RoundSchedule>) -> Result<(), Error>;
}

/// Raw access to the user's crontab. The production implementation shells
/// out to the `crontab` binary; tests substitute an in-memory table.
#[async_trait]
pub trait JobTable: Send + Sync {
    async fn load(&self) -> Result<String, Error>;
    async fn save(&self, table: &str) -> Result<(), Error>;
}

/// Command-level access to the Windows task service. `elevated` routes the
/// invocation through the privilege-elevation path, which login-type tasks
/// require.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Tabular listing of all tasks, as CSV with a header row.
    async fn query_tasks(&self) -> Result<String, Error>;

    /// Detailed XML export of one task.
    async fn export_task(&self, name: &str) -> Result<String, Error>;

    async fn create_task(&self, name: &str, args: &[String], elevated: bool) -> Result<(), Error>;

    async fn delete_task(&self, name: &str, elevated: bool) -> Result<(), Error>;
}
