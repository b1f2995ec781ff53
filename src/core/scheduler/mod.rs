pub mod crontab;
pub mod login_items;
pub mod schtasks;

use crate::interface::scheduler::TaskScheduler;
use crate::model::error::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Ceiling on every external facility invocation; a hung `crontab` or
/// `schtasks` process surfaces as an error instead of blocking forever.
pub const EXTERNAL_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Collaborator contract for the backends: the executable to embed in
/// generated job commands and the round count bounding crontab discovery.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub executable: PathBuf,
    pub num_rounds: u32,
}

/// Selects the one backend appropriate to the host platform. The returned
/// scheduler is ready as soon as this future resolves.
pub async fn create_scheduler(settings: SchedulerSettings) -> Result<Box<dyn TaskScheduler>, Error> {
    #[cfg(windows)]
    let scheduler: Box<dyn TaskScheduler> = Box::new(schtasks::WindowsTaskScheduler::new(
        Box::new(schtasks::Schtasks),
        settings,
    ));
    #[cfg(unix)]
    let scheduler: Box<dyn TaskScheduler> =
        Box::new(crontab::CrontabScheduler::load(settings).await?);
    Ok(scheduler)
}
