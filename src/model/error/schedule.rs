use crate::r#macro::loggable::loggable;

loggable! {
    ScheduleError {
        #[error("Failed to load the crontab job table")]
        JobTableLoadFailed => tracing::Level::ERROR,

        #[error("Failed to save the crontab job table")]
        JobTableSaveFailed => tracing::Level::ERROR,

        #[error("Unparseable job table entry: {line}")]
        JobTableParseFailed { line: String } => tracing::Level::ERROR,

        #[error("Task scheduler query failed: {detail}")]
        TaskQueryFailed { detail: String } => tracing::Level::ERROR,

        #[error("Malformed task listing")]
        TaskListParseFailed => tracing::Level::ERROR,

        #[error("Failed to export task: {task}")]
        TaskExportFailed { task: String } => tracing::Level::ERROR,

        #[error("Malformed task export: {task}")]
        TaskExportParseFailed { task: String } => tracing::Level::ERROR,

        #[error("Failed to create the job for round {round}")]
        TaskCreateFailed { round: u32 } => tracing::Level::ERROR,

        #[error("Failed to delete task: {task}")]
        TaskDeleteFailed { task: String } => tracing::Level::ERROR,

        #[error("Task scheduler command failed: {detail}")]
        TaskCommandFailed { detail: String } => tracing::Level::ERROR,

        #[error("External command timed out: {command}")]
        ExternalToolTimeout { command: String } => tracing::Level::ERROR,

        #[error("Elevation was declined for: {task}")]
        ElevationDeclined { task: String } => tracing::Level::ERROR,

        #[error("Elevation is unavailable on this platform")]
        ElevationUnavailable => tracing::Level::ERROR,
    }
}
