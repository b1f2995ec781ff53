use crate::r#macro::loggable::loggable;

loggable! {
    ScheduleLog {
        #[error("Reading the scheduled rounds")]
        ReadingSchedule => tracing::Level::DEBUG,

        #[error("Replacing the scheduled rounds")]
        ReplacingSchedule => tracing::Level::INFO,

        #[error("Schedule saved")]
        ScheduleSaved => tracing::Level::INFO,
    }
}
