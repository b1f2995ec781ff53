pub use crate::log;

/// Logs a loggable value at its own level, optionally with debug context.
#[macro_export]
macro_rules! log {
    ($entry:expr) => {
        {
            let entry = $entry;
            let level = entry.level();
            let message = entry.to_string();

            match level {
                tracing::Level::ERROR => tracing::error!("{}", message),
                tracing::Level::WARN => tracing::warn!("{}", message),
                tracing::Level::INFO => tracing::info!("{}", message),
                tracing::Level::DEBUG => tracing::debug!("{}", message),
                tracing::Level::TRACE => tracing::trace!("{}", message),
            }
        }
    };
    ($entry:expr, $debug_info:expr) => {
        {
            let entry = $entry;
            let level = entry.level();
            let message = entry.to_string();
            let debug_info = $debug_info;

            match level {
                tracing::Level::ERROR => tracing::error!(message = %message, debug = ?debug_info),
                tracing::Level::WARN => tracing::warn!(message = %message, debug = ?debug_info),
                tracing::Level::INFO => tracing::info!(message = %message, debug = ?debug_info),
                tracing::Level::DEBUG => tracing::debug!(message = %message, debug = ?debug_info),
                tracing::Level::TRACE => tracing::trace!(message = %message, debug = ?debug_info),
            }
        }
    };
}
