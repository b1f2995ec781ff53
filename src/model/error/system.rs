use crate::r#macro::loggable::loggable;

loggable! {
    SystemError {
        #[error("Configuration not found")]
        ConfigNotFound => tracing::Level::ERROR,

        #[error("Invalid configuration: {detail}")]
        InvalidConfig { detail: String } => tracing::Level::ERROR,

        #[error("Unknown round: {round}")]
        UnknownRound { round: u32 } => tracing::Level::ERROR,

        #[error("Unrecognized command: {argument}")]
        UnrecognizedCommand { argument: String } => tracing::Level::ERROR,

        #[error("Failed to determine the executable path")]
        ExecutablePathUnavailable => tracing::Level::ERROR,

        #[error("Failed to locate the home directory")]
        HomeDirectoryUnavailable => tracing::Level::ERROR,
    }
}
