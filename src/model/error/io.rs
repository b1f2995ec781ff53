use crate::r#macro::loggable::loggable;
use std::path::PathBuf;

loggable! {
    IOError {
        #[error("Failed to read directory: {path:?}")]
        ReadDirectoryFailed { path: PathBuf } => tracing::Level::ERROR,

        #[error("Failed to write file: {path:?}")]
        WriteFileFailed { path: PathBuf } => tracing::Level::ERROR,

        #[error("Failed to delete file: {path:?}")]
        DeleteFileFailed { path: PathBuf } => tracing::Level::ERROR,
    }
}
