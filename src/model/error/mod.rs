pub mod io;
pub mod schedule;
pub mod system;

use crate::model::error::io::IOError;
use crate::model::error::schedule::ScheduleError;
use crate::model::error::system::SystemError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    #[error(transparent)]
    IO(IOError),
    #[error(transparent)]
    Schedule(ScheduleError),
    #[error(transparent)]
    System(SystemError),
}

impl Error {
    pub fn level(&self) -> tracing::Level {
        match self {
            Self::IO(error) => error.level(),
            Self::Schedule(error) => error.level(),
            Self::System(error) => error.level(),
        }
    }

    pub fn log(&self) {
        match self {
            Self::IO(error) => error.log(),
            Self::Schedule(error) => error.log(),
            Self::System(error) => error.log(),
        }
    }
}

impl From<IOError> for Error {
    fn from(error: IOError) -> Self {
        Self::IO(error)
    }
}

impl From<ScheduleError> for Error {
    fn from(error: ScheduleError) -> Self {
        Self::Schedule(error)
    }
}

impl From<SystemError> for Error {
    fn from(error: SystemError) -> Self {
        Self::System(error)
    }
}
