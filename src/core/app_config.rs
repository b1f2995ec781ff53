use crate::model::config::ConfigTable;
use crate::model::error::Error;
use crate::model::error::system::SystemError;
use std::env;
use std::fs;
use std::ops::Deref;
use std::path::PathBuf;

pub struct AppConfig {
    config: ConfigTable,
}

impl AppConfig {
    pub fn new() -> Result<Self, Error> {
        let config = Self::load_config_file()?;
        Ok(Self { config })
    }

    fn load_config_file() -> Result<ConfigTable, Error> {
        let toml_string =
            fs::read_to_string("./config.toml").map_err(|_| SystemError::ConfigNotFound)?;
        let config = toml::from_str::<ConfigTable>(&toml_string).map_err(|err| {
            SystemError::InvalidConfig {
                detail: err.to_string(),
            }
        })?;
        Ok(config)
    }

    /// Executable path embedded in generated jobs. The configured override
    /// wins; otherwise the running binary's own path is used.
    pub fn executable(&self) -> Result<PathBuf, Error> {
        if let Some(executable) = &self.config.settings.executable {
            return Ok(executable.clone());
        }
        env::current_exe().map_err(|_| SystemError::ExecutablePathUnavailable.into())
    }
}

impl Deref for AppConfig {
    type Target = ConfigTable;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}
