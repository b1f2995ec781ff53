use crate::model::round_schedule::RoundSchedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ConfigTable {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rounds: Vec<Round>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Executable path embedded in generated jobs; defaults to the running
    /// binary when absent.
    pub executable: Option<PathBuf>,
}

/// One backup round: a named group of backup items scheduled as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<BackupItem>,
    pub schedule: Option<RoundSchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupItem {
    pub name: String,
    pub tool: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub terminal: bool,
}
