use crate::core::app_config::AppConfig;
use crate::core::scheduler::{SchedulerSettings, create_scheduler};
use crate::model::config::Round;
use crate::model::error::Error;
use crate::model::error::system::SystemError;
use crate::model::log::system::SystemLog;
use crate::model::round_schedule::RoundSchedule;
use crate::utils::logging::Logging;
use std::collections::BTreeMap;
use std::env;
use tracing::info;

pub struct System;

impl System {
    pub async fn initialize() -> Result<AppConfig, Error> {
        Logging::initialize().await;
        SystemLog::Initializing.log();
        let config = AppConfig::new()?;
        SystemLog::InitializeComplete.log();
        Ok(config)
    }

    /// Dispatches on the first argument: `show` (or nothing) lists the
    /// scheduled rounds, `apply` replaces the live schedule with the
    /// configured one, and a bare round number is the entry point the
    /// generated jobs invoke.
    pub async fn run(config: &AppConfig) -> Result<(), Error> {
        match env::args().nth(1).as_deref() {
            None | Some("show") => Self::show(config).await,
            Some("apply") => Self::apply(config).await,
            Some(argument) => match argument.parse::<u32>() {
                Ok(round) => Self::launch_round(config, round),
                Err(_) => Err(SystemError::UnrecognizedCommand {
                    argument: argument.to_string(),
                }
                .into()),
            },
        }
    }

    pub async fn terminate() {
        SystemLog::Terminating.log();
        SystemLog::TerminateComplete.log();
    }

    async fn show(config: &AppConfig) -> Result<(), Error> {
        let mut scheduler = create_scheduler(Self::settings(config)?).await?;
        let scheduled = scheduler.scheduled_rounds().await?;
        if scheduled.is_empty() {
            println!("No rounds are scheduled.");
            return Ok(());
        }
        for (round, schedule) in &scheduled {
            let name = config
                .rounds
                .get(*round as usize)
                .map(|entry| entry.name.as_str())
                .unwrap_or("(not in config)");
            println!("Round {round} ({name}): {schedule}");
        }
        Ok(())
    }

    async fn apply(config: &AppConfig) -> Result<(), Error> {
        let requested: BTreeMap<u32, RoundSchedule> = config
            .rounds
            .iter()
            .enumerate()
            .filter_map(|(round, entry)| {
                entry
                    .schedule
                    .clone()
                    .map(|schedule| (round as u32, schedule))
            })
            .collect();

        let mut scheduler = create_scheduler(Self::settings(config)?).await?;
        scheduler.schedule(&requested).await?;
        println!("Scheduled {} round(s).", requested.len());
        Ok(())
    }

    /// Resolves the round a generated job refers to. Item execution is
    /// handled by the launched tools themselves; this reports what the
    /// round would run.
    fn launch_round(config: &AppConfig, round: u32) -> Result<(), Error> {
        let entry: &Round = config
            .rounds
            .get(round as usize)
            .ok_or(SystemError::UnknownRound { round })?;
        info!("Launching round {round}: {}", entry.name);
        for item in &entry.items {
            info!(
                "Round {round} item {:?}: {} {}",
                item.name,
                item.tool,
                item.args.join(" ")
            );
        }
        Ok(())
    }

    fn settings(config: &AppConfig) -> Result<SchedulerSettings, Error> {
        Ok(SchedulerSettings {
            executable: config.executable()?,
            num_rounds: config.rounds.len() as u32,
        })
    }
}
