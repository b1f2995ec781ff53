use crate::core::scheduler::login_items::LoginItemManager;
use crate::core::scheduler::{EXTERNAL_TOOL_TIMEOUT, SchedulerSettings};
use crate::interface::scheduler::{JobTable, TaskScheduler};
use crate::model::error::Error;
use crate::model::error::schedule::ScheduleError;
use crate::model::log::schedule::ScheduleLog;
use crate::r#macro::log::log;
use crate::model::round_schedule::{RoundSchedule, Weekday};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Comment tag marking a crontab line as one of ours. The round number is
/// the suffix; nothing but this tag ties a line to the application.
const ROUND_TAG_PREFIX: &str = "RoundLauncher Round ";

/// Unix backend. Daily and weekly rounds become entries in the user's
/// crontab; login rounds are delegated to the login-item manager. The job
/// table is loaded once at construction and operated on in memory, with
/// unrelated lines carried through every save untouched.
pub struct CrontabScheduler {
    table: Box<dyn JobTable>,
    lines: Vec<String>,
    login_items: LoginItemManager,
    executable: PathBuf,
    num_rounds: u32,
}

impl CrontabScheduler {
    pub async fn load(settings: SchedulerSettings) -> Result<Self, Error> {
        let login_items = LoginItemManager::scan(LoginItemManager::default_directory()?).await?;
        Self::with_parts(Box::new(UserCrontab), login_items, settings).await
    }

    pub(crate) async fn with_parts(
        table: Box<dyn JobTable>,
        login_items: LoginItemManager,
        settings: SchedulerSettings,
    ) -> Result<Self, Error> {
        let text = table.load().await?;
        let lines = text.lines().map(str::to_string).collect();
        Ok(Self {
            table,
            lines,
            login_items,
            executable: settings.executable,
            num_rounds: settings.num_rounds,
        })
    }

    fn render_table(lines: &[String]) -> String {
        let mut table = lines.join("\n");
        if !table.is_empty() {
            table.push('\n');
        }
        table
    }
}

#[async_trait]
impl TaskScheduler for CrontabScheduler {
    async fn scheduled_rounds(&mut self) -> Result<BTreeMap<u32, RoundSchedule>, Error> {
        ScheduleLog::ReadingSchedule.log();
        let mut rounds = BTreeMap::new();
        for line in &self.lines {
            if line_round(line).is_none() {
                continue;
            }
            let entry = parse_entry(line)?;
            if entry.round >= self.num_rounds {
                continue;
            }
            let schedule = match entry.day_of_week {
                Some(day) => RoundSchedule::Weekly {
                    hour: entry.hour,
                    minute: entry.minute,
                    day,
                },
                None => RoundSchedule::Daily {
                    hour: entry.hour,
                    minute: entry.minute,
                },
            };
            rounds.insert(entry.round, schedule);
        }
        for &round in self.login_items.login_rounds() {
            rounds.insert(round, RoundSchedule::Login);
        }
        Ok(rounds)
    }

    async fn schedule(&mut self, rounds: &BTreeMap<u32, RoundSchedule>) -> Result<(), Error> {
        log!(ScheduleLog::ReplacingSchedule, rounds);
        let mut lines: Vec<String> = self
            .lines
            .iter()
            .filter(|line| line_round(line).is_none())
            .cloned()
            .collect();
        self.login_items.remove_existing_items();

        for (&round, schedule) in rounds {
            match schedule {
                RoundSchedule::Login => self.login_items.add_item(round),
                RoundSchedule::Daily { hour, minute } => {
                    let entry = CronEntry {
                        minute: *minute,
                        hour: *hour,
                        day_of_week: None,
                        command: round_command(&self.executable, round),
                        round,
                    };
                    lines.push(entry.render());
                }
                RoundSchedule::Weekly { hour, minute, day } => {
                    let entry = CronEntry {
                        minute: *minute,
                        hour: *hour,
                        day_of_week: Some(*day),
                        command: round_command(&self.executable, round),
                        round,
                    };
                    lines.push(entry.render());
                }
            }
        }

        // Login items commit first; when that fails the job table is left as
        // it was, when the table save fails the login items stay applied.
        // The new table replaces the cache only after a successful save, so
        // reads keep reflecting the persisted table.
        self.login_items.commit_changes(&self.executable).await?;
        self.table.save(&Self::render_table(&lines)).await?;
        self.lines = lines;
        ScheduleLog::ScheduleSaved.log();
        Ok(())
    }
}

struct CronEntry {
    minute: u8,
    hour: u8,
    day_of_week: Option<Weekday>,
    command: String,
    round: u32,
}

impl CronEntry {
    /// `{minute} {hour} * * {dow} {command} # RoundLauncher Round {n}`.
    /// Entries are rebuilt from scratch on every save, so no field of a
    /// previous schedule can survive into the new one.
    fn render(&self) -> String {
        let day = self
            .day_of_week
            .map_or("*", |day| day.abbrev())
            .to_string();
        format!(
            "{} {} * * {} {} # {}{}",
            self.minute, self.hour, day, self.command, ROUND_TAG_PREFIX, self.round
        )
    }
}

/// Round number of a line carrying our comment tag, `None` for foreign lines.
fn line_round(line: &str) -> Option<u32> {
    let (_, comment) = line.rsplit_once(" # ")?;
    comment.trim().strip_prefix(ROUND_TAG_PREFIX)?.parse().ok()
}

/// Parses a tagged line back into an entry. Only called for lines that
/// carry the round tag; a tagged line that does not parse is a hard error
/// so discovery never returns a partial view.
fn parse_entry(line: &str) -> Result<CronEntry, ScheduleError> {
    let malformed = || ScheduleError::JobTableParseFailed {
        line: line.to_string(),
    };
    let (body, comment) = line.rsplit_once(" # ").ok_or_else(malformed)?;
    let round = comment
        .trim()
        .strip_prefix(ROUND_TAG_PREFIX)
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(malformed)?;

    let mut fields = body.split_whitespace();
    let minute = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(malformed)?;
    let hour = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(malformed)?;
    let _day_of_month = fields.next().ok_or_else(malformed)?;
    let _month = fields.next().ok_or_else(malformed)?;
    let day_of_week = match fields.next().ok_or_else(malformed)? {
        "*" => None,
        code => Some(code.parse().map_err(|_| malformed())?),
    };
    let command = fields.collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        return Err(malformed());
    }

    Ok(CronEntry {
        minute,
        hour,
        day_of_week,
        command,
        round,
    })
}

/// Command line that re-invokes the application with the round number. Cron
/// jobs on Linux need DISPLAY exported to reach the user's session.
fn round_command(executable: &Path, round: u32) -> String {
    let command = format!("\"{}\" {} > /dev/null 2>&1", executable.display(), round);
    if cfg!(target_os = "linux") {
        format!("export DISPLAY=:0 && {command}")
    } else {
        command
    }
}

/// Production job table: the `crontab` binary. An empty table reads back as
/// "no crontab for <user>" on a nonzero exit, which is not an error.
pub struct UserCrontab;

#[async_trait]
impl JobTable for UserCrontab {
    async fn load(&self) -> Result<String, Error> {
        let output = timeout(
            EXTERNAL_TOOL_TIMEOUT,
            Command::new("crontab").arg("-l").output(),
        )
        .await
        .map_err(|_| ScheduleError::ExternalToolTimeout {
            command: "crontab -l".to_string(),
        })?
        .map_err(|_| ScheduleError::JobTableLoadFailed)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else if String::from_utf8_lossy(&output.stderr).contains("no crontab") {
            Ok(String::new())
        } else {
            Err(ScheduleError::JobTableLoadFailed.into())
        }
    }

    async fn save(&self, table: &str) -> Result<(), Error> {
        let mut child = Command::new("crontab")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| ScheduleError::JobTableSaveFailed)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or(ScheduleError::JobTableSaveFailed)?;
        stdin
            .write_all(table.as_bytes())
            .await
            .map_err(|_| ScheduleError::JobTableSaveFailed)?;
        drop(stdin);

        let status = timeout(EXTERNAL_TOOL_TIMEOUT, child.wait())
            .await
            .map_err(|_| ScheduleError::ExternalToolTimeout {
                command: "crontab -".to_string(),
            })?
            .map_err(|_| ScheduleError::JobTableSaveFailed)?;
        if status.success() {
            Ok(())
        } else {
            Err(ScheduleError::JobTableSaveFailed.into())
        }
    }
}
