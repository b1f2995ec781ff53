use crate::core::scheduler::{EXTERNAL_TOOL_TIMEOUT, SchedulerSettings};
use crate::interface::scheduler::{TaskScheduler, TaskService};
use crate::r#macro::log::log;
use crate::model::error::Error;
use crate::model::error::schedule::ScheduleError;
use crate::model::log::schedule::ScheduleLog;
use crate::model::round_schedule::RoundSchedule;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Timelike};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::time::timeout;

const TASK_NAME_PREFIX: &str = "RoundLauncher Round ";

/// Windows backend. All three trigger kinds go through the task scheduler
/// service, reached exclusively by `schtasks` invocations: a CSV listing for
/// discovery, a per-task XML export for classification, and create/delete
/// commands. Login-type tasks run independent of a user session, so their
/// creation and deletion require elevation.
pub struct WindowsTaskScheduler {
    service: Box<dyn TaskService>,
    executable: PathBuf,
}

struct DiscoveredTask {
    name: String,
    round: u32,
    schedule: RoundSchedule,
}

impl WindowsTaskScheduler {
    pub fn new(service: Box<dyn TaskService>, settings: SchedulerSettings) -> Self {
        Self {
            service,
            executable: settings.executable,
        }
    }

    async fn discover(&self) -> Result<Vec<DiscoveredTask>, Error> {
        let listing = self.service.query_tasks().await?;
        let names = round_task_names(&listing)?;
        let exports =
            join_all(names.iter().map(|(name, _)| self.service.export_task(name))).await;

        let mut tasks = Vec::new();
        for ((name, round), export) in names.into_iter().zip(exports) {
            let xml = export?;
            let Some(schedule) = classify_export(&xml, &name)? else {
                continue;
            };
            tasks.push(DiscoveredTask {
                name,
                round,
                schedule,
            });
        }
        Ok(tasks)
    }

    /// Deletes every task carrying the application's name pattern. All
    /// deletions settle before the first failure is reported, and a failure
    /// here means no creation is attempted at all.
    async fn remove_existing_jobs(&self) -> Result<(), Error> {
        let existing = self.discover().await?;
        let service = self.service.as_ref();
        let deletions = existing.into_iter().map(|task| async move {
            let elevated = matches!(task.schedule, RoundSchedule::Login);
            service
                .delete_task(&task.name, elevated)
                .await
                .map_err(|error| {
                    privilege_error(error).unwrap_or_else(|| {
                        ScheduleError::TaskDeleteFailed { task: task.name }.into()
                    })
                })
        });
        let results = join_all(deletions).await;
        match results.into_iter().find_map(Result::err) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskScheduler for WindowsTaskScheduler {
    async fn scheduled_rounds(&mut self) -> Result<BTreeMap<u32, RoundSchedule>, Error> {
        ScheduleLog::ReadingSchedule.log();
        let tasks = self.discover().await?;
        Ok(tasks
            .into_iter()
            .map(|task| (task.round, task.schedule))
            .collect())
    }

    async fn schedule(&mut self, rounds: &BTreeMap<u32, RoundSchedule>) -> Result<(), Error> {
        log!(ScheduleLog::ReplacingSchedule, rounds);
        self.remove_existing_jobs().await?;

        let service = self.service.as_ref();
        let executable = self.executable.clone();
        let creations = rounds.iter().map(|(&round, schedule)| {
            let name = task_name(round);
            let args = create_args(&name, &executable, round, schedule);
            let elevated = matches!(schedule, RoundSchedule::Login);
            async move {
                service
                    .create_task(&name, &args, elevated)
                    .await
                    .map_err(|error| {
                        privilege_error(error).unwrap_or_else(|| {
                            ScheduleError::TaskCreateFailed { round }.into()
                        })
                    })
            }
        });
        let results = join_all(creations).await;
        if let Some(error) = results.into_iter().find_map(Result::err) {
            return Err(error);
        }
        ScheduleLog::ScheduleSaved.log();
        Ok(())
    }
}

/// Privilege failures carry their own meaning and pass through unwrapped.
fn privilege_error(error: Error) -> Option<Error> {
    match &error {
        Error::Schedule(ScheduleError::ElevationDeclined { .. })
        | Error::Schedule(ScheduleError::ElevationUnavailable) => Some(error),
        _ => None,
    }
}

fn task_name(round: u32) -> String {
    format!("{TASK_NAME_PREFIX}{round}")
}

/// Round number of an application task name. Listing output prefixes names
/// with the task folder's backslash, which is stripped here.
fn parse_task_name(name: &str) -> Option<u32> {
    let name = name.strip_prefix('\\').unwrap_or(name);
    name.strip_prefix(TASK_NAME_PREFIX)?.parse().ok()
}

/// Extracts the application's task names (as listed, folder prefix intact)
/// from the CSV listing. `schtasks /Query /FO csv` repeats the header row
/// per task folder, so header rows are skipped wherever they appear.
fn round_task_names(listing: &str) -> Result<Vec<(String, u32)>, Error> {
    let mut lines = listing.lines().filter(|line| !line.trim().is_empty());
    let header = split_csv_line(lines.next().ok_or(ScheduleError::TaskListParseFailed)?);
    let name_column = header
        .iter()
        .position(|field| field == "TaskName")
        .ok_or(ScheduleError::TaskListParseFailed)?;

    let mut names = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let Some(name) = fields.get(name_column) else {
            continue;
        };
        if name == "TaskName" {
            continue;
        }
        if let Some(round) = parse_task_name(name) {
            names.push((name.clone(), round));
        }
    }
    Ok(names)
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Classifies one task export: a logon trigger is a login round; a calendar
/// trigger is daily or weekly depending on which recurrence element is
/// present, with the day taken from the first day-of-week flag. A task with
/// a trigger this program never creates yields `None` and is skipped by
/// discovery instead of wedging every later read or save. A calendar
/// trigger whose stored fields do not parse is still a hard error.
fn classify_export(xml: &str, task: &str) -> Result<Option<RoundSchedule>, Error> {
    let malformed = || {
        Error::from(ScheduleError::TaskExportParseFailed {
            task: task.to_string(),
        })
    };

    if has_element(xml, "LogonTrigger") {
        return Ok(Some(RoundSchedule::Login));
    }
    if !has_element(xml, "CalendarTrigger") {
        return Ok(None);
    }

    let boundary = element_text(xml, "StartBoundary").ok_or_else(malformed)?;
    let (hour, minute) = corrected_start_time(boundary).ok_or_else(malformed)?;

    if has_element(xml, "ScheduleByDay") {
        return Ok(Some(RoundSchedule::Daily { hour, minute }));
    }
    if has_element(xml, "ScheduleByWeek") {
        let day = first_day_flag(xml)
            .and_then(|flag| flag.parse().ok())
            .ok_or_else(malformed)?;
        return Ok(Some(RoundSchedule::Weekly { hour, minute, day }));
    }
    Ok(None)
}

/// Start time of a calendar trigger. The stored boundary is timezone-naive;
/// when the export carries an explicit offset it is applied to the UTC
/// reading and wrapped modulo 24 hours / 60 minutes, recovering the local
/// wall time the task was created with.
fn corrected_start_time(boundary: &str) -> Option<(u8, u8)> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(boundary) {
        let offset_seconds = stamp.offset().local_minus_utc();
        let utc = stamp.naive_utc();
        let hour = (utc.hour() as i32 + offset_seconds / 3600).rem_euclid(24) as u8;
        let minute = (utc.minute() as i32 + (offset_seconds % 3600) / 60).rem_euclid(60) as u8;
        return Some((hour, minute));
    }
    let naive = NaiveDateTime::parse_from_str(boundary, "%Y-%m-%dT%H:%M:%S").ok()?;
    Some((naive.hour() as u8, naive.minute() as u8))
}

fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim())
}

fn has_element(xml: &str, tag: &str) -> bool {
    xml.contains(&format!("<{tag}>"))
        || xml.contains(&format!("<{tag}/>"))
        || xml.contains(&format!("<{tag} "))
}

/// Name of the first element under `DaysOfWeek`, e.g. `<Wednesday/>`.
fn first_day_flag(xml: &str) -> Option<&str> {
    let section = element_text(xml, "DaysOfWeek")?;
    let start = section.find('<')? + 1;
    let end = section[start..].find(['/', '>', ' '])? + start;
    Some(&section[start..end])
}

/// Arguments for one `schtasks /Create` invocation, trigger flags branched
/// on the schedule type.
fn create_args(
    name: &str,
    executable: &std::path::Path,
    round: u32,
    schedule: &RoundSchedule,
) -> Vec<String> {
    let command = format!("\"{}\" {}", executable.display(), round);
    let mut args: Vec<String> = vec![
        "/Create".into(),
        "/f".into(),
        "/tn".into(),
        name.into(),
        "/tr".into(),
        command,
    ];
    match schedule {
        RoundSchedule::Daily { hour, minute } => {
            args.extend(["/sc".into(), "daily".into(), "/st".into()]);
            args.push(format!("{hour:02}:{minute:02}"));
        }
        RoundSchedule::Weekly { hour, minute, day } => {
            args.extend(["/sc".into(), "weekly".into(), "/d".into()]);
            args.push(day.abbrev().to_uppercase());
            args.push("/st".into());
            args.push(format!("{hour:02}:{minute:02}"));
        }
        RoundSchedule::Login => {
            args.extend(["/sc".into(), "onlogon".into()]);
        }
    }
    args
}

/// Production task service: the `schtasks` binary. Elevated invocations go
/// through the platform elevation path unless the process is already
/// privileged.
pub struct Schtasks;

impl Schtasks {
    async fn run(&self, args: &[String]) -> Result<std::process::Output, Error> {
        timeout(
            EXTERNAL_TOOL_TIMEOUT,
            Command::new("schtasks").args(args).output(),
        )
        .await
        .map_err(|_| ScheduleError::ExternalToolTimeout {
            command: format!("schtasks {}", args.join(" ")),
        })?
        .map_err(|_| {
            ScheduleError::TaskCommandFailed {
                detail: "failed to invoke schtasks".to_string(),
            }
            .into()
        })
    }

    async fn run_checked(&self, args: Vec<String>, elevated: bool) -> Result<(), Error> {
        if elevated && !privilege::user::privileged() {
            return run_elevated_schtasks(args).await;
        }
        let output = self.run(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ScheduleError::TaskCommandFailed {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into())
        }
    }
}

#[async_trait]
impl TaskService for Schtasks {
    async fn query_tasks(&self) -> Result<String, Error> {
        let args: Vec<String> = vec!["/Query".into(), "/FO".into(), "csv".into()];
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(ScheduleError::TaskQueryFailed {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn export_task(&self, name: &str) -> Result<String, Error> {
        let args: Vec<String> = vec![
            "/Query".into(),
            "/XML".into(),
            "ONE".into(),
            "/tn".into(),
            name.into(),
        ];
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(ScheduleError::TaskExportFailed {
                task: name.to_string(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn create_task(&self, _name: &str, args: &[String], elevated: bool) -> Result<(), Error> {
        self.run_checked(args.to_vec(), elevated).await
    }

    async fn delete_task(&self, name: &str, elevated: bool) -> Result<(), Error> {
        let args: Vec<String> =
            vec!["/Delete".into(), "/f".into(), "/tn".into(), name.into()];
        self.run_checked(args, elevated).await
    }
}

#[cfg(windows)]
async fn run_elevated_schtasks(args: Vec<String>) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || {
        crate::platform::elevate::run_elevated("schtasks", &args)
    })
    .await
    .map_err(|_| {
        Error::from(ScheduleError::TaskCommandFailed {
            detail: "elevated invocation aborted".to_string(),
        })
    })?
}

#[cfg(not(windows))]
async fn run_elevated_schtasks(_args: Vec<String>) -> Result<(), Error> {
    Err(ScheduleError::ElevationUnavailable.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::round_schedule::Weekday;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        tasks: BTreeMap<String, CreatedTask>,
        fail_create: HashSet<String>,
        fail_delete: HashSet<String>,
        operations: Vec<(String, String, bool)>,
    }

    struct CreatedTask {
        args: Vec<String>,
    }

    #[derive(Default, Clone)]
    struct FakeTaskService {
        state: Arc<Mutex<FakeState>>,
    }

    fn bare_name(name: &str) -> String {
        name.strip_prefix('\\').unwrap_or(name).to_string()
    }

    fn fake_export(args: &[String]) -> String {
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .map(|index| args[index + 1].clone())
        };
        match value("/sc").as_deref() {
            Some("onlogon") => "<Task><Triggers><LogonTrigger>\
                 <Enabled>true</Enabled></LogonTrigger></Triggers></Task>"
                .to_string(),
            Some("onstart") => "<Task><Triggers><BootTrigger>\
                 <Enabled>true</Enabled></BootTrigger></Triggers></Task>"
                .to_string(),
            Some("daily") => format!(
                "<Task><Triggers><CalendarTrigger>\
                 <StartBoundary>2026-01-05T{}:00</StartBoundary>\
                 <ScheduleByDay><DaysInterval>1</DaysInterval></ScheduleByDay>\
                 </CalendarTrigger></Triggers></Task>",
                value("/st").unwrap()
            ),
            Some("weekly") => {
                let day: Weekday = value("/d").unwrap().parse().unwrap();
                format!(
                    "<Task><Triggers><CalendarTrigger>\
                     <StartBoundary>2026-01-05T{}:00</StartBoundary>\
                     <ScheduleByWeek><DaysOfWeek><{}/></DaysOfWeek>\
                     <WeeksInterval>1</WeeksInterval></ScheduleByWeek>\
                     </CalendarTrigger></Triggers></Task>",
                    value("/st").unwrap(),
                    day.full_name()
                )
            }
            _ => panic!("fake task without a schedule flag"),
        }
    }

    #[async_trait]
    impl TaskService for FakeTaskService {
        async fn query_tasks(&self) -> Result<String, Error> {
            let state = self.state.lock().unwrap();
            let mut listing =
                String::from("\"HostName\",\"TaskName\",\"Next Run Time\",\"Status\"\r\n");
            listing.push_str("\"PC\",\"\\Microsoft\\Windows\\Defrag\\ScheduledDefrag\",\"N/A\",\"Ready\"\r\n");
            for name in state.tasks.keys() {
                listing.push_str(&format!("\"PC\",\"\\{name}\",\"N/A\",\"Ready\"\r\n"));
            }
            Ok(listing)
        }

        async fn export_task(&self, name: &str) -> Result<String, Error> {
            let state = self.state.lock().unwrap();
            let task = state.tasks.get(&bare_name(name)).ok_or_else(|| {
                Error::from(ScheduleError::TaskExportFailed {
                    task: name.to_string(),
                })
            })?;
            Ok(fake_export(&task.args))
        }

        async fn create_task(
            &self,
            name: &str,
            args: &[String],
            elevated: bool,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state
                .operations
                .push(("create".to_string(), name.to_string(), elevated));
            if state.fail_create.contains(name) {
                return Err(ScheduleError::TaskCommandFailed {
                    detail: format!("create rejected: {name}"),
                }
                .into());
            }
            state.tasks.insert(
                name.to_string(),
                CreatedTask {
                    args: args.to_vec(),
                },
            );
            Ok(())
        }

        async fn delete_task(&self, name: &str, elevated: bool) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            let bare = bare_name(name);
            state
                .operations
                .push(("delete".to_string(), bare.clone(), elevated));
            if state.fail_delete.contains(&bare) {
                return Err(ScheduleError::TaskCommandFailed {
                    detail: format!("delete rejected: {name}"),
                }
                .into());
            }
            state.tasks.remove(&bare);
            Ok(())
        }
    }

    fn scheduler_with(service: Box<FakeTaskService>) -> WindowsTaskScheduler {
        WindowsTaskScheduler::new(
            service,
            SchedulerSettings {
                executable: PathBuf::from("C:\\Program Files\\RoundLauncher\\RoundLauncher.exe"),
                num_rounds: 4,
            },
        )
    }

    fn rounds(entries: &[(u32, RoundSchedule)]) -> BTreeMap<u32, RoundSchedule> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn task_names_round_trip() {
        assert_eq!(task_name(3), "RoundLauncher Round 3");
        assert_eq!(parse_task_name("RoundLauncher Round 3"), Some(3));
        assert_eq!(parse_task_name("\\RoundLauncher Round 12"), Some(12));
        assert_eq!(parse_task_name("\\Microsoft\\Windows\\Defrag"), None);
        assert_eq!(parse_task_name("RoundLauncher Round x"), None);
    }

    #[test]
    fn csv_lines_split_with_quotes() {
        assert_eq!(
            split_csv_line("\"PC\",\"\\Task, with comma\",\"N/A\""),
            vec!["PC", "\\Task, with comma", "N/A"]
        );
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_csv_line("\"say \"\"hi\"\"\",x"), vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn listing_parse_skips_repeated_headers_and_foreign_tasks() {
        let listing = "\"HostName\",\"TaskName\",\"Status\"\r\n\
                       \"PC\",\"\\RoundLauncher Round 0\",\"Ready\"\r\n\
                       \"HostName\",\"TaskName\",\"Status\"\r\n\
                       \"PC\",\"\\Microsoft\\Windows\\Defrag\\ScheduledDefrag\",\"Ready\"\r\n\
                       \"PC\",\"\\RoundLauncher Round 2\",\"Ready\"\r\n";
        let names = round_task_names(listing).unwrap();
        assert_eq!(
            names,
            vec![
                ("\\RoundLauncher Round 0".to_string(), 0),
                ("\\RoundLauncher Round 2".to_string(), 2),
            ]
        );
    }

    #[test]
    fn listing_without_task_name_column_is_an_error() {
        assert!(round_task_names("\"HostName\",\"Status\"\r\n").is_err());
        assert!(round_task_names("").is_err());
    }

    #[test]
    fn classify_logon_trigger() {
        let xml = "<Task><Triggers><LogonTrigger/></Triggers></Task>";
        assert_eq!(
            classify_export(xml, "t").unwrap(),
            Some(RoundSchedule::Login)
        );
    }

    #[test]
    fn classify_daily_trigger() {
        let xml = "<Task><Triggers><CalendarTrigger>\
                   <StartBoundary>2026-01-05T09:30:00</StartBoundary>\
                   <ScheduleByDay><DaysInterval>1</DaysInterval></ScheduleByDay>\
                   </CalendarTrigger></Triggers></Task>";
        assert_eq!(
            classify_export(xml, "t").unwrap(),
            Some(RoundSchedule::Daily { hour: 9, minute: 30 })
        );
    }

    #[test]
    fn classify_weekly_trigger_takes_first_day_flag() {
        let xml = "<Task><Triggers><CalendarTrigger>\
                   <StartBoundary>2026-01-05T18:00:00</StartBoundary>\
                   <ScheduleByWeek><DaysOfWeek><Wednesday/><Friday/></DaysOfWeek>\
                   </ScheduleByWeek></CalendarTrigger></Triggers></Task>";
        assert_eq!(
            classify_export(xml, "t").unwrap(),
            Some(RoundSchedule::Weekly {
                hour: 18,
                minute: 0,
                day: Weekday::Wednesday,
            })
        );
    }

    #[test]
    fn classify_skips_unknown_trigger() {
        let xml = "<Task><Triggers><BootTrigger/></Triggers></Task>";
        assert_eq!(classify_export(xml, "t").unwrap(), None);
    }

    #[test]
    fn classify_rejects_malformed_calendar_trigger() {
        let missing_boundary = "<Task><Triggers><CalendarTrigger>\
             <ScheduleByDay/></CalendarTrigger></Triggers></Task>";
        assert!(classify_export(missing_boundary, "t").is_err());

        let bad_boundary = "<Task><Triggers><CalendarTrigger>\
             <StartBoundary>whenever</StartBoundary>\
             <ScheduleByDay/></CalendarTrigger></Triggers></Task>";
        assert!(classify_export(bad_boundary, "t").is_err());
    }

    #[test]
    fn start_time_offset_is_corrected_and_wrapped() {
        // Naive boundary reads back verbatim.
        assert_eq!(corrected_start_time("2026-03-02T09:30:00"), Some((9, 30)));
        // An explicit offset recovers the requested local wall time.
        assert_eq!(
            corrected_start_time("2026-03-02T18:30:00+10:00"),
            Some((18, 30))
        );
        assert_eq!(
            corrected_start_time("2026-03-02T01:15:00-09:30"),
            Some((1, 15))
        );
        // Wrap across midnight.
        assert_eq!(
            corrected_start_time("2026-03-02T23:45:00+02:00"),
            Some((23, 45))
        );
        assert_eq!(corrected_start_time("not a date"), None);
    }

    #[tokio::test]
    async fn all_types_round_trip() {
        let mut scheduler = scheduler_with(Box::new(FakeTaskService::default()));
        let requested = rounds(&[
            (0, RoundSchedule::Daily { hour: 9, minute: 30 }),
            (
                1,
                RoundSchedule::Weekly {
                    hour: 18,
                    minute: 0,
                    day: Weekday::Wednesday,
                },
            ),
            (2, RoundSchedule::Login),
        ]);
        scheduler.schedule(&requested).await.unwrap();
        assert_eq!(scheduler.scheduled_rounds().await.unwrap(), requested);
    }

    #[tokio::test]
    async fn login_tasks_are_created_and_deleted_elevated() {
        let service = FakeTaskService::default();
        let state = service.state.clone();
        let mut scheduler = scheduler_with(Box::new(service));

        scheduler
            .schedule(&rounds(&[
                (0, RoundSchedule::Daily { hour: 6, minute: 0 }),
                (1, RoundSchedule::Login),
            ]))
            .await
            .unwrap();
        scheduler.schedule(&rounds(&[])).await.unwrap();

        let operations = state.lock().unwrap().operations.clone();
        let elevation = |operation: &str, name: &str| {
            operations
                .iter()
                .find(|(op, task, _)| op == operation && task == name)
                .map(|(_, _, elevated)| *elevated)
        };
        assert_eq!(elevation("create", &task_name(0)), Some(false));
        assert_eq!(elevation("create", &task_name(1)), Some(true));
        assert_eq!(elevation("delete", &task_name(0)), Some(false));
        assert_eq!(elevation("delete", &task_name(1)), Some(true));
    }

    #[tokio::test]
    async fn round_task_with_foreign_trigger_is_skipped() {
        let service = FakeTaskService::default();
        service.state.lock().unwrap().tasks.insert(
            task_name(3),
            CreatedTask {
                args: vec!["/sc".to_string(), "onstart".to_string()],
            },
        );
        let mut scheduler = scheduler_with(Box::new(service));

        // Unclassifiable tasks are invisible to reads and do not block saves.
        assert!(scheduler.scheduled_rounds().await.unwrap().is_empty());
        let requested = rounds(&[(0, RoundSchedule::Daily { hour: 8, minute: 0 })]);
        scheduler.schedule(&requested).await.unwrap();
        assert_eq!(scheduler.scheduled_rounds().await.unwrap(), requested);
    }

    #[tokio::test]
    async fn schedule_is_full_replacement() {
        let mut scheduler = scheduler_with(Box::new(FakeTaskService::default()));
        scheduler
            .schedule(&rounds(&[
                (0, RoundSchedule::Daily { hour: 1, minute: 0 }),
                (1, RoundSchedule::Login),
            ]))
            .await
            .unwrap();
        scheduler.schedule(&rounds(&[])).await.unwrap();
        assert!(scheduler.scheduled_rounds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_creation_is_visible_and_names_the_round() {
        let service = FakeTaskService::default();
        service
            .state
            .lock()
            .unwrap()
            .fail_create
            .insert(task_name(1));
        let mut scheduler = scheduler_with(Box::new(service));

        let requested = rounds(&[
            (0, RoundSchedule::Daily { hour: 8, minute: 0 }),
            (1, RoundSchedule::Daily { hour: 9, minute: 0 }),
            (2, RoundSchedule::Daily { hour: 10, minute: 0 }),
        ]);
        let error = scheduler.schedule(&requested).await.unwrap_err();
        assert_eq!(
            error,
            Error::Schedule(ScheduleError::TaskCreateFailed { round: 1 })
        );

        // Non-atomicity is observable: the siblings were still created.
        let remaining = scheduler.scheduled_rounds().await.unwrap();
        assert_eq!(
            remaining.keys().copied().collect::<Vec<_>>(),
            vec![0, 2]
        );
    }

    #[tokio::test]
    async fn failed_deletion_aborts_before_any_creation() {
        let service = FakeTaskService::default();
        {
            let mut state = service.state.lock().unwrap();
            state.tasks.insert(
                task_name(0),
                CreatedTask {
                    args: vec![
                        "/sc".to_string(),
                        "daily".to_string(),
                        "/st".to_string(),
                        "07:00".to_string(),
                    ],
                },
            );
            state.fail_delete.insert(task_name(0));
        }
        let mut scheduler = scheduler_with(Box::new(service));

        let error = scheduler
            .schedule(&rounds(&[(2, RoundSchedule::Daily { hour: 3, minute: 0 })]))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            Error::Schedule(ScheduleError::TaskDeleteFailed {
                task: "\\RoundLauncher Round 0".to_string()
            })
        );

        // The old task is still the only one there.
        let remaining = scheduler.scheduled_rounds().await.unwrap();
        assert_eq!(remaining.keys().copied().collect::<Vec<_>>(), vec![0]);
    }
}
