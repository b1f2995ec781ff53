use crate::model::error::Error;
use crate::model::error::io::IOError;
use crate::model::error::system::SystemError;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tokio::fs;

const DESCRIPTOR_PREFIX: &str = "com.roundlauncher.round";
const DESCRIPTOR_SUFFIX: &str = ".plist";

/// Emulates a "run at login" trigger with one launchd-style descriptor file
/// per round in the user's agents directory. The directory is the system of
/// record; the in-memory round list is rebuilt from it at construction and
/// only written back by `commit_changes`.
pub struct LoginItemManager {
    directory: PathBuf,
    rounds: Vec<u32>,
}

impl LoginItemManager {
    pub fn default_directory() -> Result<PathBuf, Error> {
        agents_directory(std::env::var_os("HOME"))
    }

    /// Derives the currently login-scheduled rounds from the descriptor
    /// files present in the directory. A missing directory is an empty set.
    pub async fn scan(directory: PathBuf) -> Result<Self, Error> {
        let mut rounds = Vec::new();
        match fs::read_dir(&directory).await {
            Ok(mut entries) => loop {
                let entry = entries.next_entry().await.map_err(|_| {
                    IOError::ReadDirectoryFailed {
                        path: directory.clone(),
                    }
                })?;
                let Some(entry) = entry else { break };
                if !is_file(&entry).await {
                    continue;
                }
                if let Some(round) = parse_descriptor_file_name(&entry.file_name().to_string_lossy())
                {
                    rounds.push(round);
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(_) => {
                return Err(IOError::ReadDirectoryFailed { path: directory }.into());
            }
        }
        rounds.sort_unstable();
        Ok(Self { directory, rounds })
    }

    pub fn login_rounds(&self) -> &[u32] {
        &self.rounds
    }

    /// In-memory edit; the filesystem is untouched until `commit_changes`.
    pub fn remove_existing_items(&mut self) {
        self.rounds.clear();
    }

    /// In-memory edit; the filesystem is untouched until `commit_changes`.
    pub fn add_item(&mut self, round: u32) {
        self.rounds.push(round);
    }

    /// Replaces the on-disk descriptors with the in-memory list. The delete
    /// set is every descriptor currently on disk, the create set is the
    /// current round list; deletions all settle before any creation starts.
    /// The first error wins and files already written are not rolled back.
    pub async fn commit_changes(&self, executable: &Path) -> Result<(), Error> {
        let delete_set = self.descriptor_files().await?;
        let deletions = delete_set.into_iter().map(|path| async move {
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(_) => Err(IOError::DeleteFileFailed { path }),
            }
        });
        if let Some(error) = join_all(deletions).await.into_iter().find_map(Result::err) {
            return Err(error.into());
        }

        let creations = self.rounds.iter().map(|&round| {
            let path = self.directory.join(descriptor_file_name(round));
            let contents = descriptor_contents(executable, round);
            async move {
                match fs::write(&path, contents).await {
                    Ok(()) => Ok(()),
                    Err(_) => Err(IOError::WriteFileFailed { path }),
                }
            }
        });
        if let Some(error) = join_all(creations).await.into_iter().find_map(Result::err) {
            return Err(error.into());
        }
        Ok(())
    }

    async fn descriptor_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        match fs::read_dir(&self.directory).await {
            Ok(mut entries) => loop {
                let entry = entries.next_entry().await.map_err(|_| {
                    IOError::ReadDirectoryFailed {
                        path: self.directory.clone(),
                    }
                })?;
                let Some(entry) = entry else { break };
                if !is_file(&entry).await {
                    continue;
                }
                if parse_descriptor_file_name(&entry.file_name().to_string_lossy()).is_some() {
                    files.push(entry.path());
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(_) => {
                return Err(IOError::ReadDirectoryFailed {
                    path: self.directory.clone(),
                }
                .into());
            }
        }
        files.sort();
        Ok(files)
    }
}

fn agents_directory(home: Option<std::ffi::OsString>) -> Result<PathBuf, Error> {
    let home = home.ok_or(SystemError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join("Library").join("LaunchAgents"))
}

async fn is_file(entry: &fs::DirEntry) -> bool {
    entry
        .file_type()
        .await
        .map(|file_type| file_type.is_file())
        .unwrap_or(false)
}

fn descriptor_file_name(round: u32) -> String {
    format!("{DESCRIPTOR_PREFIX}{round}{DESCRIPTOR_SUFFIX}")
}

fn parse_descriptor_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(DESCRIPTOR_PREFIX)?
        .strip_suffix(DESCRIPTOR_SUFFIX)?
        .parse()
        .ok()
}

/// Launchd property list: label carrying the round number, the program
/// arguments `[executable, round]`, and the run-at-load flag.
fn descriptor_contents(executable: &Path, round: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{DESCRIPTOR_PREFIX}{round}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
        <string>{round}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        executable.display()
    )
}
