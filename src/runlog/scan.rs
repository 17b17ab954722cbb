//! Directory-backed run log scanner.
//!
//! Logs for repository `R` live in `<root>/R/*.log`, named with a leading
//! timestamp so the greatest name is the latest run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use regex::Regex;

use super::{RunLog, RunStatus};
use crate::report::LastResult;

/// Run logs stored under a root directory, one subdirectory per repository.
#[derive(Debug, Clone)]
pub struct LogDirectory {
    root: PathBuf,
}

impl LogDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn scan(&self, repo_name: &str) -> std::io::Result<RunStatus> {
        let dir = self.root.join(repo_name);
        let Some(file_name) = latest_log_file(&dir).await? else {
            return Ok(RunStatus::default());
        };

        let path = dir.join(&file_name);
        let contents = tokio::fs::read(&path).await?;
        let result = parse_log_status(&String::from_utf8_lossy(&contents));

        let (date, time) = match parse_log_timestamp(&file_name) {
            Some(stamp) => stamp,
            None => {
                let modified: DateTime<Local> = tokio::fs::metadata(&path).await?.modified()?.into();
                (
                    modified.format("%Y-%m-%d").to_string(),
                    modified.format("%H:%M:%S").to_string(),
                )
            }
        };

        Ok(RunStatus {
            result,
            date,
            time,
            log_file: Some(file_name),
        })
    }
}

#[async_trait]
impl RunLog for LogDirectory {
    async fn latest_run_status(&self, repo_name: &str) -> RunStatus {
        match self.scan(repo_name).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Failed to scan run logs for {}: {}", repo_name, e);
                RunStatus::default()
            }
        }
    }
}

/// Name of the latest `.log` file in `dir`, if any.
async fn latest_log_file(dir: &Path) -> std::io::Result<Option<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut latest: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(".log") {
            continue;
        }
        if latest.as_ref().map_or(true, |current| name > *current) {
            latest = Some(name);
        }
    }

    Ok(latest)
}

/// Classify a log by its last borg termination line.
///
/// rc 0 is ok, rc 1 a warning, anything higher an error. A log that never
/// reached termination is reported as a warning.
pub fn parse_log_status(contents: &str) -> LastResult {
    static TERMINATING: OnceLock<Regex> = OnceLock::new();
    let re = TERMINATING.get_or_init(|| {
        Regex::new(r"terminating with (?P<kind>success|warning|error) status, rc (?P<rc>\d+)").unwrap()
    });

    let Some(caps) = re.captures_iter(contents).last() else {
        return LastResult::Warning;
    };

    match caps.name("rc").and_then(|m| m.as_str().parse::<u32>().ok()) {
        Some(0) => LastResult::Ok,
        Some(1) => LastResult::Warning,
        Some(_) => LastResult::Error,
        None => match &caps["kind"] {
            "success" => LastResult::Ok,
            "warning" => LastResult::Warning,
            _ => LastResult::Error,
        },
    }
}

/// Extract `("YYYY-MM-DD", "HH:MM:SS")` from a log file name.
pub fn parse_log_timestamp(file_name: &str) -> Option<(String, String)> {
    static STAMP: OnceLock<Regex> = OnceLock::new();
    let re = STAMP.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2})[_T ](\d{2})[-:](\d{2})[-:](\d{2})").unwrap()
    });

    let caps = re.captures(file_name)?;
    Some((
        caps[1].to_string(),
        format!("{}:{}:{}", &caps[2], &caps[3], &caps[4]),
    ))
}
