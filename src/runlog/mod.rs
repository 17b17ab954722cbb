//! Last-run status from backup script logs.

mod scan;

pub use scan::*;

use crate::report::LastResult;

use async_trait::async_trait;

/// Result of the most recent backup run for a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatus {
    pub result: LastResult,
    pub date: String,
    pub time: String,
    /// File name of the log the status was read from.
    pub log_file: Option<String>,
}

/// Source of last-run records.
///
/// Implementations return `RunStatus::default()` (warning, no date) when
/// there is no record.
#[async_trait]
pub trait RunLog: Send + Sync {
    async fn latest_run_status(&self, repo_name: &str) -> RunStatus;
}
