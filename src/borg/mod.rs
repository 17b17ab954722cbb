//! Repository queries against the borg archiver.
//!
//! The report builder only sees the [`RepositoryQuery`] trait. [`BorgClient`]
//! implements it by running the `borg` executable.

mod client;
mod parse;

pub use client::*;
pub use parse::*;

use crate::config::RepositoryConfig;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::time::Duration;
use thiserror::Error;

/// Query error types.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("failed to run borg: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("borg timed out after {0:?}")]
    Timeout(Duration),
    #[error("borg exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("unexpected borg output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Loose repository metadata, keyed by name.
pub type RepositoryInfo = IndexMap<String, String>;

/// An archive as listed by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveListing {
    pub name: String,
}

/// Details for a single archive.
///
/// Missing `date` or `size` is not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveInfo {
    pub date: Option<NaiveDateTime>,
    pub size: Option<u64>,
    pub extra: IndexMap<String, String>,
}

/// Source of repository and archive information.
#[async_trait]
pub trait RepositoryQuery: Send + Sync {
    async fn repo_info(&self, repo: &RepositoryConfig) -> Result<RepositoryInfo, QueryError>;

    /// Archives in the order the repository reports them.
    async fn list_archives(&self, repo: &RepositoryConfig) -> Result<Vec<ArchiveListing>, QueryError>;

    async fn archive_info(&self, repo: &RepositoryConfig, name: &str) -> Result<ArchiveInfo, QueryError>;
}
