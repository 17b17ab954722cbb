//! Command-line borg client.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    parse_archive_info, parse_archive_list, parse_repo_info, ArchiveInfo, ArchiveListing,
    QueryError, RepositoryInfo, RepositoryQuery,
};
use crate::config::RepositoryConfig;

/// Runs `borg` subcommands with JSON output.
#[derive(Debug, Clone)]
pub struct BorgClient {
    borg_path: String,
    timeout: Duration,
}

impl BorgClient {
    pub fn new(borg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            borg_path: borg_path.into(),
            timeout,
        }
    }

    /// Run `borg <subcommand> --json <target>` and return stdout.
    async fn run(&self, subcommand: &str, repo: &RepositoryConfig, target: &str) -> Result<Vec<u8>, QueryError> {
        tracing::debug!("Running {} {} --json {}", self.borg_path, subcommand, target);

        let mut command = Command::new(&self.borg_path);
        command
            .args([subcommand, "--json", target])
            .env("BORG_PASSPHRASE", &repo.repo_pwd)
            .env("BORG_RELOCATED_REPO_ACCESS_IS_OK", "no")
            .env("BORG_UNKNOWN_UNENCRYPTED_REPO_ACCESS_IS_OK", "no")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(QueryError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl RepositoryQuery for BorgClient {
    async fn repo_info(&self, repo: &RepositoryConfig) -> Result<RepositoryInfo, QueryError> {
        let stdout = self.run("info", repo, &repo.repo_path).await?;
        Ok(parse_repo_info(&stdout)?)
    }

    async fn list_archives(&self, repo: &RepositoryConfig) -> Result<Vec<ArchiveListing>, QueryError> {
        let stdout = self.run("list", repo, &repo.repo_path).await?;
        Ok(parse_archive_list(&stdout)?)
    }

    async fn archive_info(&self, repo: &RepositoryConfig, name: &str) -> Result<ArchiveInfo, QueryError> {
        let target = format!("{}::{}", repo.repo_path, name);
        let stdout = self.run("info", repo, &target).await?;
        Ok(parse_archive_info(&stdout)?)
    }
}
