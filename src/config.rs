//! Configuration module for borgweb.
//!
//! Server settings come from environment variables with sensible defaults.
//! The repository list is read from a JSON file whose key order is kept.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no backup repositories configured")]
    NoRepositories,
    #[error("repository name must not be empty")]
    EmptyName,
    #[error("repository {0} has no repo_path")]
    MissingPath(String),
    #[error("failed to read repository file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed repository file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One configured backup repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub repo_path: String,
    #[serde(default)]
    pub repo_pwd: String,
    #[serde(default)]
    pub script: String,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 5000)
    pub http_port: u16,
    /// Path or name of the borg executable (default: "borg")
    pub borg_path: String,
    /// Upper bound on a single borg invocation (default: 120s)
    pub borg_timeout: Duration,
    /// Where the serialized status report is cached (default: "borgweb-status.json")
    pub status_cache_path: PathBuf,
    /// Maximum age of the cached report (default: 300s)
    pub status_cache_ttl: Duration,
    /// Root of the per-repository run log directories (default: "logs")
    pub log_dir: PathBuf,
    /// JSON file describing the backup repositories (default: "repos.json")
    pub repos_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            borg_path: "borg".to_string(),
            borg_timeout: Duration::from_secs(120),
            status_cache_path: PathBuf::from("borgweb-status.json"),
            status_cache_ttl: Duration::from_secs(300),
            log_dir: PathBuf::from("logs"),
            repos_file: PathBuf::from("repos.json"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BORGWEB_HTTP_PORT`: HTTP port (default: 5000)
    /// - `BORGWEB_BORG_PATH`: borg executable (default: "borg")
    /// - `BORGWEB_BORG_TIMEOUT`: seconds per borg command (default: 120)
    /// - `BORGWEB_STATUS_CACHE_PATH`: report cache file (default: "borgweb-status.json")
    /// - `BORGWEB_STATUS_CACHE_TTL`: cache TTL in seconds (default: 300)
    /// - `BORGWEB_LOG_DIR`: run log root (default: "logs")
    /// - `BORGWEB_REPOS_FILE`: repository list (default: "repos.json")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var("BORGWEB_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Ok(borg_path) = env::var("BORGWEB_BORG_PATH") {
            cfg.borg_path = borg_path;
        }

        if let Some(secs) = parse_var("BORGWEB_BORG_TIMEOUT") {
            cfg.borg_timeout = Duration::from_secs(secs);
        }

        if let Ok(path) = env::var("BORGWEB_STATUS_CACHE_PATH") {
            cfg.status_cache_path = PathBuf::from(path);
        }

        if let Some(secs) = parse_var("BORGWEB_STATUS_CACHE_TTL") {
            cfg.status_cache_ttl = Duration::from_secs(secs);
        }

        if let Ok(dir) = env::var("BORGWEB_LOG_DIR") {
            cfg.log_dir = PathBuf::from(dir);
        }

        if let Ok(path) = env::var("BORGWEB_REPOS_FILE") {
            cfg.repos_file = PathBuf::from(path);
        }

        cfg
    }

    /// Build the report configuration, reading the repository file.
    pub fn report_config(&self) -> Result<ReportConfig, ConfigError> {
        let repositories = load_repositories(&self.repos_file)?;
        let report = ReportConfig {
            cache_ttl: self.status_cache_ttl,
            cache_path: self.status_cache_path.clone(),
            repositories,
        };
        report.validate()?;
        Ok(report)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}, using default", name, raw);
            None
        }
    }
}

/// Configuration consumed by the report cache and builder.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub cache_ttl: Duration,
    pub cache_path: PathBuf,
    /// Repositories in configuration order.
    pub repositories: IndexMap<String, RepositoryConfig>,
}

impl ReportConfig {
    /// Reject configurations a report cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        for (name, repo) in &self.repositories {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if repo.repo_path.trim().is_empty() {
                return Err(ConfigError::MissingPath(name.clone()));
            }
        }
        Ok(())
    }
}

/// Read an ordered `name -> repository` map from a JSON file.
pub fn load_repositories(path: &Path) -> Result<IndexMap<String, RepositoryConfig>, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn repo(path: &str) -> RepositoryConfig {
        RepositoryConfig {
            repo_path: path.to_string(),
            repo_pwd: "secret".to_string(),
            script: String::new(),
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 5000);
        assert_eq!(cfg.borg_path, "borg");
        assert_eq!(cfg.status_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_load_repositories_keeps_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "zeta": {{"repo_path": "/srv/zeta", "repo_pwd": "z"}},
                "alpha": {{"repo_path": "/srv/alpha", "repo_pwd": "a", "script": "alpha.sh"}}
            }}"#
        )
        .unwrap();

        let repos = load_repositories(file.path()).unwrap();
        let names: Vec<_> = repos.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(repos["alpha"].script, "alpha.sh");
        assert_eq!(repos["zeta"].script, "");
    }

    #[test]
    fn test_load_repositories_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[not, json").unwrap();
        assert!(matches!(
            load_repositories(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let mut cfg = ReportConfig {
            cache_ttl: Duration::from_secs(300),
            cache_path: PathBuf::from("cache.json"),
            repositories: IndexMap::new(),
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::NoRepositories)));

        cfg.repositories.insert("repoA".to_string(), repo(""));
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingPath(name)) if name == "repoA"));

        cfg.repositories.insert("repoA".to_string(), repo("/srv/a"));
        assert!(cfg.validate().is_ok());
    }
}
