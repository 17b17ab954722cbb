//! On-disk cache for the serialized status report.
//!
//! The cache holds a single JSON file. Its modification time is the freshness
//! signal, so no timestamp is stored alongside the data.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::models::Report;
use crate::config::ReportConfig;

/// Cache error types.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Mode of a newly created cache file.
#[cfg(unix)]
const CACHE_FILE_MODE: u32 = 0o644;

/// Single-entry report cache with a TTL.
#[derive(Debug, Clone)]
pub struct ReportCache {
    path: PathBuf,
    ttl: Duration,
}

impl ReportCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.cache_path.clone(), config.cache_ttl)
    }

    /// Return the cached report if it exists and is younger than the TTL.
    ///
    /// Missing, stale and unparseable files are a miss. Permission errors are
    /// returned; other read errors are logged and treated as a miss.
    pub fn load(&self) -> Result<Option<Report>, CacheError> {
        self.load_at(SystemTime::now())
    }

    fn load_at(&self, now: SystemTime) -> Result<Option<Report>, CacheError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) => return self.downgrade(e),
        };
        if !metadata.is_file() {
            tracing::warn!("Report cache {} is not a regular file", self.path.display());
            return Ok(None);
        }

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => return self.downgrade(e),
        };
        if !is_fresh(modified, now, self.ttl) {
            tracing::debug!("Report cache {} is stale", self.path.display());
            return Ok(None);
        }

        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) => return self.downgrade(e),
        };

        match serde_json::from_slice(&data) {
            Ok(report) => {
                tracing::info!("Loading backups cache from {}", self.path.display());
                Ok(Some(report))
            }
            Err(e) => {
                tracing::warn!(
                    "Report cache {} is corrupt, treating as miss: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn downgrade(&self, e: std::io::Error) -> Result<Option<Report>, CacheError> {
        match e.kind() {
            ErrorKind::NotFound => Ok(None),
            ErrorKind::PermissionDenied => Err(CacheError::io(&self.path, e)),
            _ => {
                tracing::warn!("Failed to read report cache {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Persist the report, atomically replacing any previous file.
    pub fn store(&self, report: &Report) -> Result<(), CacheError> {
        let data = serde_json::to_vec(report)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
        tmp.write_all(&data)
            .and_then(|_| self.apply_permissions(tmp.as_file()))
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| CacheError::io(&self.path, e.error))?;

        tracing::debug!("Stored report cache at {}", self.path.display());
        Ok(())
    }

    /// Give the replacement file the mode of the file it replaces, or 0644.
    ///
    /// Temporary files are created 0600, which would hide the cache from
    /// other readers after the first rewrite.
    #[cfg(unix)]
    fn apply_permissions(&self, file: &fs::File) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let permissions = match fs::metadata(&self.path) {
            Ok(m) => m.permissions(),
            Err(_) => fs::Permissions::from_mode(CACHE_FILE_MODE),
        };
        file.set_permissions(permissions)
    }

    #[cfg(not(unix))]
    fn apply_permissions(&self, _file: &fs::File) -> std::io::Result<()> {
        Ok(())
    }

    /// Remove the cached report. Succeeds if there is none.
    pub fn invalidate(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Invalidated report cache {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }
}

/// A file is fresh while its age is strictly below the TTL.
///
/// A modification time in the future counts as age zero.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    age < ttl
}
