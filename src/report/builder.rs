//! Builds the composite status report, serving it from cache when fresh.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use thiserror::Error;

use super::{
    Archive, CacheError, Report, ReportCache, RepositoryStatus, Series, ARCHIVE_FIELDS,
    REPOSITORY_FIELDS,
};
use crate::borg::{ArchiveInfo, ArchiveListing, QueryError, RepositoryInfo, RepositoryQuery};
use crate::config::{ConfigError, RepositoryConfig, ReportConfig};
use crate::runlog::RunLog;

/// Report error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Outcome of the repository-level queries for one repository.
enum RepositoryOutcome {
    Listed {
        info: RepositoryInfo,
        archives: Vec<ArchiveListing>,
    },
    Failed(QueryError),
}

/// Produces the current report from the cache or from fresh repository queries.
pub struct ReportBuilder {
    config: ReportConfig,
    cache: ReportCache,
    query: Arc<dyn RepositoryQuery>,
    run_log: Arc<dyn RunLog>,
}

impl ReportBuilder {
    pub fn new(config: ReportConfig, query: Arc<dyn RepositoryQuery>, run_log: Arc<dyn RunLog>) -> Self {
        let cache = ReportCache::from_config(&config);
        Self {
            config,
            cache,
            query,
            run_log,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// Return the cached report if fresh, otherwise build and cache a new one.
    ///
    /// Repository and cache failures never fail the call; only an unusable
    /// configuration does.
    pub async fn get_report(&self) -> Result<Report, ReportError> {
        if let Some(report) = fresh_or_miss(self.cache.load()) {
            return Ok(report);
        }

        let report = self.build_report().await?;

        if let Err(e) = self.cache.store(&report) {
            tracing::error!("Failed to cache backups status: {}", e);
        }

        Ok(report)
    }

    /// Drop the cached report so the next request rebuilds it.
    pub fn invalidate_cache(&self) -> Result<(), CacheError> {
        self.cache.invalidate()
    }

    /// Query every configured repository and assemble a report.
    pub async fn build_report(&self) -> Result<Report, ReportError> {
        self.config.validate()?;
        tracing::info!(
            "Creating backups status for {} repositories",
            self.config.repositories.len()
        );

        // Output order of join_all matches configuration order.
        let results = join_all(
            self.config
                .repositories
                .iter()
                .map(|(name, repo)| self.collect_repository(name, repo)),
        )
        .await;

        let mut repositories = IndexMap::with_capacity(results.len());
        let mut bar_chart_series = Vec::with_capacity(results.len());
        for (name, (status, series)) in self.config.repositories.keys().zip(results) {
            repositories.insert(name.clone(), status);
            bar_chart_series.push(series);
        }

        tracing::info!("Backups status created");
        Ok(Report {
            repositories,
            bar_chart_series,
            generated_at: Utc::now(),
        })
    }

    async fn query_repository(&self, repo: &RepositoryConfig) -> RepositoryOutcome {
        let info = match self.query.repo_info(repo).await {
            Ok(info) => info,
            Err(e) => return RepositoryOutcome::Failed(e),
        };
        match self.query.list_archives(repo).await {
            Ok(archives) => RepositoryOutcome::Listed { info, archives },
            Err(e) => RepositoryOutcome::Failed(e),
        }
    }

    async fn collect_repository(&self, name: &str, repo: &RepositoryConfig) -> (RepositoryStatus, Series) {
        let (info, listings) = match self.query_repository(repo).await {
            RepositoryOutcome::Listed { info, archives } => (info, archives),
            RepositoryOutcome::Failed(e) => {
                tracing::error!("Failed to query repository {}: {}", name, e);
                return (
                    RepositoryStatus::degraded(&repo.script, e.to_string()),
                    Series::bar(name),
                );
            }
        };

        let run = self.run_log.latest_run_status(name).await;

        // borg locks the repository per command, so archives are queried one at a time.
        let mut archives = Vec::with_capacity(listings.len());
        for listing in listings {
            let mut archive = Archive::named(listing.name);
            match self.query.archive_info(repo, &archive.name).await {
                Ok(detail) => enrich_archive(&mut archive, detail),
                Err(e) => tracing::warn!(
                    "No information for archive {} in {}: {}",
                    archive.name,
                    name,
                    e
                ),
            }
            if archive.date.is_some() != archive.size.is_some() {
                tracing::warn!("Archive {} in {} has no date/size", archive.name, name);
            }
            archives.push(archive);
        }

        let series = Series::from_archives(name, &archives);
        if series.is_empty() && !archives.is_empty() {
            tracing::warn!("Repository {} has no archives with both date and size", name);
        }
        tracing::debug!(
            "Repository {}: {} archives, {} chart points",
            name,
            archives.len(),
            series.len()
        );
        let status = RepositoryStatus {
            script: repo.script.clone(),
            archive_count: archives.len(),
            archives,
            last_result: run.result,
            last_run_date: run.date,
            last_run_time: run.time,
            last_log: run.log_file,
            error: None,
            extra: without_reserved(info, REPOSITORY_FIELDS),
        };

        (status, series)
    }
}

/// A cache that cannot be read is logged and treated as a miss.
fn fresh_or_miss(loaded: Result<Option<Report>, CacheError>) -> Option<Report> {
    match loaded {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!("Ignoring report cache: {}", e);
            None
        }
    }
}

fn enrich_archive(archive: &mut Archive, detail: ArchiveInfo) {
    archive.date = detail.date;
    archive.size = detail.size;
    archive.extra = without_reserved(detail.extra, ARCHIVE_FIELDS);
}

/// Drop metadata keys that would shadow fixed fields when flattened.
fn without_reserved(mut map: IndexMap<String, String>, reserved: &[&str]) -> IndexMap<String, String> {
    map.retain(|key, _| {
        let keep = !reserved.contains(&key.as_str());
        if !keep {
            tracing::debug!("Dropping metadata key {} that shadows a report field", key);
        }
        keep
    });
    map
}
