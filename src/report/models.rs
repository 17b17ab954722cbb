//! Report model types.

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Outcome of the most recent backup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastResult {
    Ok,
    /// Also used when no run record was found.
    #[default]
    Warning,
    Error,
}

/// Composite status report across all configured repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Per-repository status, in configuration order.
    #[serde(rename = "repos")]
    pub repositories: IndexMap<String, RepositoryStatus>,
    /// One bar chart series per repository, in configuration order.
    #[serde(rename = "bargraph")]
    pub bar_chart_series: Vec<Series>,
    #[serde(rename = "ctime")]
    pub generated_at: DateTime<Utc>,
}

/// Field names owned by [`RepositoryStatus`]; flattened metadata may not reuse them.
pub const REPOSITORY_FIELDS: &[&str] = &[
    "script",
    "backups",
    "archives",
    "last_result",
    "last_date",
    "last_time",
    "last_log",
    "error",
];

/// Field names owned by [`Archive`].
pub const ARCHIVE_FIELDS: &[&str] = &["name", "date", "size"];

/// Status of a single repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub script: String,
    #[serde(rename = "backups")]
    pub archives: Vec<Archive>,
    #[serde(rename = "archives")]
    pub archive_count: usize,
    pub last_result: LastResult,
    #[serde(rename = "last_date")]
    pub last_run_date: String,
    #[serde(rename = "last_time")]
    pub last_run_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_log: Option<String>,
    /// Why the repository query failed, for degraded entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Repository metadata from the info query.
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl RepositoryStatus {
    /// Entry for a repository whose query failed.
    pub fn degraded(script: &str, reason: String) -> Self {
        Self {
            script: script.to_string(),
            archives: Vec::new(),
            archive_count: 0,
            last_result: LastResult::Error,
            last_run_date: String::new(),
            last_run_time: String::new(),
            last_log: None,
            error: Some(reason),
            extra: IndexMap::new(),
        }
    }
}

/// One backup archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl Archive {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            size: None,
            extra: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    #[default]
    Bar,
}

/// Archive size over time for one repository.
///
/// `x` and `y` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(rename = "type")]
    pub kind: SeriesKind,
    pub name: String,
    x: Vec<NaiveDateTime>,
    y: Vec<u64>,
}

impl Series {
    pub fn bar(name: impl Into<String>) -> Self {
        Self {
            kind: SeriesKind::Bar,
            name: name.into(),
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    /// Build a series from archives that have both a date and a size, in order.
    pub fn from_archives(name: impl Into<String>, archives: &[Archive]) -> Self {
        let mut series = Self::bar(name);
        for archive in archives {
            if let (Some(date), Some(size)) = (archive.date, archive.size) {
                series.push(date, size);
            }
        }
        series
    }

    pub fn push(&mut self, date: NaiveDateTime, size: u64) {
        self.x.push(date);
        self.y.push(size);
    }

    #[cfg(test)]
    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.x
    }

    #[cfg(test)]
    pub fn sizes(&self) -> &[u64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_series_skips_incomplete_archives() {
        let mut full = Archive::named("full");
        full.date = Some(ts(1));
        full.size = Some(100);
        let mut no_size = Archive::named("no-size");
        no_size.date = Some(ts(2));
        let mut later = Archive::named("later");
        later.date = Some(ts(3));
        later.size = Some(300);

        let series = Series::from_archives("repoA", &[full, no_size, Archive::named("bare"), later]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.dates(), &[ts(1), ts(3)]);
        assert_eq!(series.sizes(), &[100, 300]);
    }

    #[test]
    fn test_report_json_shape() {
        let mut archive = Archive::named("host-2024-03-01");
        archive.date = Some(ts(1));
        archive.size = Some(4096);
        archive.extra.insert("nfiles".to_string(), "12".to_string());

        let mut extra = IndexMap::new();
        extra.insert("encryption".to_string(), "repokey".to_string());
        let status = RepositoryStatus {
            script: "nightly.sh".to_string(),
            archives: vec![archive.clone()],
            archive_count: 1,
            last_result: LastResult::Ok,
            last_run_date: "2024-03-01".to_string(),
            last_run_time: "02:00:00".to_string(),
            last_log: None,
            error: None,
            extra,
        };

        let mut repositories = IndexMap::new();
        repositories.insert("repoA".to_string(), status);
        let report = Report {
            repositories,
            bar_chart_series: vec![Series::from_archives("repoA", &[archive])],
            generated_at: Utc::now(),
        };

        let value = serde_json::to_value(&report).unwrap();
        let repo = &value["repos"]["repoA"];
        assert_eq!(repo["archives"], 1);
        assert_eq!(repo["last_result"], "ok");
        assert_eq!(repo["last_date"], "2024-03-01");
        assert_eq!(repo["encryption"], "repokey");
        assert_eq!(repo["backups"][0]["name"], "host-2024-03-01");
        assert_eq!(repo["backups"][0]["size"], 4096);
        assert_eq!(repo["backups"][0]["nfiles"], "12");
        assert!(repo.get("error").is_none());
        assert_eq!(value["bargraph"][0]["type"], "bar");
        assert_eq!(value["bargraph"][0]["x"][0], "2024-03-01T02:00:00");
        assert!(value["ctime"].is_string());

        // Serving from cache must reproduce the same bytes.
        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: Report = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, report);
        assert_eq!(serde_json::to_string(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_degraded_entry() {
        let status = RepositoryStatus::degraded("s.sh", "lock timeout".to_string());
        assert_eq!(status.last_result, LastResult::Error);
        assert!(status.archives.is_empty());
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["last_result"], "error");
        assert_eq!(value["error"], "lock timeout");
    }
}
