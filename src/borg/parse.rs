//! Parsing of `borg ... --json` output.

use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{ArchiveInfo, ArchiveListing, RepositoryInfo};

#[derive(Debug, Deserialize)]
struct RepoInfoOutput {
    #[serde(default)]
    repository: Option<RepositorySection>,
    #[serde(default)]
    encryption: Option<EncryptionSection>,
    #[serde(default)]
    cache: Option<CacheSection>,
}

#[derive(Debug, Deserialize)]
struct RepositorySection {
    location: Option<String>,
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EncryptionSection {
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CacheSection {
    stats: Option<CacheStats>,
}

#[derive(Debug, Deserialize)]
struct CacheStats {
    total_size: Option<u64>,
    total_csize: Option<u64>,
    unique_csize: Option<u64>,
    total_chunks: Option<u64>,
    total_unique_chunks: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListOutput {
    #[serde(default)]
    archives: Vec<ListedArchive>,
}

#[derive(Debug, Deserialize)]
struct ListedArchive {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArchiveInfoOutput {
    #[serde(default)]
    archives: Vec<ArchiveDetail>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDetail {
    start: Option<NaiveDateTime>,
    end: Option<String>,
    duration: Option<f64>,
    hostname: Option<String>,
    username: Option<String>,
    #[serde(default)]
    stats: Option<ArchiveStats>,
}

#[derive(Debug, Deserialize)]
struct ArchiveStats {
    original_size: Option<u64>,
    compressed_size: Option<u64>,
    deduplicated_size: Option<u64>,
    nfiles: Option<u64>,
}

fn insert(map: &mut RepositoryInfo, key: &str, value: Option<impl ToString>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v.to_string());
    }
}

/// Parse `borg info --json <repo>` into flat metadata.
pub fn parse_repo_info(output: &[u8]) -> Result<RepositoryInfo, serde_json::Error> {
    let parsed: RepoInfoOutput = serde_json::from_slice(output)?;
    let mut info = RepositoryInfo::new();

    if let Some(repo) = parsed.repository {
        insert(&mut info, "location", repo.location);
        insert(&mut info, "last_modified", repo.last_modified);
    }
    if let Some(enc) = parsed.encryption {
        insert(&mut info, "encryption", enc.mode);
    }
    if let Some(stats) = parsed.cache.and_then(|c| c.stats) {
        insert(&mut info, "total_size", stats.total_size);
        insert(&mut info, "total_csize", stats.total_csize);
        insert(&mut info, "unique_csize", stats.unique_csize);
        insert(&mut info, "total_chunks", stats.total_chunks);
        insert(&mut info, "total_unique_chunks", stats.total_unique_chunks);
    }

    Ok(info)
}

/// Parse `borg list --json <repo>`, keeping borg's order.
pub fn parse_archive_list(output: &[u8]) -> Result<Vec<ArchiveListing>, serde_json::Error> {
    let parsed: ListOutput = serde_json::from_slice(output)?;
    Ok(parsed
        .archives
        .into_iter()
        .map(|a| ArchiveListing { name: a.name })
        .collect())
}

/// Parse `borg info --json <repo>::<archive>`.
pub fn parse_archive_info(output: &[u8]) -> Result<ArchiveInfo, serde_json::Error> {
    let parsed: ArchiveInfoOutput = serde_json::from_slice(output)?;
    let Some(detail) = parsed.archives.into_iter().next() else {
        return Ok(ArchiveInfo::default());
    };

    let mut info = ArchiveInfo {
        date: detail.start,
        ..Default::default()
    };
    insert(&mut info.extra, "end", detail.end);
    insert(&mut info.extra, "duration", detail.duration);
    insert(&mut info.extra, "hostname", detail.hostname);
    insert(&mut info.extra, "username", detail.username);
    if let Some(stats) = detail.stats {
        info.size = stats.original_size;
        insert(&mut info.extra, "nfiles", stats.nfiles);
        insert(&mut info.extra, "compressed_size", stats.compressed_size);
        insert(&mut info.extra, "deduplicated_size", stats.deduplicated_size);
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO_INFO: &str = r#"{
        "cache": {
            "path": "/root/.cache/borg/0672ce",
            "stats": {
                "total_chunks": 511533,
                "total_csize": 17948017540,
                "total_size": 22635749792,
                "total_unique_chunks": 54892,
                "unique_csize": 1920405405,
                "unique_size": 2449675468
            }
        },
        "encryption": {"mode": "repokey"},
        "repository": {
            "id": "0cbe6166b46627fd26b97f8831e2ca97584280a46714ef84d2b668daf8271a23",
            "last_modified": "2024-03-01T02:14:07.000000",
            "location": "/srv/backups/repoA"
        },
        "security_dir": "/root/.config/borg/security/0cbe"
    }"#;

    const LIST: &str = r#"{
        "archives": [
            {"archive": "host-2024-02-29", "name": "host-2024-02-29", "id": "aa", "start": "2024-02-29T02:00:01.000000", "time": "2024-02-29T02:00:01.000000"},
            {"archive": "host-2024-03-01", "name": "host-2024-03-01", "id": "bb", "start": "2024-03-01T02:00:01.000000", "time": "2024-03-01T02:00:01.000000"}
        ],
        "encryption": {"mode": "repokey"},
        "repository": {"id": "0cbe", "last_modified": "2024-03-01T02:14:07.000000", "location": "/srv/backups/repoA"}
    }"#;

    const ARCHIVE_INFO: &str = r#"{
        "archives": [{
            "chunker_params": ["buzhash", 19, 23, 21, 4095],
            "command_line": ["/usr/bin/borg", "create", "::host-2024-03-01", "/home"],
            "comment": "",
            "duration": 12.5,
            "end": "2024-03-01T02:00:13.500000",
            "hostname": "host",
            "id": "bb",
            "name": "host-2024-03-01",
            "start": "2024-03-01T02:00:01.000000",
            "stats": {
                "compressed_size": 1880961894,
                "deduplicated_size": 2791,
                "nfiles": 53669,
                "original_size": 2400471280
            },
            "username": "root"
        }],
        "encryption": {"mode": "repokey"}
    }"#;

    #[test]
    fn test_parse_repo_info() {
        let info = parse_repo_info(REPO_INFO.as_bytes()).unwrap();
        assert_eq!(info["location"], "/srv/backups/repoA");
        assert_eq!(info["encryption"], "repokey");
        assert_eq!(info["total_size"], "22635749792");
        assert_eq!(info["unique_csize"], "1920405405");
        assert!(!info.contains_key("unique_size"));
    }

    #[test]
    fn test_parse_archive_list_keeps_order() {
        let archives = parse_archive_list(LIST.as_bytes()).unwrap();
        let names: Vec<_> = archives.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["host-2024-02-29", "host-2024-03-01"]);
    }

    #[test]
    fn test_parse_archive_info() {
        let info = parse_archive_info(ARCHIVE_INFO.as_bytes()).unwrap();
        assert_eq!(info.size, Some(2400471280));
        assert_eq!(
            info.date.unwrap().to_string(),
            "2024-03-01 02:00:01"
        );
        assert_eq!(info.extra["nfiles"], "53669");
        assert_eq!(info.extra["hostname"], "host");
        assert_eq!(info.extra["duration"], "12.5");
    }

    #[test]
    fn test_parse_archive_info_without_stats() {
        let info = parse_archive_info(br#"{"archives": [{"name": "partial"}]}"#).unwrap();
        assert_eq!(info.date, None);
        assert_eq!(info.size, None);

        let empty = parse_archive_info(br#"{"archives": []}"#).unwrap();
        assert_eq!(empty, ArchiveInfo::default());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_repo_info(b"Repository /srv/x does not exist.").is_err());
        assert!(parse_archive_list(b"").is_err());
    }
}
