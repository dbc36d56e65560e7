//! Content-hash snapshot of an extracted suite.
//!
//! A snapshot records the xxh64 hash of the source archive and of every file
//! extracted from it. It is stored as JSON in [`CACHE_FILE_NAME`] inside the
//! extraction directory, so each directory carries its own snapshot.
//!
//! The staleness query compares the snapshot read from disk against one
//! recomputed from the file system. Files that disappeared since the last
//! snapshot are not reported; only new or modified files are listed.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use xxhash_rust::xxh64::Xxh64;

pub const CACHE_FILE_NAME: &str = ".suite.csm";

const HASH_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    #[serde(rename = "file", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl FileEntry {
    /// Same file content; modification time is ignored.
    pub fn same_content(&self, other: &FileEntry) -> bool {
        self.name == other.name && self.size == other.size && self.hash == other.hash
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Staleness {
    pub stale: bool,
    pub changed: Vec<String>,
}

#[derive(Debug)]
pub struct Cache {
    cache_file: PathBuf,
    archive: PathBuf,
    content: PathBuf,
    cached: Option<Snapshot>,
    actual: Option<Snapshot>,
}

impl Cache {
    pub fn new(archive: impl Into<PathBuf>, content: impl Into<PathBuf>) -> Self {
        let content = content.into();
        Cache {
            cache_file: content.join(CACHE_FILE_NAME),
            archive: archive.into(),
            content,
            cached: None,
            actual: None,
        }
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn cached(&self) -> Option<&Snapshot> {
        self.cached.as_ref()
    }

    pub fn actual(&self) -> Option<&Snapshot> {
        self.actual.as_ref()
    }

    /// Loads the stored snapshot. Returns `Ok(false)` when there is none.
    pub fn read(&mut self) -> Result<bool> {
        self.cached = None;
        let bytes = match fs::read(&self.cache_file) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Reading cache file {:?}", self.cache_file));
            }
        };
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("Parsing cache file {:?}", self.cache_file))?;
        self.cached = Some(snapshot);
        Ok(true)
    }

    /// Recomputes the snapshot from the archive and the extraction directory.
    pub fn update(&mut self) -> Result<()> {
        let hash = hash_file(&self.archive)?;
        let name = self
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut snapshot = Snapshot {
            name,
            files: Vec::new(),
            hash,
        };

        if self.content.is_dir() {
            for entry in WalkDir::new(&self.content).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Walking {:?}", self.content))?;
                if !entry.file_type().is_file() || entry.file_name() == CACHE_FILE_NAME {
                    continue;
                }
                let meta = entry
                    .metadata()
                    .with_context(|| format!("Reading metadata for {:?}", entry.path()))?;
                let date = meta
                    .modified()
                    .map(|t| DateTime::<Local>::from(t).to_string())
                    .unwrap_or_default();
                snapshot.files.push(FileEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len().to_string(),
                    date,
                    hash: hash_file(entry.path())?,
                });
            }
        }

        self.actual = Some(snapshot);
        Ok(())
    }

    /// Persists the recomputed snapshot, replacing the previous one.
    pub fn write(&self) -> Result<()> {
        let actual = self
            .actual
            .as_ref()
            .ok_or_else(|| anyhow!("No snapshot computed for {:?}", self.content))?;
        let json = serde_json::to_string_pretty(actual).context("Serializing cache snapshot")?;
        fs::write(&self.cache_file, json)
            .with_context(|| format!("Writing cache file {:?}", self.cache_file))
    }

    pub fn stale(&self) -> Staleness {
        let (Some(cached), Some(actual)) = (&self.cached, &self.actual) else {
            return Staleness {
                stale: true,
                changed: Vec::new(),
            };
        };
        if cached.hash.is_empty() || actual.hash.is_empty() {
            return Staleness {
                stale: true,
                changed: Vec::new(),
            };
        }
        if cached.hash == actual.hash {
            return Staleness::default();
        }

        let previous: HashMap<&str, &FileEntry> =
            cached.files.iter().map(|f| (f.name.as_str(), f)).collect();
        let changed = actual
            .files
            .iter()
            .filter(|f| {
                previous
                    .get(f.name.as_str())
                    .is_none_or(|prev| !f.same_content(prev))
            })
            .map(|f| f.name.clone())
            .collect();
        Staleness {
            stale: true,
            changed,
        }
    }
}

/// Lowercase hex xxh64 (seed 0) of the file's full content.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Opening {path:?} for hashing"))?;
    let mut hasher = Xxh64::new(0);
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).with_context(|| format!("Hashing {path:?}")),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.digest()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(name: &str, size: &str, hash: &str) -> FileEntry {
        FileEntry {
            name: name.into(),
            size: size.into(),
            date: String::new(),
            hash: hash.into(),
        }
    }

    fn cache_with(cached: Option<Snapshot>, actual: Option<Snapshot>) -> Cache {
        let mut cache = Cache::new("suite.zip", "content");
        cache.cached = cached;
        cache.actual = actual;
        cache
    }

    fn snapshot(hash: &str, files: Vec<FileEntry>) -> Snapshot {
        Snapshot {
            name: "suite.zip".into(),
            files,
            hash: hash.into(),
        }
    }

    #[test]
    fn missing_snapshot_is_stale_without_file_list() {
        let cache = cache_with(None, Some(snapshot("1", vec![])));
        assert_eq!(
            cache.stale(),
            Staleness {
                stale: true,
                changed: vec![]
            }
        );
        let cache = cache_with(Some(snapshot("", vec![])), Some(snapshot("1", vec![])));
        assert!(cache.stale().stale);
    }

    #[test]
    fn equal_archive_hash_is_fresh() {
        let files = vec![entry("a", "1", "aa")];
        let cache = cache_with(
            Some(snapshot("1", files.clone())),
            Some(snapshot("1", vec![entry("a", "2", "bb")])),
        );
        assert_eq!(cache.stale(), Staleness::default());
    }

    #[test]
    fn changed_archive_lists_new_and_modified_files() {
        let cache = cache_with(
            Some(snapshot(
                "1",
                vec![entry("a", "1", "aa"), entry("b", "1", "bb"), entry("gone", "1", "cc")],
            )),
            Some(snapshot(
                "2",
                vec![entry("a", "1", "aa"), entry("b", "1", "b2"), entry("c", "3", "cc")],
            )),
        );
        let staleness = cache.stale();
        assert!(staleness.stale);
        assert_eq!(staleness.changed, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, "takeoff").unwrap();
        fs::write(&b, "takeoff").unwrap();
        assert_eq!(hash_file(&a).unwrap(), hash_file(&a).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        fs::write(&b, "landing").unwrap();
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), format!("{:x}", xxhash_rust::xxh64::xxh64(b"takeoff", 0)));
    }

    #[test]
    fn read_without_snapshot_leaves_cache_empty() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(dir.path().join("suite.zip"), dir.path());
        assert!(!cache.read().unwrap());
        assert!(cache.cached().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILE_NAME), "{not json").unwrap();
        let mut cache = Cache::new(dir.path().join("suite.zip"), dir.path());
        assert!(cache.read().is_err());
        assert!(cache.cached().is_none());
    }

    #[test]
    fn write_before_update_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path().join("suite.zip"), dir.path());
        assert!(cache.write().is_err());
        assert!(!cache.cache_file().exists());
    }

    #[test]
    fn snapshot_json_uses_file_key() {
        let json = serde_json::to_value(snapshot("ab", vec![entry("a", "1", "ff")])).unwrap();
        assert_eq!(json["name"], "suite.zip");
        assert_eq!(json["hash"], "ab");
        assert_eq!(json["file"][0]["size"], "1");
        assert!(json["file"][0].get("date").is_none());
    }
}
