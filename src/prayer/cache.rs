use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::prayer::model::CacheRecord;

/// Single-slot persistence for the last successful month fetch.
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` when nothing has been cached yet.
    fn load(&self) -> Result<Option<CacheRecord>>;
    fn store(&self, record: &CacheRecord) -> Result<()>;
}

pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileCache {
    fn load(&self) -> Result<Option<CacheRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("unable to read cache {}", self.path.display()));
            }
        };
        let record = serde_json::from_str::<CacheRecord>(&content)
            .with_context(|| format!("invalid cache JSON in {}", self.path.display()))?;
        Ok(Some(record))
    }

    fn store(&self, record: &CacheRecord) -> Result<()> {
        let text = serde_json::to_string_pretty(record)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // One staging file per writer; concurrent stores never share it.
        let mut staging = NamedTempFile::new_in(dir)
            .with_context(|| format!("unable to stage cache in {}", dir.display()))?;
        staging
            .write_all(format!("{text}\n").as_bytes())
            .with_context(|| format!("unable to write cache {}", staging.path().display()))?;
        staging
            .persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("unable to replace cache {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::prayer::model::{DayEntry, TimeOfDay};

    fn entry(day: u32) -> DayEntry {
        DayEntry {
            date: NaiveDate::from_ymd_opt(2026, 10, day).expect("date"),
            hijri: String::new(),
            imsak: TimeOfDay::new(5, 32),
            subuh: TimeOfDay::new(5, 42),
            syuruk: TimeOfDay::new(6, 51),
            zohor: TimeOfDay::new(12, 53),
            asar: TimeOfDay::new(16, 7),
            maghrib: TimeOfDay::new(18, 52),
            isyak: None,
        }
    }

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = tempdir().expect("tempdir");
        let cache = JsonFileCache::new(dir.path().join("prayer-cache.json"));
        assert!(cache.load().expect("load").is_none());
    }

    #[test]
    fn store_overwrites_previous_record() {
        let dir = tempdir().expect("tempdir");
        let cache = JsonFileCache::new(dir.path().join("prayer-cache.json"));
        let fetched = Utc.with_ymd_and_hms(2026, 10, 1, 1, 0, 0).single().expect("time");

        cache
            .store(&CacheRecord::new("TRG01", fetched, vec![entry(1), entry(2)]))
            .expect("first store");
        cache
            .store(&CacheRecord::new("WLY01", fetched, vec![entry(19)]))
            .expect("second store");

        let record = cache.load().expect("load").expect("record");
        assert_eq!(record.zone, "WLY01");
        assert_eq!(record.month, "2026-10");
        assert_eq!(record.days.len(), 1);
        assert_eq!(record.days[0].isyak, None);
        let leftovers = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn concurrent_stores_do_not_collide() {
        let dir = tempdir().expect("tempdir");
        let cache = Arc::new(JsonFileCache::new(dir.path().join("prayer-cache.json")));
        let fetched = Utc.with_ymd_and_hms(2026, 10, 1, 1, 0, 0).single().expect("time");

        let writers = ["TRG01", "WLY01"].map(|zone| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let record = CacheRecord::new(zone, fetched, vec![entry(1), entry(2)]);
                (0..200)
                    .filter(|_| cache.store(&record).is_err())
                    .count()
            })
        });
        for writer in writers {
            assert_eq!(writer.join().expect("writer thread"), 0);
        }

        let record = cache.load().expect("load").expect("record");
        assert!(record.zone == "TRG01" || record.zone == "WLY01");
        assert_eq!(record.days.len(), 2);
        assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("prayer-cache.json");
        fs::write(&path, "{ nope").expect("write");
        let err = JsonFileCache::new(path).load().expect_err("corrupt cache");
        assert!(err.to_string().contains("invalid cache JSON"));
    }
}
