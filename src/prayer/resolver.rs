use chrono::{Local, NaiveDate, Utc};
use thiserror::Error;

use crate::prayer::cache::CacheStore;
use crate::prayer::calc;
use crate::prayer::model::{CacheRecord, DailyTimes, Source};
use crate::prayer::remote::RemoteSource;
use crate::prayer::zones::find_zone;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown zone '{0}': no coordinates to calculate from")]
    UnknownZone(String),
    #[error("remote prayer-time service unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("no cached schedule for zone {zone} on {date}")]
    CacheMiss { zone: String, date: NaiveDate },
    #[error("all prayer-time sources failed for zone {zone}: {reason}")]
    AllSourcesFailed { zone: String, reason: String },
}

/// Produces one day's schedule from the first tier that can supply it:
/// remote service, then the cached month, then offline calculation.
pub struct TimeSourceResolver {
    remote: Box<dyn RemoteSource>,
    cache: Box<dyn CacheStore>,
}

impl TimeSourceResolver {
    pub fn new(remote: Box<dyn RemoteSource>, cache: Box<dyn CacheStore>) -> Self {
        Self { remote, cache }
    }

    pub fn resolve_today(&self, zone: &str) -> Result<DailyTimes, ResolveError> {
        self.resolve_for(zone, Local::now().date_naive())
    }

    pub fn resolve_for(&self, zone: &str, today: NaiveDate) -> Result<DailyTimes, ResolveError> {
        self.resolve_with(zone, today, true)
    }

    /// Same tiers as `resolve_today`, but a remote month is never written to
    /// the cache. Used for zones other than the kiosk's own, whose cache slot
    /// must keep holding the kiosk's month.
    pub fn lookup_today(&self, zone: &str) -> Result<DailyTimes, ResolveError> {
        self.lookup_for(zone, Local::now().date_naive())
    }

    pub fn lookup_for(&self, zone: &str, today: NaiveDate) -> Result<DailyTimes, ResolveError> {
        self.resolve_with(zone, today, false)
    }

    fn resolve_with(
        &self,
        zone: &str,
        today: NaiveDate,
        persist: bool,
    ) -> Result<DailyTimes, ResolveError> {
        let zone = zone.trim().to_ascii_uppercase();

        match self.from_remote(&zone, today, persist) {
            Ok(times) => return Ok(times),
            Err(err) => tracing::warn!(zone = %zone, error = %err, "remote tier failed"),
        }

        match self.from_cache(&zone, today) {
            Ok(times) => return Ok(times),
            Err(err) => tracing::debug!(zone = %zone, error = %err, "cache tier missed"),
        }

        let times = self.from_calculation(&zone, today)?;
        tracing::info!(zone = %zone, date = %today, "using calculated prayer times");
        Ok(times)
    }

    fn from_remote(
        &self,
        zone: &str,
        today: NaiveDate,
        persist: bool,
    ) -> Result<DailyTimes, ResolveError> {
        let days = self.remote.fetch_month(zone)?;
        let record = CacheRecord::new(zone, Utc::now(), days);
        if !persist {
            tracing::debug!(zone = %zone, "lookup only, prayer cache left alone");
        } else if let Err(err) = self.cache.store(&record) {
            tracing::warn!(zone = %zone, error = %format!("{err:#}"), "failed to persist prayer cache");
        } else {
            tracing::debug!(zone = %zone, days = record.days.len(), "prayer cache updated");
        }

        let entry = record.day(today).ok_or_else(|| {
            ResolveError::RemoteUnavailable(format!("month schedule has no entry for {today}"))
        })?;
        Ok(DailyTimes::from_entry(entry, Source::Remote))
    }

    fn from_cache(&self, zone: &str, today: NaiveDate) -> Result<DailyTimes, ResolveError> {
        let miss = || ResolveError::CacheMiss {
            zone: zone.to_string(),
            date: today,
        };
        let record = match self.cache.load() {
            Ok(Some(record)) => record,
            Ok(None) => return Err(miss()),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "prayer cache unreadable");
                return Err(miss());
            }
        };
        if !record.zone.eq_ignore_ascii_case(zone) {
            return Err(miss());
        }
        record
            .day(today)
            .map(|entry| DailyTimes::from_entry(entry, Source::Cached))
            .ok_or_else(miss)
    }

    fn from_calculation(&self, zone: &str, today: NaiveDate) -> Result<DailyTimes, ResolveError> {
        let Some(found) = find_zone(zone) else {
            return Err(ResolveError::UnknownZone(zone.to_string()));
        };
        let times = calc::calculate_day(found, today);
        if times.known_count() == 0 {
            return Err(ResolveError::AllSourcesFailed {
                zone: zone.to_string(),
                reason: "calculation produced no usable times".to_string(),
            });
        }
        Ok(times)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::Result;

    use super::*;
    use crate::prayer::model::{DayEntry, Prayer, TimeOfDay};
    use crate::prayer::remote::OfflineRemote;

    #[derive(Clone, Default)]
    struct MemoryCache {
        record: Arc<Mutex<Option<CacheRecord>>>,
        writes: Arc<AtomicUsize>,
    }

    impl CacheStore for MemoryCache {
        fn load(&self) -> Result<Option<CacheRecord>> {
            Ok(self.record.lock().expect("lock").clone())
        }

        fn store(&self, record: &CacheRecord) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.record.lock().expect("lock") = Some(record.clone());
            Ok(())
        }
    }

    struct FixedRemote {
        days: Vec<DayEntry>,
        fail: Arc<AtomicBool>,
    }

    impl RemoteSource for FixedRemote {
        fn fetch_month(&self, _zone: &str) -> Result<Vec<DayEntry>, ResolveError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ResolveError::RemoteUnavailable("forced".to_string()));
            }
            Ok(self.days.clone())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("date")
    }

    fn entry(date: NaiveDate) -> DayEntry {
        DayEntry {
            date,
            hijri: "1448-04-27".to_string(),
            imsak: TimeOfDay::new(5, 32),
            subuh: TimeOfDay::new(5, 42),
            syuruk: TimeOfDay::new(6, 51),
            zohor: TimeOfDay::new(12, 53),
            asar: TimeOfDay::new(16, 7),
            maghrib: TimeOfDay::new(18, 52),
            isyak: TimeOfDay::new(20, 2),
        }
    }

    #[test]
    fn remote_success_updates_cache_then_cache_serves_when_remote_fails() {
        let cache = MemoryCache::default();
        let fail = Arc::new(AtomicBool::new(false));
        let resolver = TimeSourceResolver::new(
            Box::new(FixedRemote {
                days: vec![entry(today()), entry(today().succ_opt().expect("next"))],
                fail: Arc::clone(&fail),
            }),
            Box::new(cache.clone()),
        );

        let remote = resolver.resolve_for("TRG01", today()).expect("remote");
        assert_eq!(remote.source, Source::Remote);
        assert_eq!(remote.time(Prayer::Zohor), TimeOfDay::new(12, 53));
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);

        fail.store(true, Ordering::SeqCst);
        let cached = resolver.resolve_for("TRG01", today()).expect("cached");
        assert_eq!(cached.source, Source::Cached);
        assert_eq!(cached.time(Prayer::Zohor), TimeOfDay::new(12, 53));
        assert_eq!(cached.hijri_label.as_deref(), Some("1448-04-27"));
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_for_another_zone_is_never_used() {
        let cache = MemoryCache::default();
        cache
            .store(&CacheRecord::new("WLY01", Utc::now(), vec![entry(today())]))
            .expect("seed");
        let resolver = TimeSourceResolver::new(Box::new(OfflineRemote), Box::new(cache));

        let times = resolver.resolve_for("TRG01", today()).expect("calculated");
        assert_eq!(times.source, Source::Calculated);
    }

    #[test]
    fn stale_month_falls_through_to_calculation() {
        let cache = MemoryCache::default();
        let last_month = NaiveDate::from_ymd_opt(2026, 9, 19).expect("date");
        cache
            .store(&CacheRecord::new("TRG01", Utc::now(), vec![entry(last_month)]))
            .expect("seed");
        let resolver = TimeSourceResolver::new(Box::new(OfflineRemote), Box::new(cache));

        let times = resolver.resolve_for("trg01", today()).expect("calculated");
        assert_eq!(times.source, Source::Calculated);
        let ordered = Prayer::CANONICAL.map(|prayer| times.seconds_of_day(prayer).expect("time"));
        assert!(ordered.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn remote_month_without_today_still_refreshes_cache() {
        let cache = MemoryCache::default();
        let other_day = NaiveDate::from_ymd_opt(2026, 11, 1).expect("date");
        let resolver = TimeSourceResolver::new(
            Box::new(FixedRemote {
                days: vec![entry(other_day)],
                fail: Arc::new(AtomicBool::new(false)),
            }),
            Box::new(cache.clone()),
        );

        let times = resolver.resolve_for("TRG01", today()).expect("calculated");
        assert_eq!(times.source, Source::Calculated);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lookup_for_another_zone_leaves_cache_alone() {
        let cache = MemoryCache::default();
        cache
            .store(&CacheRecord::new("TRG01", Utc::now(), vec![entry(today())]))
            .expect("seed");
        let resolver = TimeSourceResolver::new(
            Box::new(FixedRemote {
                days: vec![entry(today())],
                fail: Arc::new(AtomicBool::new(false)),
            }),
            Box::new(cache.clone()),
        );

        let times = resolver.lookup_for("WLY01", today()).expect("remote");
        assert_eq!(times.source, Source::Remote);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
        let kept = cache.load().expect("load").expect("record");
        assert_eq!(kept.zone, "TRG01");
    }

    #[test]
    fn unknown_zone_is_fatal_once_remote_and_cache_fail() {
        let resolver =
            TimeSourceResolver::new(Box::new(OfflineRemote), Box::new(MemoryCache::default()));
        let err = resolver.resolve_for("XYZ99", today()).expect_err("unknown zone");
        assert!(matches!(err, ResolveError::UnknownZone(ref zone) if zone == "XYZ99"));
    }

    #[test]
    fn unknown_zone_still_resolves_when_remote_answers() {
        let resolver = TimeSourceResolver::new(
            Box::new(FixedRemote {
                days: vec![entry(today())],
                fail: Arc::new(AtomicBool::new(false)),
            }),
            Box::new(MemoryCache::default()),
        );
        let times = resolver.resolve_for("XYZ99", today()).expect("remote");
        assert_eq!(times.source, Source::Remote);
    }
}
