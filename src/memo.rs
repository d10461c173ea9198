//! Caller-side memoization of resolutions, using moka.
//!
//! Redraws and repeated lookups for the same spot should not spend provider
//! quota. Results are keyed by the query point rounded to three decimals
//! (~110 m) and the search radius in meters. They expire after a TTL and the
//! cache holds at most `max_capacity` entries. The engine itself never
//! consults this cache.
//!
//! Provider-error outcomes are not stored, so the next call retries.

use moka::sync::Cache;
use std::time::Duration;

use crate::model::{GeoPoint, Resolution, ResolutionOutcome};

/// Default time-to-live for a memoized resolution.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default upper bound on memoized resolutions.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    lat_milli: i64,
    lon_milli: i64,
    radius_m: u64,
}

impl MemoKey {
    pub fn new(point: GeoPoint, radius_km: f64) -> Self {
        Self {
            lat_milli: (point.latitude * 1000.0).round() as i64,
            lon_milli: (point.longitude * 1000.0).round() as i64,
            radius_m: (radius_km * 1000.0).round().max(0.0) as u64,
        }
    }
}

pub struct ResolutionMemo {
    cache: Cache<MemoKey, Resolution>,
}

impl Default for ResolutionMemo {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResolutionMemo {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    /// Returns a cached resolution that has not yet expired.
    pub fn get(&self, point: GeoPoint, radius_km: f64) -> Option<Resolution> {
        self.cache.get(&MemoKey::new(point, radius_km))
    }

    /// Stores `resolution` unless it is a provider error.
    pub fn insert(&self, point: GeoPoint, radius_km: f64, resolution: Resolution) {
        if matches!(resolution.outcome, ResolutionOutcome::ProviderError(_)) {
            return;
        }
        self.cache.insert(MemoKey::new(point, radius_km), resolution);
    }

    /// Returns the cached resolution, or runs `resolve` and caches its result.
    pub fn get_or_resolve<F>(&self, point: GeoPoint, radius_km: f64, resolve: F) -> Resolution
    where
        F: FnOnce() -> Resolution,
    {
        if let Some(hit) = self.get(point, radius_km) {
            return hit;
        }
        let resolution = resolve();
        self.insert(point, radius_km, resolution.clone());
        resolution
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of live entries, after moka has applied pending evictions.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn resolution(outcome: ResolutionOutcome) -> Resolution {
        Resolution {
            outcome,
            rate_limit: None,
            stations_located: 0,
            stations_probed: 0,
            used_fallback: false,
        }
    }

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_nearby_points_share_a_key() {
        assert_eq!(
            MemoKey::new(point(19.43261, -99.13319), 15.0),
            MemoKey::new(point(19.43255, -99.13324), 15.0)
        );
        assert_ne!(
            MemoKey::new(point(19.4326, -99.1332), 15.0),
            MemoKey::new(point(19.4326, -99.1332), 10.0)
        );
    }

    #[test]
    fn test_hit_within_ttl_skips_resolver() {
        let memo = ResolutionMemo::new(Duration::from_secs(600));
        let p = point(19.4326, -99.1332);

        let mut calls = 0;
        memo.get_or_resolve(p, 15.0, || {
            calls += 1;
            resolution(ResolutionOutcome::NoStations)
        });
        let again = memo.get_or_resolve(p, 15.0, || {
            calls += 1;
            resolution(ResolutionOutcome::NoFreshData)
        });

        assert_eq!(calls, 1);
        assert_eq!(again.outcome, ResolutionOutcome::NoStations);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let memo = ResolutionMemo::new(Duration::from_millis(50));
        let p = point(19.4326, -99.1332);
        memo.insert(p, 15.0, resolution(ResolutionOutcome::NoStations));
        assert!(memo.get(p, 15.0).is_some());

        thread::sleep(Duration::from_millis(120));

        assert!(memo.get(p, 15.0).is_none());
        assert!(memo.is_empty());
    }

    #[test]
    fn test_expired_entries_do_not_accumulate() {
        let memo = ResolutionMemo::new(Duration::from_millis(20));
        for i in 0..200 {
            memo.insert(point(0.0, f64::from(i) * 0.01), 15.0, resolution(ResolutionOutcome::NoStations));
        }

        thread::sleep(Duration::from_millis(80));

        assert_eq!(memo.len(), 0);
    }

    #[test]
    fn test_capacity_bounds_live_entries() {
        let memo = ResolutionMemo::with_capacity(Duration::from_secs(600), 10);
        for i in 0..500 {
            memo.insert(point(0.0, f64::from(i) * 0.01), 15.0, resolution(ResolutionOutcome::NoStations));
        }
        assert!(memo.len() <= 10);
    }

    #[test]
    fn test_provider_errors_are_not_cached() {
        let memo = ResolutionMemo::default();
        let p = point(0.0, 0.0);
        memo.insert(p, 15.0, resolution(ResolutionOutcome::ProviderError("HTTP error: 503".into())));
        assert!(memo.is_empty());
        assert!(memo.get(p, 15.0).is_none());
    }
}
