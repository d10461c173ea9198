/// Per-sensor latest reading.
///
/// The primary provider is asked for the newest entries first, but providers
/// have been seen to ignore `order_by`/`sort`. The newest entry is therefore
/// picked locally by timestamp, whatever order the response arrives in.

use chrono::{DateTime, Duration, Utc};

use crate::alert::freshness::parse_utc;
use crate::ingest::{PrimaryProvider, RawReading};
use crate::model::{ProviderError, SensorId, SensorReading};

/// Default trailing window for "latest" queries, in hours.
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Default number of entries requested per sensor.
pub const DEFAULT_READINGS_LIMIT: u32 = 100;

/// Converts a raw entry into a reading if it carries both a parseable
/// period-end timestamp and a usable value.
///
/// Negative and non-finite values are provider sentinels (e.g. -999), not
/// concentrations, and are dropped like missing ones.
pub fn usable_reading(raw: &RawReading) -> Option<SensorReading> {
    let observed_at = raw.period_end_utc.as_deref().and_then(parse_utc)?;
    let value = raw.value.filter(|v| v.is_finite() && *v >= 0.0)?;
    Some(SensorReading { value, observed_at })
}

/// Picks the usable entry with the greatest timestamp. On equal timestamps
/// the entry listed first wins.
pub fn select_latest(raw: &[RawReading]) -> Option<SensorReading> {
    raw.iter()
        .filter_map(usable_reading)
        .fold(None, |best: Option<SensorReading>, candidate| match best {
            Some(b) if b.observed_at >= candidate.observed_at => Some(b),
            _ => Some(candidate),
        })
}

/// Start of the trailing `(now - window, now]` query window.
///
/// A window reaching past the representable date range is an
/// `InvalidRequest`, never a panic.
pub fn trailing_window_start(now: DateTime<Utc>, window_hours: u32) -> Result<DateTime<Utc>, ProviderError> {
    now.checked_sub_signed(Duration::hours(i64::from(window_hours)))
        .ok_or_else(|| {
            ProviderError::InvalidRequest(format!("reading window of {} hours is out of range", window_hours))
        })
}

/// Queries `provider` for readings of `sensor_id` in `(now - window, now]`
/// and returns the newest usable one.
///
/// `Ok(None)` means the sensor reported nothing usable in the window; a
/// throttled request surfaces as `Err(ProviderError::RateLimited)`.
pub fn latest_reading<P: PrimaryProvider + ?Sized>(
    provider: &P,
    sensor_id: SensorId,
    now: DateTime<Utc>,
    window_hours: u32,
    limit: u32,
) -> Result<Option<SensorReading>, ProviderError> {
    let from = trailing_window_start(now, window_hours)?;
    let raw = provider.list_readings(sensor_id, from, now, limit)?;
    Ok(select_latest(&raw))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fake::{FakePrimary, raw_reading};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_trailing_window_start() {
        assert_eq!(
            trailing_window_start(fixed_now(), 24).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 30, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_oversized_window_is_invalid_request_without_query() {
        let provider = FakePrimary::new("Primary").with_readings(42, vec![raw_reading(5.0, "2024-05-01T12:00:00Z")]);
        let result = latest_reading(&provider, 42, fixed_now(), u32::MAX, 100);
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
        assert!(provider.reading_calls().is_empty());
    }

    #[test]
    fn test_select_latest_ignores_provider_order() {
        // Ascending order even though descending was requested.
        let raw = vec![
            raw_reading(10.0, "2024-05-01T10:00:00Z"),
            raw_reading(11.0, "2024-05-01T11:00:00Z"),
            raw_reading(12.0, "2024-05-01T12:00:00Z"),
        ];
        let latest = select_latest(&raw).expect("should find a reading");
        assert_eq!(latest.value, 12.0);
        assert_eq!(latest.observed_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_select_latest_compares_instants_not_strings() {
        // 07:30-06:00 is 13:30Z, later than 12:00Z despite sorting lower as text.
        let raw = vec![
            raw_reading(1.0, "2024-05-01T12:00:00Z"),
            raw_reading(2.0, "2024-05-01T07:30:00-06:00"),
        ];
        assert_eq!(select_latest(&raw).unwrap().value, 2.0);
    }

    #[test]
    fn test_entries_without_timestamp_or_value_are_skipped() {
        let raw = vec![
            RawReading { value: Some(99.0), period_end_utc: None },
            RawReading { value: Some(98.0), period_end_utc: Some("garbage".to_string()) },
            RawReading { value: None, period_end_utc: Some("2024-05-01T12:30:00Z".to_string()) },
            raw_reading(-999.0, "2024-05-01T12:45:00Z"),
            raw_reading(14.2, "2024-05-01T09:00:00Z"),
        ];
        let latest = select_latest(&raw).unwrap();
        assert_eq!(latest.value, 14.2);
    }

    #[test]
    fn test_no_usable_entries_is_none() {
        let raw = vec![RawReading { value: Some(5.0), period_end_utc: None }];
        assert_eq!(select_latest(&raw), None);
        assert_eq!(select_latest(&[]), None);
    }

    #[test]
    fn test_equal_timestamps_keep_first_listed() {
        let raw = vec![
            raw_reading(1.0, "2024-05-01T12:00:00Z"),
            raw_reading(2.0, "2024-05-01T12:00:00Z"),
        ];
        assert_eq!(select_latest(&raw).unwrap().value, 1.0);
    }

    #[test]
    fn test_latest_reading_queries_sensor_and_selects_max() {
        let provider = FakePrimary::new("Primary").with_readings(
            42,
            vec![
                raw_reading(30.0, "2024-05-01T12:00:00Z"),
                raw_reading(31.0, "2024-05-01T12:50:00Z"),
            ],
        );
        let latest = latest_reading(&provider, 42, fixed_now(), 24, 100)
            .expect("query should succeed")
            .expect("reading should exist");
        assert_eq!(latest.value, 31.0);
        assert_eq!(provider.reading_calls(), vec![42]);
    }

    #[test]
    fn test_latest_reading_propagates_rate_limit() {
        let provider = FakePrimary::new("Primary").failing_readings(42, ProviderError::RateLimited);
        assert_eq!(
            latest_reading(&provider, 42, fixed_now(), 24, 100),
            Err(ProviderError::RateLimited)
        );
    }
}
