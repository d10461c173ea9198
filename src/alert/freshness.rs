/// Reading freshness detection.
///
/// Stations go offline, lose their uplink, or get decommissioned while still
/// being listed by the provider. A reading from last month must not drive
/// today's outdoor-activity advice, so every candidate reading is aged
/// against a maximum before it can be resolved.
///
/// # Boundary rule
/// Age is compared as an exact duration, not as whole elapsed days:
///   age <= max_age_days × 24h  →  fresh
///   age >  max_age_days × 24h  →  not fresh
/// A reading exactly seven days old passes a 7-day window; one second more
/// does not. Readings stamped in the future (clock skew) count as fresh.
///
/// # Clock injection
/// All `_at` functions accept `now` rather than calling `Utc::now()`, so
/// tests are deterministic.

use chrono::{DateTime, Duration, Utc};

/// Default freshness window, in days.
pub const DEFAULT_MAX_AGE_DAYS: u32 = 7;

/// Parses an ISO 8601 / RFC 3339 timestamp and normalizes it to UTC.
///
/// Accepts a trailing `Z` or an explicit offset. Returns `None` for anything
/// else, including empty strings.
pub fn parse_utc(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Returns `true` if `observed_at` is no older than `max_age_days` at `now`.
pub fn is_within_max_age(observed_at: DateTime<Utc>, max_age_days: u32, now: DateTime<Utc>) -> bool {
    now - observed_at <= Duration::days(i64::from(max_age_days))
}

/// Returns `true` if the timestamp string parses and is fresh at `now`.
/// Malformed timestamps fail closed.
pub fn is_fresh_at(observed_at_utc: &str, max_age_days: u32, now: DateTime<Utc>) -> bool {
    parse_utc(observed_at_utc)
        .map(|observed_at| is_within_max_age(observed_at, max_age_days, now))
        .unwrap_or(false)
}

/// Convenience wrapper that uses the real current time.
/// Use `is_fresh_at` in tests to keep them deterministic.
pub fn is_fresh(observed_at_utc: &str, max_age_days: u32) -> bool {
    is_fresh_at(observed_at_utc, max_age_days, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
