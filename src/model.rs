/// Core data types for the PM2.5 resolution service.
///
/// This module defines the shared domain model imported by all other modules:
/// coordinates, stations, readings, the resolution outcome and the provider
/// error taxonomy. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// OpenAQ / WAQI parameter name for fine particulate matter (≤ 2.5 µm).
pub const PARAM_PM25: &str = "pm25";

/// Separator used between provider identity and station name in source labels.
pub const SOURCE_SEPARATOR: &str = " • ";

/// Provider-side identifier of a single sensor channel.
pub type SensorId = u64;

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting latitudes outside [-90, 90], longitudes
    /// outside [-180, 180] and non-finite values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("latitude out of range: {}", latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("longitude out of range: {}", longitude));
        }
        Ok(Self { latitude, longitude })
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Stations and readings
// ---------------------------------------------------------------------------

/// A candidate monitoring station returned by the locator.
///
/// Built fresh for each resolution call from the primary provider's response.
/// `distance_m` is the provider-reported distance from the query point; when
/// the provider omits it the station is given `f64::INFINITY` so it sorts last.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: u64,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub distance_m: f64,
    pub pm25_sensor_id: Option<SensorId>,
}

/// One timestamped sensor value, already normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// The unit the engine compares and ultimately returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// PM2.5 concentration in µg/m³.
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    /// Provider identity and station name, e.g. `"OpenAQ • Merced"`.
    pub source_label: String,
}

impl Measurement {
    pub fn from_reading(reading: SensorReading, provider: &str, station_name: &str) -> Self {
        Self {
            value: reading.value,
            observed_at: reading.observed_at,
            source_label: source_label(provider, station_name),
        }
    }
}

/// Formats `"<provider> • <station>"`.
pub fn source_label(provider: &str, station_name: &str) -> String {
    format!("{}{}{}", provider, SOURCE_SEPARATOR, station_name)
}

// ---------------------------------------------------------------------------
// Resolution outcome
// ---------------------------------------------------------------------------

/// Result of one resolution call. Exactly one case holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(Measurement),
    /// No primary stations in range and nothing from the fallback provider.
    NoStations,
    /// Stations existed but none had a fresh reading, and the fallback
    /// provider had no PM2.5 either.
    NoFreshData,
    /// The primary provider could not be reached at all and the fallback
    /// provider had nothing to offer.
    ProviderError(String),
}

impl ResolutionOutcome {
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            ResolutionOutcome::Resolved(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }
}

/// Aggregate throttling notice, produced at most once per resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitNotice {
    /// Names of the stations skipped because the primary provider throttled us.
    pub skipped_stations: Vec<String>,
}

impl std::fmt::Display for RateLimitNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "primary provider rate-limited {} station(s): {}",
            self.skipped_stations.len(),
            self.skipped_stations.join(", ")
        )
    }
}

/// Outcome of a resolution call together with its per-call diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub rate_limit: Option<RateLimitNotice>,
    /// Stations returned by the locator (before the cap).
    pub stations_located: usize,
    /// Stations whose latest reading was actually requested.
    pub stations_probed: usize,
    pub used_fallback: bool,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when talking to an air quality provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// HTTP 429: the provider is throttling our key.
    #[error("rate limited by provider")]
    RateLimited,
    /// Any other non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure (DNS, TLS, reset...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The provider answered 2xx but reported an error in the payload.
    #[error("provider reported error: {0}")]
    Api(String),
    /// The request was rejected before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// No API key / token configured for the named provider.
    #[error("missing credential for {0}")]
    MissingCredential(&'static str),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Http(status.as_u16())
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_geo_point_accepts_valid_range() {
        let p = GeoPoint::new(19.4326, -99.1332).expect("Mexico City is a valid point");
        assert_eq!(p.latitude, 19.4326);
        assert_eq!(p.longitude, -99.1332);
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_geo_point_rejects_out_of_range_and_nan() {
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_source_label_joins_provider_and_station() {
        assert_eq!(source_label("OpenAQ", "Merced"), "OpenAQ • Merced");
    }

    #[test]
    fn test_measurement_from_reading_keeps_value_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let m = Measurement::from_reading(
            SensorReading { value: 20.1, observed_at: at },
            "OpenAQ",
            "Camarones",
        );
        assert_eq!(m.value, 20.1);
        assert_eq!(m.observed_at, at);
        assert_eq!(m.source_label, "OpenAQ • Camarones");
    }

    #[test]
    fn test_outcome_measurement_accessor() {
        assert!(ResolutionOutcome::NoStations.measurement().is_none());
        assert!(!ResolutionOutcome::NoFreshData.is_resolved());
    }

    #[test]
    fn test_rate_limit_notice_display_lists_stations() {
        let notice = RateLimitNotice {
            skipped_stations: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(
            notice.to_string(),
            "primary provider rate-limited 2 station(s): A, B"
        );
    }

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::Http(500).to_string(), "HTTP error: 500");
        assert!(ProviderError::Parse("x".into()).to_string().starts_with("Parse error"));
    }
}
