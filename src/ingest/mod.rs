/// Provider adapters.
///
/// Each provider sits behind a small trait so the resolution engine can be
/// driven by the real HTTP clients or by in-memory fakes in tests.
///
/// Submodules:
/// - `openaq`: primary provider, multi-station, sensor-level readings.
/// - `waqi`: secondary provider, point-based nearest-station feed.
/// - `fake`: in-memory providers for tests and offline runs.

pub mod fake;
pub mod openaq;
pub mod waqi;

use chrono::{DateTime, Utc};

use crate::model::{GeoPoint, ProviderError, SensorId};

// ---------------------------------------------------------------------------
// Primary provider records
// ---------------------------------------------------------------------------

/// One sensor channel attached to a station, as listed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub id: SensorId,
    /// Provider parameter name, e.g. "pm25", "o3".
    pub parameter: String,
}

/// A monitoring location as listed by the primary provider, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub id: u64,
    pub name: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub sensors: Vec<SensorRecord>,
    /// Distance from the query point in meters, if the provider reported one.
    pub distance_m: Option<f64>,
}

/// A raw reading entry. Either field may be missing or malformed; the
/// `readings` module decides what is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub value: Option<f64>,
    /// End of the averaging period, as the provider wrote it.
    pub period_end_utc: Option<String>,
}

/// The multi-station provider consulted first.
pub trait PrimaryProvider {
    /// Provider identity used in source labels, e.g. "OpenAQ".
    fn name(&self) -> &str;

    /// Largest search radius the provider accepts, if it enforces one.
    fn max_radius_m(&self) -> Option<u32> {
        None
    }

    /// Lists monitoring locations within `radius_m` of `point`.
    fn list_stations(
        &self,
        point: GeoPoint,
        radius_m: u32,
        limit: u32,
    ) -> Result<Vec<StationRecord>, ProviderError>;

    /// Lists readings for a sensor observed in `(from, to]`.
    ///
    /// Implementations may request a descending order from the provider, but
    /// callers must not rely on the order of the returned entries.
    fn list_readings(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RawReading>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Secondary provider records
// ---------------------------------------------------------------------------

/// The nearest station's current conditions from the point-based provider.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestReading {
    pub station_name: String,
    pub coordinates: Option<GeoPoint>,
    /// PM2.5 value and its UTC observation time, if the station reports it.
    pub pm25: Option<crate::model::SensorReading>,
}

/// The point-based fallback provider.
pub trait SecondaryProvider {
    fn name(&self) -> &str;

    /// Returns the reading of the single station closest to `point`, or
    /// `Ok(None)` when the provider has nothing for that location.
    fn nearest_reading(&self, point: GeoPoint) -> Result<Option<NearestReading>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

/// Builds a blocking client with a bounded per-request timeout.
pub fn build_http_client(
    timeout_secs: u64,
) -> Result<reqwest::blocking::Client, ProviderError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("aqmon_service/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::from)
}

/// Reads a response body, mapping 429 to `RateLimited` and any other
/// non-2xx status to `Http`.
pub(crate) fn read_body(response: reqwest::blocking::Response) -> Result<String, ProviderError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }
    if !status.is_success() {
        return Err(ProviderError::Http(status.as_u16()));
    }
    Ok(response.text()?)
}
