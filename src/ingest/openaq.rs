/// OpenAQ v3 API client (primary provider)
///
/// Lists monitoring locations around a point and pulls recent measurements
/// for individual sensors.
///
/// API Documentation: https://docs.openaq.org/
/// Locations:    GET /v3/locations?coordinates={lat},{lon}&radius={m}
/// Measurements: GET /v3/sensors/{id}/measurements

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{PrimaryProvider, RawReading, SensorRecord, StationRecord, build_http_client, read_body};
use crate::model::{GeoPoint, ProviderError, SensorId};

pub const OPENAQ_BASE_URL: &str = "https://api.openaq.org/v3";

/// Largest search radius the locations endpoint accepts, in meters.
pub const MAX_RADIUS_M: u32 = 25_000;

const PROVIDER_NAME: &str = "OpenAQ";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    results: Vec<ApiLocation>,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    id: u64,
    name: Option<String>,
    coordinates: Option<ApiCoordinates>,
    #[serde(default)]
    sensors: Vec<ApiSensor>,
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiSensor {
    id: u64,
    parameter: Option<ApiParameter>,
}

#[derive(Debug, Deserialize)]
struct ApiParameter {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeasurementsResponse {
    #[serde(default)]
    results: Vec<ApiMeasurement>,
}

#[derive(Debug, Deserialize)]
struct ApiMeasurement {
    value: Option<f64>,
    period: Option<ApiPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPeriod {
    datetime_to: Option<ApiDatetime>,
}

#[derive(Debug, Deserialize)]
struct ApiDatetime {
    utc: Option<String>,
}

// ============================================================================
// URL construction
// ============================================================================

/// Builds the locations search URL. `radius_m` is passed through unchanged;
/// range checks happen in the locator before we get here.
pub fn build_locations_url(base_url: &str, point: GeoPoint, radius_m: u32, limit: u32) -> String {
    format!(
        "{}/locations?coordinates={},{}&radius={}&limit={}",
        base_url.trim_end_matches('/'),
        point.latitude,
        point.longitude,
        radius_m,
        limit
    )
}

/// Builds the sensor measurements URL for the window `(from, to]`.
///
/// Timestamps are written with a literal `Z` so no `+` needs escaping in the
/// query string. The `order_by`/`sort` pair is advisory only.
pub fn build_measurements_url(
    base_url: &str,
    sensor_id: SensorId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: u32,
) -> String {
    format!(
        "{}/sensors/{}/measurements?datetime_from={}&datetime_to={}&limit={}&page=1&order_by=datetime&sort=desc",
        base_url.trim_end_matches('/'),
        sensor_id,
        from.format("%Y-%m-%dT%H:%M:%SZ"),
        to.format("%Y-%m-%dT%H:%M:%SZ"),
        limit
    )
}

// ============================================================================
// Response parsing
// ============================================================================

/// Parses a `/locations` response body into station records.
pub fn parse_locations_response(body: &str) -> Result<Vec<StationRecord>, ProviderError> {
    let response: LocationsResponse = serde_json::from_str(body)?;

    Ok(response
        .results
        .into_iter()
        .map(|loc| StationRecord {
            id: loc.id,
            name: loc.name,
            coordinates: loc
                .coordinates
                .and_then(|c| match (c.latitude, c.longitude) {
                    (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).ok(),
                    _ => None,
                }),
            sensors: loc
                .sensors
                .into_iter()
                .filter_map(|s| {
                    let parameter = s.parameter.and_then(|p| p.name)?;
                    Some(SensorRecord { id: s.id, parameter })
                })
                .collect(),
            distance_m: loc.distance,
        })
        .collect())
}

/// Parses a `/sensors/{id}/measurements` response body.
pub fn parse_measurements_response(body: &str) -> Result<Vec<RawReading>, ProviderError> {
    let response: MeasurementsResponse = serde_json::from_str(body)?;

    Ok(response
        .results
        .into_iter()
        .map(|m| RawReading {
            value: m.value,
            period_end_utc: m.period.and_then(|p| p.datetime_to).and_then(|d| d.utc),
        })
        .collect())
}

// ============================================================================
// Client
// ============================================================================

/// Blocking OpenAQ client. Authenticates with a static `X-API-Key` header.
pub struct OpenAqClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenAqClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingCredential(PROVIDER_NAME))?;

        Ok(Self {
            client: build_http_client(timeout_secs)?,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn get(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()?;

        read_body(response)
    }
}

impl PrimaryProvider for OpenAqClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn max_radius_m(&self) -> Option<u32> {
        Some(MAX_RADIUS_M)
    }

    fn list_stations(
        &self,
        point: GeoPoint,
        radius_m: u32,
        limit: u32,
    ) -> Result<Vec<StationRecord>, ProviderError> {
        let url = build_locations_url(&self.base_url, point, radius_m, limit);
        let body = self.get(&url)?;
        parse_locations_response(&body)
    }

    fn list_readings(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RawReading>, ProviderError> {
        let url = build_measurements_url(&self.base_url, sensor_id, from, to, limit);
        let body = self.get(&url)?;
        parse_measurements_response(&body)
    }
}

// ============================================================================
// Tests
// ============================================================================
