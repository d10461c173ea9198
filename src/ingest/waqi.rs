/// WAQI (World Air Quality Index) API client (secondary provider)
///
/// Point-based: the geo feed returns the single station closest to the query
/// coordinates, with its individual pollutant readings under `iaqi`.
///
/// API Documentation: https://aqicn.org/json-api/doc/
/// Geo feed: GET /feed/geo:{lat};{lon}/?token={token}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{NearestReading, SecondaryProvider, build_http_client, read_body};
use crate::model::{GeoPoint, PARAM_PM25, ProviderError, SensorReading};

pub const WAQI_BASE_URL: &str = "https://api.waqi.info";

const PROVIDER_NAME: &str = "WAQI";

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level envelope. `data` is an object on success and a bare string
/// ("Invalid key", "Unknown station") on error, so it is kept untyped here.
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    /// Overall AQI; a number, or "-" when the station has no current data.
    #[serde(default)]
    aqi: Value,
    city: Option<FeedCity>,
    time: Option<FeedTime>,
    #[serde(default)]
    iaqi: std::collections::HashMap<String, FeedValue>,
}

#[derive(Debug, Deserialize)]
struct FeedCity {
    name: Option<String>,
    #[serde(default)]
    geo: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct FeedTime {
    iso: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedValue {
    #[serde(default)]
    v: Value,
}

// ============================================================================
// URL construction and parsing
// ============================================================================

/// Builds the geo feed URL. The token travels in the query string.
pub fn build_feed_url(base_url: &str, point: GeoPoint, token: &str) -> String {
    format!(
        "{}/feed/geo:{};{}/?token={}",
        base_url.trim_end_matches('/'),
        point.latitude,
        point.longitude,
        token
    )
}

/// Parses a geo feed body.
///
/// Returns `Ok(None)` when the provider has no current data for the
/// location (`aqi` is "-", or status other than "ok"/"error"), and
/// `Err(ProviderError::Api)` when it explicitly reports an error.
pub fn parse_feed_response(body: &str, point: GeoPoint) -> Result<Option<NearestReading>, ProviderError> {
    let envelope: FeedEnvelope = serde_json::from_str(body)?;

    match envelope.status.as_str() {
        "ok" => {}
        "error" => {
            let detail = envelope
                .data
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| envelope.data.to_string());
            return Err(ProviderError::Api(detail));
        }
        // "nug" and friends: unknown station / nothing here
        _ => return Ok(None),
    }

    if envelope.data.is_null() {
        return Ok(None);
    }

    let data: FeedData = serde_json::from_value(envelope.data)?;

    if data.aqi.as_str() == Some("-") || data.aqi.is_null() {
        return Ok(None);
    }

    let station_name = data
        .city
        .as_ref()
        .and_then(|c| c.name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Location {}, {}", point.latitude, point.longitude));

    let coordinates = data.city.as_ref().and_then(|c| match c.geo.as_slice() {
        [lat, lon, ..] => GeoPoint::new(*lat, *lon).ok(),
        _ => None,
    });

    let observed_at = data
        .time
        .and_then(|t| t.iso)
        .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
        .map(|dt| dt.with_timezone(&Utc));

    // A value without a timestamp cannot be compared or aged, so drop it.
    let pm25 = match (data.iaqi.get(PARAM_PM25).and_then(|p| p.v.as_f64()), observed_at) {
        (Some(value), Some(observed_at)) if value.is_finite() && value >= 0.0 => {
            Some(SensorReading { value, observed_at })
        }
        _ => None,
    };

    Ok(Some(NearestReading {
        station_name,
        coordinates,
        pm25,
    }))
}

// ============================================================================
// Client
// ============================================================================

/// Blocking WAQI client.
pub struct WaqiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl WaqiClient {
    pub fn new(base_url: &str, token: Option<&str>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::MissingCredential(PROVIDER_NAME))?;

        Ok(Self {
            client: build_http_client(timeout_secs)?,
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }
}

impl SecondaryProvider for WaqiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn nearest_reading(&self, point: GeoPoint) -> Result<Option<NearestReading>, ProviderError> {
        let url = build_feed_url(&self.base_url, point, &self.token);
        let response = self.client.get(&url).send()?;
        let body = read_body(response)?;
        parse_feed_response(&body, point)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn guayaquil() -> GeoPoint {
        GeoPoint::new(-2.1894, -79.8891).unwrap()
    }

    #[test]
    fn test_parse_feed_with_pm25_converts_time_to_utc() {
        let body = r#"{
            "status": "ok",
            "data": {
                "aqi": 57,
                "idx": 8590,
                "city": {"geo": [-2.17, -79.92], "name": "Guayaquil Centro, Ecuador"},
                "dominentpol": "pm25",
                "iaqi": {"pm25": {"v": 57}, "t": {"v": 29.5}},
                "time": {"s": "2024-05-01 08:00:00", "tz": "-05:00", "iso": "2024-05-01T08:00:00-05:00"}
            }
        }"#;
        let reading = parse_feed_response(body, guayaquil())
            .expect("fixture should parse")
            .expect("station should be present");

        assert_eq!(reading.station_name, "Guayaquil Centro, Ecuador");
        let pm25 = reading.pm25.expect("pm25 should be present");
        assert_eq!(pm25.value, 57.0);
        assert_eq!(pm25.observed_at, Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());
        assert!(reading.coordinates.is_some());
    }

    #[test]
    fn test_parse_feed_without_pm25_keeps_station() {
        let body = r#"{
            "status": "ok",
            "data": {
                "aqi": 21,
                "city": {"geo": [-2.17, -79.92], "name": "Guayaquil Norte"},
                "iaqi": {"o3": {"v": 21}},
                "time": {"iso": "2024-05-01T08:00:00-05:00"}
            }
        }"#;
        let reading = parse_feed_response(body, guayaquil()).unwrap().unwrap();
        assert_eq!(reading.station_name, "Guayaquil Norte");
        assert!(reading.pm25.is_none());
    }

    #[test]
    fn test_parse_feed_dash_aqi_means_no_data() {
        let body = r#"{"status": "ok", "data": {"aqi": "-", "iaqi": {}, "city": {"name": "X"}}}"#;
        assert_eq!(parse_feed_response(body, guayaquil()).unwrap(), None);
    }

    #[test]
    fn test_parse_feed_error_status_is_api_error() {
        let body = r#"{"status": "error", "data": "Invalid key"}"#;
        assert_eq!(
            parse_feed_response(body, guayaquil()),
            Err(ProviderError::Api("Invalid key".to_string()))
        );
    }

    #[test]
    fn test_parse_feed_unknown_station_is_empty() {
        let body = r#"{"status": "nug", "data": null}"#;
        assert_eq!(parse_feed_response(body, guayaquil()).unwrap(), None);
    }

    #[test]
    fn test_parse_feed_unparseable_time_drops_pm25() {
        let body = r#"{
            "status": "ok",
            "data": {"aqi": 40, "city": {"name": "Somewhere"}, "iaqi": {"pm25": {"v": 40}}, "time": {"iso": "yesterday"}}
        }"#;
        let reading = parse_feed_response(body, guayaquil()).unwrap().unwrap();
        assert!(reading.pm25.is_none());
    }

    #[test]
    fn test_parse_feed_missing_city_name_uses_coordinates() {
        let body = r#"{
            "status": "ok",
            "data": {"aqi": 40, "iaqi": {"pm25": {"v": 40}}, "time": {"iso": "2024-05-01T13:00:00Z"}}
        }"#;
        let reading = parse_feed_response(body, guayaquil()).unwrap().unwrap();
        assert_eq!(reading.station_name, "Location -2.1894, -79.8891");
    }

    #[test]
    fn test_build_feed_url_embeds_token() {
        let url = build_feed_url("https://api.waqi.info/", guayaquil(), "demo");
        assert_eq!(url, "https://api.waqi.info/feed/geo:-2.1894;-79.8891/?token=demo");
    }

    #[test]
    fn test_client_requires_token() {
        assert!(matches!(
            WaqiClient::new(WAQI_BASE_URL, None, 10),
            Err(ProviderError::MissingCredential("WAQI"))
        ));
    }
}
