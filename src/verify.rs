//! Provider Verification Module
//!
//! Checks the configured providers against their live APIs at a reference
//! point, to tell whether each one answers, how much it has around that
//! point, and whether PM2.5 is actually available.
//!
//! Use this after rotating credentials or changing base URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::ingest::openaq::OpenAqClient;
use crate::ingest::waqi::WaqiClient;
use crate::ingest::{PrimaryProvider, SecondaryProvider};
use crate::locator::{self, pm25_sensor_id};
use crate::model::{GeoPoint, ProviderError};
use crate::readings::{select_latest, trailing_window_start};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub primary: PrimaryVerification,
    pub secondary: SecondaryVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryVerification {
    pub provider: String,
    pub status: VerificationStatus,
    pub api_responsive: bool,
    pub stations_found: usize,
    pub stations_with_pm25: usize,
    pub sample_station: Option<String>,
    pub sample_data_count: usize,
    pub latest_reading_utc: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryVerification {
    pub provider: String,
    pub status: VerificationStatus,
    pub api_responsive: bool,
    pub station_name: Option<String>,
    pub pm25_available: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl PrimaryVerification {
    fn failed(provider: &str, err: &ProviderError) -> Self {
        Self {
            provider: provider.to_string(),
            status: VerificationStatus::Failed,
            api_responsive: false,
            stations_found: 0,
            stations_with_pm25: 0,
            sample_station: None,
            sample_data_count: 0,
            latest_reading_utc: None,
            error_message: Some(err.to_string()),
        }
    }
}

impl SecondaryVerification {
    fn failed(provider: &str, err: &ProviderError) -> Self {
        Self {
            provider: provider.to_string(),
            status: VerificationStatus::Failed,
            api_responsive: false,
            station_name: None,
            pm25_available: false,
            error_message: Some(err.to_string()),
        }
    }
}

// ============================================================================
// Primary Verification
// ============================================================================

pub fn verify_primary<P: PrimaryProvider + ?Sized>(
    provider: &P,
    point: GeoPoint,
    radius_km: f64,
    window_hours: u32,
    now: DateTime<Utc>,
) -> PrimaryVerification {
    let mut result = PrimaryVerification {
        provider: provider.name().to_string(),
        status: VerificationStatus::Failed,
        api_responsive: false,
        stations_found: 0,
        stations_with_pm25: 0,
        sample_station: None,
        sample_data_count: 0,
        latest_reading_utc: None,
        error_message: None,
    };

    // Test 1: list stations around the point
    let records = match locator::radius_to_meters(radius_km, provider.max_radius_m())
        .and_then(|radius_m| provider.list_stations(point, radius_m, locator::DEFAULT_SEARCH_LIMIT))
    {
        Ok(records) => records,
        Err(e) => {
            result.error_message = Some(format!("Station listing failed: {}", e));
            return result;
        }
    };

    result.api_responsive = true;
    result.stations_found = records.len();

    let mut pm25_stations: Vec<_> = records
        .iter()
        .filter_map(|r| pm25_sensor_id(r).map(|id| (r, id)))
        .collect();
    result.stations_with_pm25 = pm25_stations.len();
    pm25_stations.sort_by(|a, b| {
        let da = a.0.distance_m.unwrap_or(f64::INFINITY);
        let db = b.0.distance_m.unwrap_or(f64::INFINITY);
        da.total_cmp(&db)
    });

    // Test 2: sample readings from the nearest PM2.5 sensor
    if let Some((record, sensor_id)) = pm25_stations.first() {
        result.sample_station = record.name.clone();
        let sample = trailing_window_start(now, window_hours)
            .and_then(|from| provider.list_readings(*sensor_id, from, now, 100));
        match sample {
            Ok(raw) => {
                result.sample_data_count = raw.len();
                result.latest_reading_utc = select_latest(&raw).map(|r| r.observed_at.to_rfc3339());
            }
            Err(e) => {
                result.error_message = Some(format!("Reading sample failed: {}", e));
            }
        }
    } else {
        result.error_message = Some("No PM2.5 stations in range".to_string());
    }

    result.status = if result.stations_with_pm25 > 0 && result.latest_reading_utc.is_some() {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };

    result
}

// ============================================================================
// Secondary Verification
// ============================================================================

pub fn verify_secondary<S: SecondaryProvider + ?Sized>(provider: &S, point: GeoPoint) -> SecondaryVerification {
    let mut result = SecondaryVerification {
        provider: provider.name().to_string(),
        status: VerificationStatus::Failed,
        api_responsive: false,
        station_name: None,
        pm25_available: false,
        error_message: None,
    };

    match provider.nearest_reading(point) {
        Ok(Some(nearest)) => {
            result.api_responsive = true;
            result.station_name = Some(nearest.station_name);
            result.pm25_available = nearest.pm25.is_some();
            result.status = if result.pm25_available {
                VerificationStatus::Success
            } else {
                VerificationStatus::PartialSuccess
            };
        }
        Ok(None) => {
            result.api_responsive = true;
            result.status = VerificationStatus::PartialSuccess;
            result.error_message = Some("No station data for this location".to_string());
        }
        Err(e) => {
            result.error_message = Some(format!("API request failed: {}", e));
        }
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_full_verification(
    config: &ServiceConfig,
    point: GeoPoint,
) -> Result<VerificationReport, Box<dyn std::error::Error>> {
    config.validate()?;
    let radius_km = config.resolution.default_radius_km;
    let now = Utc::now();

    println!("🔍 Verifying primary provider...");
    let primary = match OpenAqClient::new(
        &config.primary.base_url,
        config.primary.api_key.as_deref(),
        config.primary.timeout_secs,
    ) {
        Ok(client) => verify_primary(&client, point, radius_km, config.resolution.window_hours, now),
        Err(e) => PrimaryVerification::failed("OpenAQ", &e),
    };

    println!("🔍 Verifying secondary provider...");
    let secondary = match WaqiClient::new(
        &config.secondary.base_url,
        config.secondary.token.as_deref(),
        config.secondary.timeout_secs,
    ) {
        Ok(client) => verify_secondary(&client, point),
        Err(e) => SecondaryVerification::failed("WAQI", &e),
    };

    Ok(VerificationReport {
        timestamp: now.to_rfc3339(),
        latitude: point.latitude,
        longitude: point.longitude,
        radius_km,
        primary,
        secondary,
    })
}

fn status_mark(status: &VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Success => "✓ OK",
        VerificationStatus::PartialSuccess => "⚠ Partial",
        VerificationStatus::Failed => "✗ FAILED",
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY ({:.4}, {:.4}, {} km)", report.latitude, report.longitude, report.radius_km);
    println!("═══════════════════════════════════════════════════════════");
    println!();

    let p = &report.primary;
    println!("{} ({})", p.provider, status_mark(&p.status));
    println!("  Stations:   {} found, {} with PM2.5", p.stations_found, p.stations_with_pm25);
    if let Some(station) = &p.sample_station {
        println!("  Sample:     {} ({} readings)", station, p.sample_data_count);
    }
    if let Some(latest) = &p.latest_reading_utc {
        println!("  Latest:     {}", latest);
    }
    if let Some(error) = &p.error_message {
        println!("  Error:      {}", error);
    }
    println!();

    let s = &report.secondary;
    println!("{} ({})", s.provider, status_mark(&s.status));
    if let Some(station) = &s.station_name {
        println!("  Nearest:    {}", station);
    }
    println!("  PM2.5:      {}", if s.pm25_available { "Available" } else { "Not available" });
    if let Some(error) = &s.error_message {
        println!("  Error:      {}", error);
    }
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
