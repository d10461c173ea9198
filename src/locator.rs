/// Station discovery around a query point.
///
/// Asks the primary provider for every monitoring location within the search
/// radius, keeps the ones that expose a PM2.5 sensor, and orders them
/// nearest-first by the distance the provider reported. Distances are never
/// recomputed locally.

use crate::ingest::{PrimaryProvider, StationRecord};
use crate::model::{GeoPoint, PARAM_PM25, ProviderError, SensorId, Station};

/// Default search radius, in kilometers.
pub const DEFAULT_RADIUS_KM: f64 = 15.0;

/// Default number of locations requested from the provider.
pub const DEFAULT_SEARCH_LIMIT: u32 = 100;

/// Name given to stations the provider lists without one.
pub const UNKNOWN_STATION_NAME: &str = "Unknown station";

/// Converts a kilometer radius to the provider's meter unit, rejecting
/// non-positive, non-finite and over-limit values.
pub fn radius_to_meters(radius_km: f64, max_radius_m: Option<u32>) -> Result<u32, ProviderError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(ProviderError::InvalidRequest(format!(
            "search radius must be positive, got {} km",
            radius_km
        )));
    }

    let meters = (radius_km * 1000.0).round();
    let limit = f64::from(max_radius_m.unwrap_or(u32::MAX));
    if meters > limit {
        return Err(ProviderError::InvalidRequest(format!(
            "search radius {} km exceeds provider limit of {} m",
            radius_km, limit
        )));
    }

    // A sub-meter radius rounds to zero; ask for at least one meter.
    Ok((meters as u32).max(1))
}

/// Returns the id of the first PM2.5 sensor listed for a location.
pub fn pm25_sensor_id(record: &StationRecord) -> Option<SensorId> {
    record
        .sensors
        .iter()
        .find(|s| s.parameter.eq_ignore_ascii_case(PARAM_PM25))
        .map(|s| s.id)
}

/// Finds PM2.5-capable stations within `radius_km` of `point`, nearest first.
///
/// Ties in distance keep the provider's response order. An empty result
/// means the provider answered but listed nothing usable in range.
pub fn locate<P: PrimaryProvider + ?Sized>(
    provider: &P,
    point: GeoPoint,
    radius_km: f64,
    search_limit: u32,
) -> Result<Vec<Station>, ProviderError> {
    let radius_m = radius_to_meters(radius_km, provider.max_radius_m())?;
    let records = provider.list_stations(point, radius_m, search_limit)?;

    let mut stations: Vec<Station> = records
        .into_iter()
        .filter_map(|record| {
            let sensor_id = pm25_sensor_id(&record)?;
            Some(Station {
                id: record.id,
                name: record
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_STATION_NAME.to_string()),
                location: record.coordinates,
                distance_m: record
                    .distance_m
                    .filter(|d| d.is_finite())
                    .map(|d| d.max(0.0))
                    .unwrap_or(f64::INFINITY),
                pm25_sensor_id: Some(sensor_id),
            })
        })
        .collect();

    // `sort_by` is stable, so equal distances keep provider order.
    stations.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    Ok(stations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fake::{FakePrimary, station_record};

    fn cdmx() -> GeoPoint {
        GeoPoint::new(19.4326, -99.1332).unwrap()
    }

    #[test]
    fn test_stations_sorted_ascending_by_distance() {
        let provider = FakePrimary::new("Primary").with_stations(vec![
            station_record(1, "Far", 12_000.0, Some(11)),
            station_record(2, "Near", 3_000.0, Some(21)),
            station_record(3, "Middle", 7_500.0, Some(31)),
        ]);

        let stations = locate(&provider, cdmx(), 15.0, 100).expect("locate should succeed");
        let names: Vec<_> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Middle", "Far"]);
        assert!(stations.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));
    }

    #[test]
    fn test_equal_distances_keep_provider_order() {
        let provider = FakePrimary::new("Primary").with_stations(vec![
            station_record(1, "First", 5_000.0, Some(11)),
            station_record(2, "Closer", 1_000.0, Some(21)),
            station_record(3, "Second", 5_000.0, Some(31)),
        ]);

        let stations = locate(&provider, cdmx(), 15.0, 100).unwrap();
        let names: Vec<_> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Closer", "First", "Second"]);
    }

    #[test]
    fn test_stations_without_pm25_sensor_are_dropped() {
        let provider = FakePrimary::new("Primary").with_stations(vec![
            station_record(1, "Ozone only", 1_000.0, None),
            station_record(2, "Has PM2.5", 2_000.0, Some(21)),
        ]);

        let stations = locate(&provider, cdmx(), 15.0, 100).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Has PM2.5");
        assert_eq!(stations[0].pm25_sensor_id, Some(21));
    }

    #[test]
    fn test_missing_distance_sorts_last_and_missing_name_is_defaulted() {
        let mut unnamed = station_record(1, "", 0.0, Some(11));
        unnamed.name = None;
        unnamed.distance_m = None;
        let provider = FakePrimary::new("Primary")
            .with_stations(vec![unnamed, station_record(2, "Known", 9_000.0, Some(21))]);

        let stations = locate(&provider, cdmx(), 15.0, 100).unwrap();
        assert_eq!(stations[0].name, "Known");
        assert_eq!(stations[1].name, UNKNOWN_STATION_NAME);
        assert!(stations[1].distance_m.is_infinite());
    }

    #[test]
    fn test_empty_listing_is_ok_not_error() {
        let provider = FakePrimary::new("Primary");
        let stations = locate(&provider, cdmx(), 15.0, 100).expect("empty is a valid answer");
        assert!(stations.is_empty());
    }

    #[test]
    fn test_provider_failure_propagates() {
        let provider = FakePrimary::new("Primary").failing_locate(ProviderError::Http(503));
        assert_eq!(locate(&provider, cdmx(), 15.0, 100), Err(ProviderError::Http(503)));
    }

    #[test]
    fn test_radius_is_converted_to_meters_at_provider_boundary() {
        let provider = FakePrimary::new("Primary");
        locate(&provider, cdmx(), 2.5, 100).unwrap();
        assert_eq!(provider.last_radius_m(), Some(2_500));
    }

    #[test]
    fn test_invalid_radius_rejected_before_request() {
        let provider = FakePrimary::new("Primary").with_max_radius_m(25_000);
        assert!(matches!(
            locate(&provider, cdmx(), 0.0, 100),
            Err(ProviderError::InvalidRequest(_))
        ));
        assert!(matches!(
            locate(&provider, cdmx(), f64::NAN, 100),
            Err(ProviderError::InvalidRequest(_))
        ));
        assert!(matches!(
            locate(&provider, cdmx(), 30.0, 100),
            Err(ProviderError::InvalidRequest(_))
        ));
        assert_eq!(provider.station_calls(), 0);
    }

    #[test]
    fn test_radius_to_meters_rounds() {
        assert_eq!(radius_to_meters(15.0, Some(25_000)), Ok(15_000));
        assert_eq!(radius_to_meters(0.0004, None), Ok(1));
        assert_eq!(radius_to_meters(25.0, Some(25_000)), Ok(25_000));
    }
}
