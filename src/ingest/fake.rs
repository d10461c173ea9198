//! In-memory providers.
//!
//! Serve canned station lists and readings without touching the network, and
//! count the calls made against them. Used by the engine and verification
//! tests, and handy for demos when no API credentials are at hand.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{NearestReading, PrimaryProvider, RawReading, SecondaryProvider, SensorRecord, StationRecord};
use crate::model::{GeoPoint, PARAM_PM25, ProviderError, SensorId, SensorReading};

/// Builds a station record with an optional PM2.5 sensor.
pub fn station_record(id: u64, name: &str, distance_m: f64, pm25_sensor: Option<SensorId>) -> StationRecord {
    let mut sensors = vec![SensorRecord {
        id: id * 100 + 1,
        parameter: "o3".to_string(),
    }];
    if let Some(sensor_id) = pm25_sensor {
        sensors.push(SensorRecord {
            id: sensor_id,
            parameter: PARAM_PM25.to_string(),
        });
    }
    StationRecord {
        id,
        name: Some(name.to_string()),
        coordinates: None,
        sensors,
        distance_m: Some(distance_m),
    }
}

/// Builds a raw reading entry with a value and period-end timestamp.
pub fn raw_reading(value: f64, period_end_utc: &str) -> RawReading {
    RawReading {
        value: Some(value),
        period_end_utc: Some(period_end_utc.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

/// One `list_readings` call as the fake received it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingRequest {
    pub sensor_id: SensorId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: u32,
}

pub struct FakePrimary {
    name: String,
    stations: Result<Vec<StationRecord>, ProviderError>,
    readings: HashMap<SensorId, Result<Vec<RawReading>, ProviderError>>,
    max_radius_m: Option<u32>,
    station_calls: Cell<usize>,
    last_radius_m: Cell<Option<u32>>,
    reading_requests: RefCell<Vec<ReadingRequest>>,
}

impl FakePrimary {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stations: Ok(Vec::new()),
            readings: HashMap::new(),
            max_radius_m: None,
            station_calls: Cell::new(0),
            last_radius_m: Cell::new(None),
            reading_requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_stations(mut self, stations: Vec<StationRecord>) -> Self {
        self.stations = Ok(stations);
        self
    }

    pub fn failing_locate(mut self, err: ProviderError) -> Self {
        self.stations = Err(err);
        self
    }

    pub fn with_readings(mut self, sensor_id: SensorId, readings: Vec<RawReading>) -> Self {
        self.readings.insert(sensor_id, Ok(readings));
        self
    }

    pub fn failing_readings(mut self, sensor_id: SensorId, err: ProviderError) -> Self {
        self.readings.insert(sensor_id, Err(err));
        self
    }

    pub fn with_max_radius_m(mut self, max_radius_m: u32) -> Self {
        self.max_radius_m = Some(max_radius_m);
        self
    }

    pub fn station_calls(&self) -> usize {
        self.station_calls.get()
    }

    pub fn last_radius_m(&self) -> Option<u32> {
        self.last_radius_m.get()
    }

    /// Sensor ids queried, in call order.
    pub fn reading_calls(&self) -> Vec<SensorId> {
        self.reading_requests.borrow().iter().map(|r| r.sensor_id).collect()
    }

    /// Full `list_readings` arguments, in call order.
    pub fn reading_requests(&self) -> Vec<ReadingRequest> {
        self.reading_requests.borrow().clone()
    }
}

impl PrimaryProvider for FakePrimary {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_radius_m(&self) -> Option<u32> {
        self.max_radius_m
    }

    fn list_stations(
        &self,
        _point: GeoPoint,
        radius_m: u32,
        limit: u32,
    ) -> Result<Vec<StationRecord>, ProviderError> {
        self.station_calls.set(self.station_calls.get() + 1);
        self.last_radius_m.set(Some(radius_m));
        self.stations
            .clone()
            .map(|s| s.into_iter().take(limit as usize).collect())
    }

    fn list_readings(
        &self,
        sensor_id: SensorId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RawReading>, ProviderError> {
        self.reading_requests.borrow_mut().push(ReadingRequest {
            sensor_id,
            from,
            to,
            limit,
        });
        match self.readings.get(&sensor_id) {
            Some(Ok(readings)) => Ok(readings.iter().take(limit as usize).cloned().collect()),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Secondary
// ---------------------------------------------------------------------------

pub struct FakeSecondary {
    name: String,
    result: Result<Option<NearestReading>, ProviderError>,
    calls: Cell<usize>,
}

impl FakeSecondary {
    /// A secondary provider with nothing for any location.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(None),
            calls: Cell::new(0),
        }
    }

    /// A secondary provider whose nearest station reports PM2.5.
    pub fn with_pm25(name: &str, station_name: &str, value: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(Some(NearestReading {
                station_name: station_name.to_string(),
                coordinates: None,
                pm25: Some(SensorReading { value, observed_at }),
            })),
            calls: Cell::new(0),
        }
    }

    /// A secondary provider whose nearest station reports no PM2.5.
    pub fn without_pm25(name: &str, station_name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(Some(NearestReading {
                station_name: station_name.to_string(),
                coordinates: None,
                pm25: None,
            })),
            calls: Cell::new(0),
        }
    }

    pub fn failing(name: &str, err: ProviderError) -> Self {
        Self {
            name: name.to_string(),
            result: Err(err),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl SecondaryProvider for FakeSecondary {
    fn name(&self) -> &str {
        &self.name
    }

    fn nearest_reading(&self, _point: GeoPoint) -> Result<Option<NearestReading>, ProviderError> {
        self.calls.set(self.calls.get() + 1);
        self.result.clone()
    }
}
