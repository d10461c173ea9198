//! PM2.5 resolution engine.
//!
//! One call runs, in order:
//!
//! 1. **Locate** PM2.5 stations around the point (primary provider).
//! 2. **Cap** the nearest-first list to `max_stations_to_query`.
//! 3. **Probe** each capped station sequentially for its latest reading,
//!    keeping only fresh ones. Throttled stations are skipped and tallied.
//! 4. **Select** the most recent fresh reading across all probed stations.
//!    Recency beats proximity.
//! 5. **Fallback** to the secondary provider when the primary path produced
//!    nothing (no stations, nothing fresh, or the locate call failed).
//!
//! Nothing is retried and nothing persists between calls. Stations are probed
//! one after another so a per-key rate limit is not hammered by a burst.

use chrono::{DateTime, Utc};

use crate::alert::freshness::is_within_max_age;
use crate::config::ResolutionSettings;
use crate::ingest::{PrimaryProvider, SecondaryProvider};
use crate::locator;
use crate::logging::{self, DataSource};
use crate::model::{
    GeoPoint, Measurement, ProviderError, RateLimitNotice, Resolution, ResolutionOutcome, Station,
};
use crate::readings;

/// What the primary path left behind for the fallback step to reason about.
enum PrimaryExhaustion {
    /// The locate call itself failed.
    LocateFailed(ProviderError),
    /// Locate succeeded with zero PM2.5 stations in range.
    NoStations,
    /// Stations existed but none produced a fresh reading.
    NoFreshData,
}

/// Tally of one probe pass.
#[derive(Default)]
struct ProbeState {
    measurements: Vec<Measurement>,
    rate_limited: Vec<String>,
    probed: usize,
}

pub struct ResolutionEngine<P, S> {
    primary: P,
    secondary: S,
    settings: ResolutionSettings,
}

impl<P: PrimaryProvider, S: SecondaryProvider> ResolutionEngine<P, S> {
    pub fn new(primary: P, secondary: S, settings: ResolutionSettings) -> Self {
        Self {
            primary,
            secondary,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolutionSettings {
        &self.settings
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Resolves the best PM2.5 estimate for `point` using the wall clock.
    pub fn resolve(&self, point: GeoPoint, radius_km: f64, max_stations_to_query: usize) -> Resolution {
        self.resolve_at(point, radius_km, max_stations_to_query, Utc::now())
    }

    /// Same as `resolve` with the configured default radius and station cap.
    pub fn resolve_default(&self, point: GeoPoint) -> Resolution {
        self.resolve(
            point,
            self.settings.default_radius_km,
            self.settings.max_stations_to_query,
        )
    }

    /// Resolves against an explicit `now`, which anchors both the trailing
    /// reading window and the freshness check.
    pub fn resolve_at(
        &self,
        point: GeoPoint,
        radius_km: f64,
        max_stations_to_query: usize,
        now: DateTime<Utc>,
    ) -> Resolution {
        logging::info(
            DataSource::Engine,
            None,
            &format!("Resolving PM2.5 at {} within {} km", point, radius_km),
        );

        // 1. Locate
        let stations = match locator::locate(
            &self.primary,
            point,
            radius_km,
            self.settings.station_search_limit,
        ) {
            Ok(stations) => stations,
            Err(err) => {
                logging::log_provider_failure(DataSource::Primary, None, "locate stations", &err);
                return self.fallback(point, PrimaryExhaustion::LocateFailed(err), 0, ProbeState::default());
            }
        };

        let located = stations.len();
        if stations.is_empty() {
            logging::warn(
                DataSource::Primary,
                None,
                &format!("No PM2.5 stations from {} within {} km", self.primary.name(), radius_km),
            );
            return self.fallback(point, PrimaryExhaustion::NoStations, 0, ProbeState::default());
        }

        logging::info(
            DataSource::Primary,
            None,
            &format!("Found {} station(s) with a PM2.5 sensor", located),
        );

        // 2. Cap
        let capped = &stations[..stations.len().min(max_stations_to_query)];

        // 3. Probe
        let state = self.probe(capped, now);
        logging::log_probe_summary(state.probed, state.measurements.len(), state.rate_limited.len());

        // 4. Select
        match select_most_recent(&state.measurements).cloned() {
            Some(best) => {
                logging::info(
                    DataSource::Engine,
                    None,
                    &format!("Selected most recent reading from '{}'", best.source_label),
                );
                Resolution {
                    outcome: ResolutionOutcome::Resolved(best),
                    rate_limit: rate_limit_notice(state.rate_limited),
                    stations_located: located,
                    stations_probed: state.probed,
                    used_fallback: false,
                }
            }
            None => {
                logging::warn(
                    DataSource::Engine,
                    None,
                    &format!(
                        "Checked {} station(s) from {}, none with fresh PM2.5",
                        capped.len(),
                        self.primary.name()
                    ),
                );
                self.fallback(point, PrimaryExhaustion::NoFreshData, located, state)
            }
        }
    }

    fn probe(&self, stations: &[Station], now: DateTime<Utc>) -> ProbeState {
        let mut state = ProbeState::default();

        for (i, station) in stations.iter().enumerate() {
            let station_name = station.name.as_str();
            logging::debug(
                DataSource::Primary,
                Some(station_name),
                &format!("Step #{}: checking station at {:.1} km", i + 1, station.distance_m / 1000.0),
            );

            let Some(sensor_id) = station.pm25_sensor_id else {
                logging::warn(DataSource::Primary, Some(station_name), "No PM2.5 sensor, skipping");
                continue;
            };

            state.probed += 1;
            let reading = match readings::latest_reading(
                &self.primary,
                sensor_id,
                now,
                self.settings.window_hours,
                self.settings.readings_limit,
            ) {
                Ok(reading) => reading,
                Err(ProviderError::RateLimited) => {
                    // Reported once, in aggregate, after the loop.
                    state.rate_limited.push(station.name.clone());
                    continue;
                }
                Err(err) => {
                    logging::log_provider_failure(
                        DataSource::Primary,
                        Some(station_name),
                        "latest reading",
                        &err,
                    );
                    continue;
                }
            };

            match reading {
                Some(reading) if is_within_max_age(reading.observed_at, self.settings.max_age_days, now) => {
                    logging::debug(DataSource::Primary, Some(station_name), "Fresh reading found");
                    state
                        .measurements
                        .push(Measurement::from_reading(reading, self.primary.name(), station_name));
                }
                Some(reading) => {
                    logging::debug(
                        DataSource::Primary,
                        Some(station_name),
                        &format!(
                            "Reading from {} is older than {} days, dropped",
                            reading.observed_at.to_rfc3339(),
                            self.settings.max_age_days
                        ),
                    );
                }
                None => {
                    logging::debug(DataSource::Primary, Some(station_name), "No recent readings");
                }
            }
        }

        state
    }

    fn fallback(
        &self,
        point: GeoPoint,
        exhaustion: PrimaryExhaustion,
        located: usize,
        state: ProbeState,
    ) -> Resolution {
        logging::info(
            DataSource::Secondary,
            None,
            &format!("Trying {} as fallback", self.secondary.name()),
        );

        let resolved = match self.secondary.nearest_reading(point) {
            Ok(Some(nearest)) => match nearest.pm25 {
                Some(reading) => {
                    let measurement =
                        Measurement::from_reading(reading, self.secondary.name(), &nearest.station_name);
                    logging::info(
                        DataSource::Secondary,
                        Some(&nearest.station_name),
                        &format!("Fallback PM2.5 {:.1} µg/m³", measurement.value),
                    );
                    Some(measurement)
                }
                None => {
                    logging::warn(
                        DataSource::Secondary,
                        Some(&nearest.station_name),
                        "Nearest station reports no PM2.5",
                    );
                    None
                }
            },
            Ok(None) => {
                logging::warn(DataSource::Secondary, None, "No data for this location");
                None
            }
            Err(err) => {
                logging::log_provider_failure(DataSource::Secondary, None, "nearest reading", &err);
                None
            }
        };

        let outcome = match (resolved, exhaustion) {
            (Some(measurement), _) => ResolutionOutcome::Resolved(measurement),
            (None, PrimaryExhaustion::LocateFailed(err)) => ResolutionOutcome::ProviderError(format!(
                "{} unavailable: {}",
                self.primary.name(),
                err
            )),
            (None, PrimaryExhaustion::NoStations) => ResolutionOutcome::NoStations,
            (None, PrimaryExhaustion::NoFreshData) => ResolutionOutcome::NoFreshData,
        };

        Resolution {
            outcome,
            rate_limit: rate_limit_notice(state.rate_limited),
            stations_located: located,
            stations_probed: state.probed,
            used_fallback: true,
        }
    }
}

/// Picks the measurement with the latest `observed_at`. Measurements arrive
/// nearest-first, so on a tie the nearer station wins.
pub fn select_most_recent(measurements: &[Measurement]) -> Option<&Measurement> {
    measurements.iter().fold(None, |best: Option<&Measurement>, m| match best {
        Some(b) if b.observed_at >= m.observed_at => Some(b),
        _ => Some(m),
    })
}

fn rate_limit_notice(skipped: Vec<String>) -> Option<RateLimitNotice> {
    if skipped.is_empty() {
        return None;
    }
    let notice = RateLimitNotice {
        skipped_stations: skipped,
    };
    logging::warn(DataSource::Primary, None, &notice.to_string());
    Some(notice)
}

/// Human-readable label for an outcome, for callers that just print it.
pub fn describe_outcome(outcome: &ResolutionOutcome) -> String {
    match outcome {
        ResolutionOutcome::Resolved(m) => format!(
            "{:.1} µg/m³ at {} ({})",
            m.value,
            m.observed_at.to_rfc3339(),
            m.source_label
        ),
        ResolutionOutcome::NoStations => "no monitoring stations nearby".to_string(),
        ResolutionOutcome::NoFreshData => "no fresh PM2.5 data nearby".to_string(),
        ResolutionOutcome::ProviderError(detail) => format!("provider error: {}", detail),
    }
}
