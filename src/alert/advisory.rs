//! PM2.5 health advisory levels.
//!
//! Maps a resolved concentration onto the traffic-light scale used for
//! outdoor-activity decisions. Upper bounds are inclusive: 35.0 is still
//! Good, 55.0 is still Moderate.

use crate::model::Measurement;

/// Upper bound (inclusive) of the Good band, µg/m³.
pub const GOOD_MAX_UG_M3: f64 = 35.0;

/// Upper bound (inclusive) of the Moderate band, µg/m³.
pub const MODERATE_MAX_UG_M3: f64 = 55.0;

/// Advisory levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AdvisoryLevel {
    Good,
    Moderate,
    Unhealthy,
}

impl AdvisoryLevel {
    /// Recommended action for outdoor activities at this level.
    pub fn recommended_action(&self) -> &'static str {
        match self {
            AdvisoryLevel::Good => "Normal activities",
            AdvisoryLevel::Moderate => "Reduce physical exertion",
            AdvisoryLevel::Unhealthy => "Avoid outdoor activities",
        }
    }
}

impl std::fmt::Display for AdvisoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisoryLevel::Good => write!(f, "Good"),
            AdvisoryLevel::Moderate => write!(f, "Moderate"),
            AdvisoryLevel::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Classifies a PM2.5 concentration in µg/m³.
pub fn classify_pm25(pm25_ug_m3: f64) -> AdvisoryLevel {
    if pm25_ug_m3 <= GOOD_MAX_UG_M3 {
        AdvisoryLevel::Good
    } else if pm25_ug_m3 <= MODERATE_MAX_UG_M3 {
        AdvisoryLevel::Moderate
    } else {
        AdvisoryLevel::Unhealthy
    }
}

/// Classifies a resolved measurement.
pub fn advisory_for(measurement: &Measurement) -> AdvisoryLevel {
    classify_pm25(measurement.value)
}
