/// Decisions made on top of a reading.
///
/// Submodules:
/// - `freshness`: is a reading recent enough to be trusted.
/// - `advisory`: which health-advisory band a PM2.5 value falls into.

pub mod advisory;
pub mod freshness;
