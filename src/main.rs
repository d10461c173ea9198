/// Command-line entry point.
///
/// ```text
/// aqmon_service resolve <lat> <lon> [radius_km] [max_stations]
/// aqmon_service verify [lat lon]
/// ```
///
/// Results go to stdout; logs go to stderr.

use std::error::Error;

use aqmon_service::alert::advisory::advisory_for;
use aqmon_service::config::{self, ServiceConfig};
use aqmon_service::engine::{ResolutionEngine, describe_outcome};
use aqmon_service::ingest::openaq::OpenAqClient;
use aqmon_service::ingest::waqi::WaqiClient;
use aqmon_service::logging::{self, DataSource};
use aqmon_service::memo::ResolutionMemo;
use aqmon_service::model::GeoPoint;
use aqmon_service::verify;

const USAGE: &str = "usage:\n  aqmon_service resolve <lat> <lon> [radius_km] [max_stations]\n  aqmon_service verify [lat lon]";

/// Reference point for `verify` when none is given (Mexico City).
const DEFAULT_VERIFY_POINT: (f64, f64) = (19.4326, -99.1332);

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = config::load_config_or_default(config::DEFAULT_CONFIG_PATH)?;
    logging::init_logger(
        config.logging.min_level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );
    logging::debug(
        DataSource::Config,
        None,
        &format!(
            "Loaded config: radius {} km, cap {}, max age {} days",
            config.resolution.default_radius_km,
            config.resolution.max_stations_to_query,
            config.resolution.max_age_days
        ),
    );

    match args.first().map(String::as_str) {
        Some("resolve") => run_resolve(&config, &args[1..]),
        Some("verify") => run_verify(&config, &args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            Err("missing or unknown command".into())
        }
    }
}

fn parse_point(lat: &str, lon: &str) -> Result<GeoPoint, Box<dyn Error>> {
    let latitude: f64 = lat.parse().map_err(|_| format!("invalid latitude: {}", lat))?;
    let longitude: f64 = lon.parse().map_err(|_| format!("invalid longitude: {}", lon))?;
    Ok(GeoPoint::new(latitude, longitude)?)
}

fn run_resolve(config: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    let [lat, lon, rest @ ..] = args else {
        eprintln!("{}", USAGE);
        return Err("resolve needs a latitude and longitude".into());
    };
    let point = parse_point(lat, lon)?;

    let radius_km = match rest.first() {
        Some(r) => Some(r.parse::<f64>().map_err(|_| format!("invalid radius_km: {}", r))?),
        None => None,
    };
    let max_stations = match rest.get(1) {
        Some(n) => Some(n.parse::<usize>().map_err(|_| format!("invalid max_stations: {}", n))?),
        None => None,
    };

    let primary = OpenAqClient::new(
        &config.primary.base_url,
        config.primary.api_key.as_deref(),
        config.primary.timeout_secs,
    )?;
    let secondary = WaqiClient::new(
        &config.secondary.base_url,
        config.secondary.token.as_deref(),
        config.secondary.timeout_secs,
    )?;
    let engine = ResolutionEngine::new(primary, secondary, config.resolution.clone());

    let memo = ResolutionMemo::default();
    let memo_radius_km = radius_km.unwrap_or(engine.settings().default_radius_km);
    let resolution = memo.get_or_resolve(point, memo_radius_km, || match max_stations {
        None if radius_km.is_none() => engine.resolve_default(point),
        _ => engine.resolve(
            point,
            memo_radius_km,
            max_stations.unwrap_or(engine.settings().max_stations_to_query),
        ),
    });

    println!("PM2.5 near {}: {}", point, describe_outcome(&resolution.outcome));
    if let Some(measurement) = resolution.outcome.measurement() {
        let level = advisory_for(measurement);
        println!("Advisory: {} ({})", level, level.recommended_action());
    }
    if let Some(notice) = &resolution.rate_limit {
        println!("{}", notice);
    }
    logging::debug(
        DataSource::System,
        None,
        &format!(
            "located={} probed={} fallback={}",
            resolution.stations_located, resolution.stations_probed, resolution.used_fallback
        ),
    );

    Ok(())
}

fn run_verify(config: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    let point = match args {
        [lat, lon, ..] => parse_point(lat, lon)?,
        _ => GeoPoint::new(DEFAULT_VERIFY_POINT.0, DEFAULT_VERIFY_POINT.1)?,
    };

    let report = verify::run_full_verification(config, point)?;
    verify::print_summary(&report);
    println!("\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
