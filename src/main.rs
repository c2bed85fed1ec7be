use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use sound_locator::api::formatting::render;
use sound_locator::{
    Degradation, EmissionTime, LocateRequest, LocateResponse, Locator, LocatorConfig,
    LocatorError, OutputFormat,
};

/// Locate an acoustic event from its arrival times at three or more receivers
#[derive(Parser, Debug)]
#[command(name = "sound-locator", version, about)]
struct Args {
    /// N arrival times (s), then N latitudes (deg), then N longitudes (deg)
    #[arg(required = true, allow_negative_numbers = true, value_name = "VALUES")]
    values: Vec<f64>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Speed of sound (m/s)
    #[arg(long)]
    speed_of_sound: Option<f64>,

    /// Solver residual tolerance (m)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Solver iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Known emission time (s); solved for when omitted
    #[arg(long, allow_negative_numbers = true)]
    emission_time: Option<f64>,

    /// Output format: text, json or csv
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    if verbose {
        info!("Verbose logging enabled (DEBUG level)");
    }
}

/// Split `t1..tN lat1..latN lon1..lonN` into a request
fn request_from_values(values: &[f64]) -> Result<LocateRequest, String> {
    if values.len() % 3 != 0 {
        return Err(format!(
            "expected 3N values (times, latitudes, longitudes), got {}",
            values.len()
        ));
    }
    if values.len() < 9 {
        return Err(format!(
            "at least 3 receivers (9 values) are required, got {} values",
            values.len()
        ));
    }

    let n = values.len() / 3;
    LocateRequest::from_columns(&values[..n], &values[n..2 * n], &values[2 * n..])
        .ok_or_else(|| "mismatched value columns".to_string())
}

fn build_config(args: &Args) -> Result<LocatorConfig, LocatorError> {
    let mut config = match &args.config {
        Some(path) => LocatorConfig::from_file(path)?,
        None => LocatorConfig::default(),
    };

    if let Some(speed) = args.speed_of_sound {
        config = config.with_speed_of_sound(speed);
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if let Some(t0) = args.emission_time {
        config = config.with_emission_time(EmissionTime::Known(t0));
    }

    config.validate()?;
    Ok(config)
}

/// 2 for degenerate geometry, 1 for everything else
fn exit_status(err: &LocatorError) -> u8 {
    match err {
        LocatorError::Geometry { .. } => 2,
        _ => 1,
    }
}

/// 0 for a usable fix, 2 when collinear receivers forced the fallback
fn response_status(response: &LocateResponse) -> u8 {
    match response.diagnostics.degradation {
        Some(Degradation::DegenerateGeometry { .. }) => 2,
        _ => 0,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let request = match request_from_values(&args.values) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(1);
        }
    };

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(exit_status(&e));
        }
    };

    let locator = match Locator::new(config) {
        Ok(locator) => locator,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(exit_status(&e));
        }
    };

    let response = match locator.locate_request(&request) {
        Ok(response) => response,
        Err(e) => {
            error!("localization failed: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::from(exit_status(&e));
        }
    };

    if let Some(reason) = &response.diagnostics.degradation {
        warn!(?reason, "result is the nearest-receiver fallback");
    }

    match render(&response, args.format) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::from(response_status(&response))
        }
        Err(e) => {
            eprintln!("error: failed to format result: {}", e);
            ExitCode::from(1)
        }
    }
}
