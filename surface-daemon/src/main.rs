//! Headless surface service
//!
//! Loads the configuration and the city boundary, then keeps the NO2
//! surfaces fresh until interrupted. With `--once` it runs a single refresh
//! cycle and prints the live response as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use surface_core::service::{SurfaceService, TriggerSource};
use surface_core::{GridResolution, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Grid resolution preset
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Resolution {
    Coarse,
    Standard,
    Fine,
}

impl From<Resolution> for GridResolution {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::Coarse => GridResolution::Coarse,
            Resolution::Standard => GridResolution::Standard,
            Resolution::Fine => GridResolution::Fine,
        }
    }
}

/// Live kriging surfaces for Tokyo NO2 forecasts
#[derive(Parser, Debug)]
#[command(name = "surface-daemon")]
#[command(about = "Interpolates sensor forecasts into city-wide NO2 surfaces", long_about = None)]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// City boundary (GeoJSON or TopoJSON), overrides the config
    #[arg(short, long)]
    boundary: Option<PathBuf>,

    /// Forecast table written by the model, overrides the config
    #[arg(short, long)]
    forecast: Option<PathBuf>,

    /// Write each new snapshot to this file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Grid resolution preset
    #[arg(short, long, value_enum)]
    resolution: Option<Resolution>,

    /// Nodes per grid axis, overrides --resolution
    #[arg(long)]
    nodes: Option<usize>,

    /// Refresh period in seconds
    #[arg(short, long)]
    period: Option<u64>,

    /// Run one cycle, print the live response and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(path) = &self.boundary {
            config.paths.boundary.clone_from(path);
        }
        if let Some(path) = &self.forecast {
            config.paths.forecast.clone_from(path);
        }
        if let Some(path) = &self.export {
            config.paths.snapshot_export = Some(path.clone());
        }
        if let Some(resolution) = self.resolution {
            config.grid.resolution = resolution.into();
        }
        if let Some(nodes) = self.nodes {
            config.grid.resolution = GridResolution::Custom(nodes);
        }
        if let Some(period) = self.period {
            config.schedule.period_secs = period;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => match ServiceConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => ServiceConfig::default(),
    };
    args.apply(&mut config);

    let adapter = Arc::new(config.paths.forecast_adapter());
    let service = match SurfaceService::from_config(&config, adapter) {
        Ok(service) => service,
        Err(e) => {
            error!("Startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.once {
        return run_once(&service).await;
    }

    let shutdown = CancellationToken::new();
    let scheduler = service.spawn(shutdown.clone());
    info!(
        boundary = %config.paths.boundary.display(),
        forecast = %config.paths.forecast.display(),
        "Surface service running, press Ctrl+C to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl+C: {e}");
    }
    shutdown.cancel();
    if let Err(e) = scheduler.await {
        error!("Scheduler task failed: {e}");
        return ExitCode::FAILURE;
    }

    let status = service.scheduler().status();
    info!(
        completed = status.cycles_completed,
        failed = status.cycles_failed,
        dropped = status.triggers_dropped,
        "Surface service stopped"
    );
    ExitCode::SUCCESS
}

async fn run_once(service: &SurfaceService) -> ExitCode {
    match service.scheduler().run_now(TriggerSource::Manual).await {
        Some(Ok(report)) => info!(
            generation = report.generation,
            horizons = report.horizons.len(),
            points = report.points,
            "Cycle complete"
        ),
        Some(Err(e)) => {
            error!("Cycle failed: {e}");
            return ExitCode::FAILURE;
        }
        None => warn!("A cycle was already running"),
    }

    let query = service.query();
    let output = serde_json::json!({
        "timestamps": query.timestamps_now().timestamps,
        "live": query.live(),
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to encode response: {e}");
            ExitCode::FAILURE
        }
    }
}
