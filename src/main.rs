// src/main.rs
//! Trip Recorder - record GPS trips from gpsd and browse the saved history

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trip_recorder::{
    export::{track_to_gpx, write_file, ExportFormat, TripExporter},
    format::{format_distance_km, format_stopwatch},
    location::GpsdProvider,
    JsonTripStore, RecordingSession, TrackerConfig, TripStore, TripTracker,
};

#[derive(Parser)]
#[command(name = "trip-recorder", version, about = "Record GPS trips and keep a local trip history")]
struct Cli {
    /// Use this config file instead of ~/.config/trip-recorder/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a trip from gpsd with a live dashboard
    Record {
        #[arg(long)]
        gpsd_host: Option<String>,
        #[arg(long)]
        gpsd_port: Option<u16>,
    },
    /// List saved trips, newest first
    History,
    /// Export all saved trips
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportKind,
        /// Defaults to trips_<timestamp>.<ext> in the current directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Write one trip's track as GPX
    Gpx {
        trip_id: i64,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    SetBackground {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    SetInterval {
        interval_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Csv,
    Json,
}

impl From<ExportKind> for ExportFormat {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Csv => ExportFormat::Csv,
            ExportKind::Json => ExportFormat::Json,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<(TrackerConfig, PathBuf)> {
    let path = match path {
        Some(path) => path.clone(),
        None => TrackerConfig::get_config_path()?,
    };
    let config = TrackerConfig::load_from(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok((config, path))
}

async fn open_store(config: &TrackerConfig) -> anyhow::Result<JsonTripStore> {
    let path = config.resolved_store_path()?;
    Ok(JsonTripStore::open(&path)
        .await
        .with_context(|| format!("opening trip store {}", path.display()))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Record { gpsd_host, gpsd_port } => {
            let host = gpsd_host.unwrap_or_else(|| config.gpsd_host.clone());
            let port = gpsd_port.unwrap_or(config.gpsd_port);
            tracing::info!("Using gpsd at {}:{}", host, port);

            let store = Arc::new(open_store(&config).await?);
            let provider = Arc::new(GpsdProvider::new(host, port));
            let tracker = TripTracker::spawn(config, provider, store);

            RecordingSession::new(tracker).run().await?;
        }
        Commands::History => {
            let store = open_store(&config).await?;
            let trips = store.all_trips().await?;
            if trips.is_empty() {
                println!("No trips recorded yet.");
            }
            for trip in trips {
                println!(
                    "{:>5}  {}  {:>10}  {}",
                    trip.id,
                    trip.start_time.format("%Y-%m-%d %H:%M"),
                    format_distance_km(trip.distance_meters),
                    format_stopwatch(trip.duration_millis, false)
                );
            }
        }
        Commands::Export { format, output } => {
            let format = ExportFormat::from(format);
            let store = open_store(&config).await?;
            let exporter = TripExporter::new(store.all_trips().await?);
            let path = output.unwrap_or_else(|| PathBuf::from(format.default_file_name(Utc::now())));

            exporter.export_to_file(&path, format)?;
            println!("Exported {} trips to {}", exporter.trip_count(), path.display());
        }
        Commands::Gpx { trip_id, output } => {
            let store = open_store(&config).await?;
            let Some(trip) = store.trip_by_id(trip_id).await? else {
                bail!("No trip with id {}", trip_id);
            };
            let locations = store.locations_for_trip(trip_id).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("trip_{}.gpx", trip_id)));

            write_file(&path, &track_to_gpx(&trip, &locations))?;
            println!("Wrote {} points to {}", locations.len(), path.display());
        }
        Commands::Config { action } => {
            let mut config = config;
            match action {
                ConfigAction::Show => {
                    println!("# {}", config_path.display());
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::SetBackground { enabled } => {
                    config.update_background_tracking(enabled);
                    config.save_to(&config_path)?;
                    println!("Background tracking {}", if enabled { "enabled" } else { "disabled" });
                }
                ConfigAction::SetInterval { interval_ms } => {
                    config.update_location_interval(interval_ms);
                    config.save_to(&config_path)?;
                    println!("Location update interval set to {} ms", interval_ms);
                }
            }
        }
    }

    Ok(())
}
