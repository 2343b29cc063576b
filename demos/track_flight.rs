use std::path::PathBuf;

use clap::Parser;
use flighttrack::{
    analytics,
    coordinator::Coordinator,
    cv::{CvBackend, CvTrackers, HighguiOperator},
    fuser, Camera, Config, FlightRecord,
};
use opencv::core::Mat;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "track_flight", about = "Track a drone flight from two videos and export the flight record")]
struct Args {
    /// Video of camera 1, supplies world X
    video1: PathBuf,
    /// Video of camera 2, supplies world Y
    video2: PathBuf,
    #[arg(short, long, default_value = "flight.flight")]
    output: PathBuf,
    /// Configuration file, `flighttrack.toml` in the working directory otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "")]
    pilot: String,
    #[arg(long, default_value = "")]
    instructor: String,
    #[arg(long, default_value = "")]
    instructions: String,
    #[arg(long, default_value = "")]
    date: String,
    /// Run both sessions at once; HighGUI needs a platform that allows
    /// windows off the main thread
    #[arg(long)]
    concurrent: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cfg.coordinator.concurrent = args.concurrent;

    let trackers = CvTrackers;
    let display = cfg.tracking.reselect_scale;
    let mut op1 = HighguiOperator::new(Camera::First, display);
    let mut op2 = HighguiOperator::new(Camera::Second, display);

    let (first, second) = Coordinator::<Mat>::new(&cfg, &trackers)
        .run(&CvBackend, &args.video1, &args.video2, &mut op1, &mut op2)
        .both()?;

    let coords = fuser::merge(&first.samples, &second.samples, &cfg.field);
    let mut record = FlightRecord::from_trajectory(coords)
        .pilot(args.pilot)
        .instructor(args.instructor)
        .instructions(args.instructions)
        .date(args.date);

    if let Err(err) = analytics::analyze(&mut record, &cfg) {
        warn!(error = %err, "analytics incomplete");
    }

    record.export(&args.output)?;

    info!(
        length = record.flight_length,
        legal = record.legal_points.len(),
        avg = record.avg_vel,
        smoothness = record.smoothness,
        "flight recorded"
    );

    Ok(())
}
