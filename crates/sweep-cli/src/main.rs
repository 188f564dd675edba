use std::{error::Error, fs, path::Path};

use clap::Parser;
use sweep_pipeline::{replay, CalibrationConfig, CalibrationSession, Event};

/// Offline lighthouse rig calibration from a recorded event stream.
#[derive(Debug, Parser)]
#[command(author, version, about = "Batch lighthouse rig calibration")]
struct Args {
    /// Path to a JSON array of ingestion events (descriptors, light,
    /// corrections, triggers) in arrival order.
    #[arg(long)]
    events: String,

    /// Optional path to a JSON CalibrationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Optional path to write the calibration report to; the report is
    /// always printed to stdout.
    #[arg(long)]
    output: Option<String>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

fn run_calibration(
    events_path: &str,
    config_path: Option<&str>,
    output_path: Option<&str>,
) -> Result<String, Box<dyn Error>> {
    let config = if let Some(path) = config_path {
        load_json_file::<CalibrationConfig>(Path::new(path))?
    } else {
        CalibrationConfig::default()
    };
    let events: Vec<Event> = load_json_file(Path::new(events_path))?;

    let mut session = CalibrationSession::new(config);
    let responses = replay(&mut session, &events);
    for response in &responses {
        eprintln!("{}", response.message);
    }

    let report = session
        .last_report()
        .ok_or("no calibration solution produced")?;
    let json = report.to_json_pretty()?;
    if let Some(path) = output_path {
        report.write(Path::new(path))?;
    }
    Ok(json)
}

fn main() {
    env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let json = run_calibration(&args.events, args.config.as_deref(), args.output.as_deref())?;
    println!("{}", json);
    Ok(())
}
