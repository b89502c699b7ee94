//! Drowsiness Monitor - Main Entry Point

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dms::DmsModule;
use monitor::{
    init_logging, open_source, FanOut, JsonLinesSink, LogFormat, LogSink, Profile, Recording, Settings,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "drowsiness-monitor", version, about = "Driver drowsiness and yawn detection from facial landmarks")]
struct Cli {
    /// JSON-lines landmark recording
    recording: PathBuf,

    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Threshold preset applied before the settings file
    #[arg(long, value_enum, default_value_t = Profile::Default)]
    profile: Profile,

    /// Directory of image frames to pair with the recording
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Write frame reports as JSON lines ("-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref(), cli.profile)?;
    if cli.json_logs {
        settings.logging.format = LogFormat::Json;
    }
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let recording = Recording::load(&cli.recording)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let source = open_source(cli.frames_dir.as_deref(), settings.camera.into(), recording.len())?;

    let mut sink = FanOut::new();
    sink.push(Box::new(LogSink::new(settings.alerts.clone())));
    match cli.output.as_deref() {
        Some(path) if path.as_os_str() == "-" => {
            sink.push(Box::new(JsonLinesSink::new(std::io::stdout())));
        }
        Some(path) => {
            let json = JsonLinesSink::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            sink.push(Box::new(json));
        }
        None => {}
    }

    let mut module = DmsModule::new(settings.dms, recording.into_provider())?;
    let summary = dms::run(source, &mut module, &mut sink, &stop)?;

    info!(
        frames = summary.frames,
        frames_with_faces = summary.frames_with_faces,
        degenerate_faces = summary.degenerate_faces,
        alert_frames = summary.alert_frames,
        yawns = summary.yawns_completed,
        "Session finished"
    );

    Ok(())
}
