//! Vocal Monitor
//!
//! Terminal front end for `vocal-core`: captures the default microphone and
//! prints pitch, loudness and stability as they are published.
//!
//! Usage:
//!   vocal-monitor                      - Monitor until Enter is pressed
//!   vocal-monitor --seconds 10         - Monitor for ten seconds
//!   vocal-monitor --target A3          - Show deviation from A3 instead of the nearest note
//!   vocal-monitor --config tuned.json  - Load analysis settings from a JSON file
//!   vocal-monitor --dump-config        - Print the default settings as JSON

mod display;

use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use cpal::traits::StreamTrait;
use log::{debug, info, warn};
use vocal_core::audio;
use vocal_core::{AnalysisConfig, AnalysisPipeline, PitchFrame, tuning};

use crate::display::{Reference, render_frame};

#[derive(Parser)]
#[command(name = "vocal-monitor", about = "Real-time vocal pitch and loudness monitor")]
struct Cli {
    /// JSON file with analysis settings; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<String>,

    /// Reference pitch as a note name (e.g. "A4") or a frequency in Hz
    #[arg(short, long)]
    target: Option<String>,

    /// Stop after this many seconds instead of waiting for Enter
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };
    config.validate().context("invalid analysis settings")?;

    if cli.dump_config {
        save_config(&config, io::stdout().lock())?;
        return Ok(());
    }

    let reference = match &cli.target {
        Some(target) => Reference::Fixed(parse_target(target)?),
        None => Reference::NearestNote,
    };

    run(config, reference, cli.seconds)
}

fn run(config: AnalysisConfig, reference: Reference, seconds: Option<f64>) -> Result<()> {
    let quit = match seconds {
        Some(secs) if secs > 0.0 => crossbeam_channel::after(Duration::from_secs_f64(secs)),
        Some(_) => bail!("--seconds must be positive"),
        None => wait_for_enter(),
    };

    let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<PitchFrame>();
    let pipeline = AnalysisPipeline::spawn(config, frame_tx)?;
    let sender = pipeline.sender();

    let (stream, sample_rate) =
        audio::start_audio_capture(pipeline.sender()).context("failed to start audio capture")?;
    info!("Monitoring at {} Hz", sample_rate);

    let started = Instant::now();
    let mut frames = 0usize;
    let mut stdout = io::stdout().lock();
    loop {
        select! {
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => {
                    frames += 1;
                    writeln!(stdout, "{}", render_frame(&frame, reference))?;
                }
                Err(_) => {
                    warn!("Analysis worker disconnected");
                    break;
                }
            },
            recv(quit) -> _ => break,
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Error pausing stream: {}", e);
    }
    drop(stream);
    pipeline.stop();

    debug!(
        "{} frames in {:.1} s, {} buffers dropped",
        frames,
        started.elapsed().as_secs_f64(),
        sender.dropped_buffers()
    );
    Ok(())
}

/// Fires once a line (or end of input) arrives on stdin.
fn wait_for_enter() -> Receiver<Instant> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = tx.send(Instant::now());
    });
    rx
}

/// Accepts a note name from the tuning table or a plain frequency in Hz.
fn parse_target(target: &str) -> Result<f32> {
    if let Some(freq) = tuning::note_frequency(target) {
        return Ok(freq);
    }
    let hz: f32 = target
        .trim_end_matches("Hz")
        .trim()
        .parse()
        .with_context(|| format!("'{}' is neither a note name nor a frequency", target))?;
    if !hz.is_finite() || hz <= 0.0 {
        bail!("target frequency must be positive, got {}", hz);
    }
    Ok(hz)
}

/// Loads analysis settings from a JSON file.
fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    let config = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Writes analysis settings as pretty-printed JSON.
fn save_config(config: &AnalysisConfig, mut out: impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, config)?;
    writeln!(out)?;
    Ok(())
}
