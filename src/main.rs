use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use vidshrink::config;
use vidshrink::size::format_size;
use vidshrink::upload::UploadDecision;
use vidshrink_core::ffmpeg::{FfmpegProbe, probe_source};
use vidshrink_core::negotiate::{HardwareAcceleration, LatencyMode, ProbePreference, negotiate_with};
use vidshrink_core::{CompressionPreset, fit};

#[derive(Parser)]
#[command(name = "vidshrink", version, about = "Adaptive video compression")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a file would be handled: upload decision, target size and
    /// the encoder configuration this machine accepts.
    Inspect {
        file: PathBuf,
        #[arg(long)]
        max_width: Option<u32>,
        #[arg(long)]
        max_height: Option<u32>,
        #[arg(long)]
        fps: Option<u32>,
        /// Try software encoders before hardware ones.
        #[arg(long)]
        prefer_software: bool,
        /// Probe with quality-oriented encoder settings instead of realtime.
        #[arg(long)]
        quality: bool,
    },
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("vidshrink", log::LevelFilter::Debug)
        .filter_module("vidshrink_core", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    vidshrink_core::ffmpeg::init()?;

    match cli.command {
        Command::Inspect {
            file,
            max_width,
            max_height,
            fps,
            prefer_software,
            quality,
        } => {
            let mut preset = config::config().preset().clone();
            preset.max_width = max_width.unwrap_or(preset.max_width);
            preset.max_height = max_height.unwrap_or(preset.max_height);
            preset.fps = fps.unwrap_or(preset.fps);
            let preference = ProbePreference {
                hardware_acceleration: if prefer_software {
                    HardwareAcceleration::PreferSoftware
                } else {
                    HardwareAcceleration::PreferHardware
                },
                latency_mode: if quality {
                    LatencyMode::Quality
                } else {
                    LatencyMode::Realtime
                },
            };
            inspect(&file, &preset, preference).await
        }
    }
}

async fn inspect(
    file: &Path,
    preset: &CompressionPreset,
    preference: ProbePreference,
) -> anyhow::Result<()> {
    let size = std::fs::metadata(file)
        .with_context(|| format!("stat {}", file.display()))?
        .len();
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    println!("file:      {} ({})", name, format_size(size));
    match config::config().upload_gate().decide(&name, size) {
        Ok(UploadDecision::PassAsIs) => println!("decision:  upload as is"),
        Ok(UploadDecision::Compress) => println!("decision:  compress"),
        Err(e) => println!("decision:  reject ({})", e),
    }

    let info = probe_source(file)?;
    println!("source:    {}", info);

    let fitted = fit(info.width, info.height, preset.max_width, preset.max_height)?;
    let (width, height) = fitted.even();
    println!(
        "target:    {}x{} (scale {:.3}), encoder size {}x{}",
        fitted.width, fitted.height, fitted.scale, width, height
    );

    let probe = FfmpegProbe::new();
    println!("encoders:  {}", probe.encoder_names().join(", "));
    let negotiated = negotiate_with(
        &probe,
        width,
        height,
        preset.fps,
        preset.video_bitrate_bps,
        preference,
    )
    .await;
    match negotiated {
        Some(config) => println!("encode:    {}", config),
        None => println!("encode:    no supported configuration, stream recorder fallback"),
    }
    Ok(())
}
