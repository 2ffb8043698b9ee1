//! Run a live stabilization session on synthetic motion and frames.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Args;
use levelcam_capture_engine::{StabilizationSession, SyntheticFrameSource};
use levelcam_common::config::{AppConfig, StabilizationMode};
use levelcam_motion_tracker::backends::SyntheticBackend;
use levelcam_render_engine::PngSequenceSink;

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Output directory for the PNG sequence (defaults to the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stabilization mode: roll-only or roll-and-translation
    #[arg(long)]
    pub mode: Option<StabilizationMode>,

    /// Number of frames to capture
    #[arg(long, default_value = "90")]
    pub frames: u64,

    /// Frame width
    #[arg(long, default_value = "720")]
    pub width: u32,

    /// Frame height
    #[arg(long, default_value = "960")]
    pub height: u32,

    /// Capture FPS (defaults to the config)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Roll sweep amplitude in radians
    #[arg(long, default_value = "0.4", allow_hyphen_values = true)]
    pub amplitude: f64,

    /// Roll sweep period in seconds
    #[arg(long, default_value = "3.0")]
    pub period: f64,
}

pub async fn run(config: &AppConfig, args: CaptureArgs) -> anyhow::Result<()> {
    config.validate()?;

    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    let fps = args.fps.unwrap_or(config.capture.fps);
    let output = args
        .output
        .unwrap_or_else(|| config.capture.output_dir.clone());

    let backend = SyntheticBackend::new(args.amplitude, args.period, config.motion.sample_rate_hz);
    let mut source = SyntheticFrameSource::new(args.width, args.height, fps)?
        .with_sweep(args.amplitude, args.period)
        .with_limit(args.frames);
    let mut sink = PngSequenceSink::create(&output)?;

    let mut session = StabilizationSession::new(&config);
    session.start(Box::new(backend))?;

    // Ctrl-C ends the loop; frames written so far are kept.
    let stop = session.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, finishing capture");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let result = session.run_capture(&mut source, &mut sink, fps).await;
    session.stop();
    let stats = result?;

    println!("Capture complete:");
    println!("  Directory: {}", output.display());
    println!("  Frames received: {}", stats.frames_received);
    println!("  Frames written: {}", stats.frames_persisted);
    println!("  Frames skipped: {}", stats.frames_skipped);
    Ok(())
}
