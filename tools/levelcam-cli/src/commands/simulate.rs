//! Run the motion estimator and crop geometry offline.
//!
//! Prints one JSON object per sample on stdout so runs can be plotted or
//! diffed. Logs go to stderr.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Args;
use levelcam_common::config::{AppConfig, StabilizationMode};
use levelcam_crop_model::crop::{PlacedCrop, Size};
use levelcam_crop_model::signal::{parse_samples, MotionSample};
use levelcam_motion_tracker::backends::{Jerk, SyntheticBackend};
use levelcam_processing_core::MotionEstimator;
use levelcam_render_engine::{compose, DisplayTransform};
use serde::Serialize;

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// JSONL motion capture to replay (synthetic sweep when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Stabilization mode: roll-only or roll-and-translation
    #[arg(long)]
    pub mode: Option<StabilizationMode>,

    /// Synthetic run length in seconds
    #[arg(long, default_value = "2.0")]
    pub duration: f64,

    /// Synthetic roll amplitude in radians
    #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
    pub amplitude: f64,

    /// Synthetic roll period in seconds
    #[arg(long, default_value = "2.0")]
    pub period: f64,

    /// Lateral acceleration (m/s²) applied for one tick of the synthetic run
    #[arg(long, allow_hyphen_values = true)]
    pub jerk: Option<f64>,

    /// When the jerk fires, in seconds
    #[arg(long, default_value = "0.5")]
    pub jerk_at: f64,

    /// Preview container width
    #[arg(long, default_value = "1080")]
    pub width: f64,

    /// Preview container height
    #[arg(long, default_value = "1920")]
    pub height: f64,

    /// Print every Nth sample
    #[arg(long, default_value = "1")]
    pub every: usize,
}

#[derive(Debug, Serialize)]
struct SimulationLine {
    t_ns: u64,
    roll: f64,
    offset_x: f64,
    offset_y: f64,
    velocity_x: f64,
    velocity_y: f64,
    crop: Option<PlacedCrop>,
    preview: Option<PreviewLine>,
}

/// What a web preview needs to draw the tick.
#[derive(Debug, Serialize)]
struct PreviewLine {
    css_transform: String,
    clip_min: [f64; 2],
    clip_max: [f64; 2],
}

impl From<&DisplayTransform> for PreviewLine {
    fn from(transform: &DisplayTransform) -> Self {
        let (min, max) = transform.clip_bounds();
        Self {
            css_transform: transform.layer_transform.to_css_matrix(),
            clip_min: [min.x, min.y],
            clip_max: [max.x, max.y],
        }
    }
}

pub fn run(config: &AppConfig, args: SimulateArgs) -> anyhow::Result<()> {
    config.validate()?;
    let mode = args.mode.unwrap_or(config.mode);
    let samples = load_samples(config, &args)?;
    let container = Size::new(args.width, args.height);

    tracing::info!(
        samples = samples.len(),
        mode = ?mode,
        width = container.width,
        height = container.height,
        "Simulating"
    );

    let mut estimator = MotionEstimator::new(config.motion.clone(), mode);
    estimator.start(true);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let every = args.every.max(1);
    let mut peak_offset: f64 = 0.0;
    let mut skipped = 0u64;

    for (index, sample) in samples.iter().enumerate() {
        let signal = estimator.on_sample(sample);
        let transform = compose(container, &signal, mode, &config.crop);
        if transform.is_none() {
            skipped += 1;
        }

        let t = signal.translation;
        peak_offset = peak_offset.max(t.offset_x.abs()).max(t.offset_y.abs());

        if index % every == 0 {
            let line = SimulationLine {
                t_ns: sample.timestamp_ns,
                roll: signal.roll(),
                offset_x: t.offset_x,
                offset_y: t.offset_y,
                velocity_x: t.velocity_x,
                velocity_y: t.velocity_y,
                crop: transform.map(|t| t.crop),
                preview: transform.as_ref().map(PreviewLine::from),
            };
            writeln!(out, "{}", serde_json::to_string(&line)?)?;
        }
    }
    out.flush()?;

    let (settle_x, settle_y) = estimator.settling_magnitude();
    tracing::info!(
        processed = estimator.samples_seen(),
        dropped = estimator.samples_dropped(),
        skipped,
        peak_offset,
        settle_x,
        settle_y,
        "Simulation complete"
    );
    estimator.stop();
    Ok(())
}

fn load_samples(config: &AppConfig, args: &SimulateArgs) -> anyhow::Result<Vec<MotionSample>> {
    if let Some(path) = &args.input {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        return Ok(parse_samples(&content)?);
    }

    let rate = config.motion.sample_rate_hz;
    let mut backend = SyntheticBackend::new(args.amplitude, args.period, rate);
    if let Some(acceleration) = args.jerk {
        backend = backend.with_jerk(Jerk {
            start_tick: (args.jerk_at.max(0.0) * rate as f64) as u64,
            ticks: 1,
            acceleration,
        });
    }

    let count = (args.duration.max(0.0) * rate as f64).ceil() as u64;
    Ok((0..count).map(|tick| backend.sample_at(tick)).collect())
}
