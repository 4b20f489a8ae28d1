//! Command-line interface for the point cloud pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;

use crate::config::PipelineConfig;
use crate::core::loaders;
use crate::pipeline::{ArtifactKind, Pipeline, ReplaySource, StopHandle, StopReason};
use crate::processors::validation::{BoundsValidator, PointValidator};

#[derive(Parser)]
#[command(name = "sfm-cloud")]
#[command(about = "Accumulate per-frame SfM point clouds and export them as PLY", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a directory of per-frame point files through the pipeline
    Replay {
        /// Directory containing frame_N.ply / frame_N.csv files
        frames_dir: PathBuf,
        /// Output directory for the valid/total/aggregate PLY files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Number of frames that contribute to the aggregate
        #[arg(long)]
        frame_limit: Option<usize>,
        /// Let every frame contribute to the aggregate
        #[arg(long)]
        no_gate: bool,
        /// X-offset added per frame
        #[arg(long, allow_hyphen_values = true)]
        x_increment: Option<f32>,
        /// Scale applied to y coordinates
        #[arg(long, allow_hyphen_values = true)]
        y_scale: Option<f32>,
        /// Scale applied to z coordinates
        #[arg(long, allow_hyphen_values = true)]
        z_scale: Option<f32>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
        /// Restart from the first frame when the directory is exhausted
        #[arg(long)]
        loop_source: bool,
    },

    /// Print point counts and bounds of a PLY or CSV point file
    Inspect {
        /// Input point file
        file: PathBuf,
    },

    /// Write the default configuration as YAML
    DefaultConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over a known number of frames
fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} frames {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match cli.command {
        Commands::Replay {
            frames_dir,
            output_dir,
            frame_limit,
            no_gate,
            x_increment,
            y_scale,
            z_scale,
            max_frames,
            loop_source,
        } => {
            let overrides = ReplayOverrides {
                output_dir,
                frame_limit,
                no_gate,
                x_increment,
                y_scale,
                z_scale,
                max_frames,
                loop_source,
            };
            cmd_replay(&frames_dir, overrides.apply(config))
        }
        Commands::Inspect { file } => cmd_inspect(&file, &config),
        Commands::DefaultConfig { path } => cmd_default_config(&path),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Command-line values that take precedence over the YAML config.
struct ReplayOverrides {
    output_dir: Option<PathBuf>,
    frame_limit: Option<usize>,
    no_gate: bool,
    x_increment: Option<f32>,
    y_scale: Option<f32>,
    z_scale: Option<f32>,
    max_frames: Option<usize>,
    loop_source: bool,
}

impl ReplayOverrides {
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        let agg = &mut config.aggregation;
        if let Some(limit) = self.frame_limit {
            agg.frame_limit = limit;
        }
        if self.no_gate {
            agg.gate_enabled = false;
        }
        agg.x_offset_increment = self.x_increment.unwrap_or(agg.x_offset_increment);
        agg.y_scale = self.y_scale.unwrap_or(agg.y_scale);
        agg.z_scale = self.z_scale.unwrap_or(agg.z_scale);

        if let Some(dir) = self.output_dir {
            config.export.output_dir = dir;
        }
        if self.max_frames.is_some() {
            config.replay.max_frames = self.max_frames;
        }
        config.replay.loop_source |= self.loop_source;
        config
    }
}

/// Ctrl-C callback that ends the frame loop at the next frame boundary.
fn interrupt_handler(stop: StopHandle) -> impl Fn() + Send + 'static {
    move || {
        if !stop.is_stop_requested() {
            info!("Interrupt received, stopping after the current frame");
        }
        stop.request_stop();
    }
}

fn cmd_replay(frames_dir: &Path, config: PipelineConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut source = ReplaySource::from_dir(frames_dir)
        .with_context(|| format!("cannot replay frames from {}", frames_dir.display()))?;

    if config.replay.loop_source && config.replay.max_frames.is_none() {
        warn!("Looping replay without --max-frames runs until interrupted");
    }

    println!("Replaying point cloud frames...");
    println!("Input directory: {}", frames_dir.display());
    println!("Frames found: {}", source.num_frames());
    println!("Output directory: {}", config.export.output_dir.display());

    let expected = match config.replay.max_frames {
        Some(max) if config.replay.loop_source => max,
        Some(max) => max.min(source.num_frames()),
        None => source.num_frames(),
    };
    let progress = create_progress_bar(expected as u64);

    let mut pipeline = Pipeline::from_config(config);
    if let Err(e) = ctrlc::set_handler(interrupt_handler(pipeline.stop_handle())) {
        warn!("Cannot install Ctrl-C handler: {}", e);
    }
    let summary = pipeline.run(&mut source, |outcome| {
        progress.inc(1);
        if let Ok(frame) = outcome {
            progress.set_message(format!("({} valid / {} total)", frame.valid, frame.total));
        }
    });
    progress.finish_and_clear();

    if summary.stop_reason == Some(StopReason::Requested) {
        println!("Interrupted, exporting accumulated clouds");
    }

    let spinner = create_spinner("Exporting point clouds...");
    let report = pipeline.export();
    spinner.finish_and_clear();

    let status = |kind| {
        report
            .entry(kind)
            .map(|entry| match &entry.result {
                Ok(()) => entry.path.display().to_string(),
                Err(_) => "FAILED".to_string(),
            })
            .unwrap_or_default()
    };

    print_summary(
        "Replay Complete",
        &[
            ("Frames processed", summary.frames_processed.to_string()),
            ("Frames skipped", summary.frames_failed.to_string()),
            ("Frames aggregated", summary.frames_contributed.to_string()),
            ("Valid points", summary.last_frame_valid.to_string()),
            ("Total points", summary.last_frame_total.to_string()),
            ("Aggregate points", summary.aggregate_points.to_string()),
            ("Valid (all frames)", summary.extracted.valid_points.to_string()),
            ("Total (all frames)", summary.extracted.total_points.to_string()),
            ("Final x-offset", summary.final_x_offset.to_string()),
            ("Valid PLY", status(ArtifactKind::Valid)),
            ("Total PLY", status(ArtifactKind::Total)),
            ("Aggregate PLY", status(ArtifactKind::Aggregate)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} of {} exports failed", failed, report.entries.len());
    }
    Ok(())
}

fn cmd_inspect(file: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    let spinner = create_spinner("Loading point file...");

    let loaded = loaders::load_points(file);
    spinner.finish_and_clear();
    let points = loaded.with_context(|| format!("failed to load {}", file.display()))?;

    let validator = BoundsValidator::from_config(&config.validity);
    let valid: Vec<_> = points.iter().filter(|p| validator.is_valid(p)).collect();

    let bounds = valid.iter().fold(None, |acc: Option<([f32; 3], [f32; 3])>, p| {
        let v = p.to_array();
        Some(match acc {
            None => (v, v),
            Some((lo, hi)) => (
                [lo[0].min(v[0]), lo[1].min(v[1]), lo[2].min(v[2])],
                [hi[0].max(v[0]), hi[1].max(v[1]), hi[2].max(v[2])],
            ),
        })
    });
    let fmt_corner = |c: [f32; 3]| format!("({:.3}, {:.3}, {:.3})", c[0], c[1], c[2]);

    print_summary(
        "Inspect Complete",
        &[
            ("Input file", file.display().to_string()),
            ("Total points", points.len().to_string()),
            ("Valid points", valid.len().to_string()),
            (
                "Min (valid)",
                bounds.map(|(lo, _)| fmt_corner(lo)).unwrap_or_else(|| "-".to_string()),
            ),
            (
                "Max (valid)",
                bounds.map(|(_, hi)| fmt_corner(hi)).unwrap_or_else(|| "-".to_string()),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_default_config(path: &Path) -> anyhow::Result<()> {
    PipelineConfig::default()
        .to_yaml(path)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overrides() -> ReplayOverrides {
        ReplayOverrides {
            output_dir: None,
            frame_limit: None,
            no_gate: false,
            x_increment: None,
            y_scale: None,
            z_scale: None,
            max_frames: None,
            loop_source: false,
        }
    }

    #[test]
    fn test_cli_parses_replay() {
        let cli = Cli::try_parse_from([
            "sfm-cloud",
            "-vv",
            "replay",
            "frames",
            "--frame-limit",
            "2",
            "--y-scale",
            "-1",
            "--loop-source",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Replay {
                frames_dir,
                frame_limit,
                y_scale,
                loop_source,
                ..
            } => {
                assert_eq!(frames_dir, PathBuf::from("frames"));
                assert_eq!(frame_limit, Some(2));
                assert_eq!(y_scale, Some(-1.0));
                assert!(loop_source);
            }
            _ => panic!("Expected replay command"),
        }
    }

    #[test]
    fn test_overrides_keep_config_values_when_unset() {
        let mut config = PipelineConfig::default();
        config.aggregation.y_scale = 3.0;
        config.replay.max_frames = Some(7);

        let applied = no_overrides().apply(config.clone());

        assert_eq!(applied, config);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = ReplayOverrides {
            output_dir: Some(PathBuf::from("out")),
            frame_limit: Some(5),
            no_gate: true,
            x_increment: Some(0.25),
            max_frames: Some(9),
            ..no_overrides()
        };

        let applied = overrides.apply(PipelineConfig::default());

        assert_eq!(applied.aggregation.frame_limit, 5);
        assert!(!applied.aggregation.gate_enabled);
        assert_eq!(applied.aggregation.x_offset_increment, 0.25);
        assert_eq!(applied.export.output_dir, PathBuf::from("out"));
        assert_eq!(applied.replay.max_frames, Some(9));
    }

    #[test]
    fn test_interrupt_stops_looping_replay_and_exports() {
        let frames_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        crate::core::write_ply(
            &frames_dir.path().join("frame_1.ply"),
            &[crate::Point3D::new(1.0, 2.0, 3.0)],
        )
        .unwrap();

        let mut config = PipelineConfig::default();
        config.export.output_dir = out_dir.path().to_path_buf();
        config.replay.loop_source = true;

        let mut source = ReplaySource::from_dir(frames_dir.path()).unwrap();
        let mut pipeline = Pipeline::from_config(config);
        let on_interrupt = interrupt_handler(pipeline.stop_handle());
        let summary = pipeline.run(&mut source, |outcome| {
            if outcome.as_ref().is_ok_and(|frame| frame.frame == 3) {
                on_interrupt();
            }
        });

        assert_eq!(summary.stop_reason, Some(StopReason::Requested));
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.aggregate_points, 3);

        let report = pipeline.export();
        assert!(report.is_success());
        assert!(pipeline.config().export.aggregate_path().is_file());
    }
}
