//! Configuration types for the point cloud pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters of the cross-frame aggregation transform and frame gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Added to the x-offset once per processed frame
    #[serde(default = "default_x_offset_increment")]
    pub x_offset_increment: f32,

    /// Starting x-offset before the first frame
    #[serde(default)]
    pub initial_x_offset: f32,

    /// Multiplier applied to y coordinates
    #[serde(default = "default_scale")]
    pub y_scale: f32,

    /// Multiplier applied to z coordinates
    #[serde(default = "default_scale")]
    pub z_scale: f32,

    /// Number of frames that contribute points to the aggregate
    #[serde(default = "default_frame_limit")]
    pub frame_limit: usize,

    /// When false every frame contributes regardless of `frame_limit`
    #[serde(default = "default_gate_enabled")]
    pub gate_enabled: bool,
}

fn default_x_offset_increment() -> f32 {
    0.5
}

fn default_scale() -> f32 {
    1.0
}

fn default_frame_limit() -> usize {
    50
}

fn default_gate_enabled() -> bool {
    true
}

impl AggregationConfig {
    /// The gate actually in force: `None` when disabled or set to zero.
    pub fn effective_frame_limit(&self) -> Option<usize> {
        if self.gate_enabled && self.frame_limit > 0 {
            Some(self.frame_limit)
        } else {
            None
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            x_offset_increment: default_x_offset_increment(),
            initial_x_offset: 0.0,
            y_scale: default_scale(),
            z_scale: default_scale(),
            frame_limit: default_frame_limit(),
            gate_enabled: default_gate_enabled(),
        }
    }
}

/// Bounds used by the default point validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityConfig {
    /// Largest accepted absolute value for any coordinate
    #[serde(default = "default_max_abs_coord")]
    pub max_abs_coord: f32,

    /// Points with z at or below this depth are rejected
    #[serde(default)]
    pub min_depth: Option<f32>,
}

fn default_max_abs_coord() -> f32 {
    1.0e4
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            max_abs_coord: default_max_abs_coord(),
            min_depth: None,
        }
    }
}

/// Where the three shutdown artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the PLY files are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_valid_file")]
    pub valid_file: String,

    #[serde(default = "default_total_file")]
    pub total_file: String,

    #[serde(default = "default_aggregate_file")]
    pub aggregate_file: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_valid_file() -> String {
    "output_valid.ply".to_string()
}

fn default_total_file() -> String {
    "output_total.ply".to_string()
}

fn default_aggregate_file() -> String {
    "output_aggregate.ply".to_string()
}

impl ExportConfig {
    pub fn valid_path(&self) -> PathBuf {
        self.output_dir.join(&self.valid_file)
    }

    pub fn total_path(&self) -> PathBuf {
        self.output_dir.join(&self.total_file)
    }

    pub fn aggregate_path(&self) -> PathBuf {
        self.output_dir.join(&self.aggregate_file)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            valid_file: default_valid_file(),
            total_file: default_total_file(),
            aggregate_file: default_aggregate_file(),
        }
    }
}

/// Frame loop behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Reopen the frame source when it closes instead of stopping
    #[serde(default)]
    pub loop_source: bool,

    /// Stop after this many processed frames
    #[serde(default)]
    pub max_frames: Option<usize>,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub validity: ValidityConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
