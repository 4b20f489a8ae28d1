//! Point cloud accumulation and export for structure-from-motion output.
//!
//! This crate provides tools for:
//! - Filtering each frame's point cloud down to valid samples
//! - Aggregating valid points across frames into a world-space cloud,
//!   shifted along x per frame and scaled in y and z
//! - Exporting the final frame's valid and total points and the aggregate
//!   as ASCII PLY files
//!
//! The reconstruction engine is abstracted behind [`crate::core::point::PointBuffer`]
//! and [`pipeline::FrameSource`]; [`pipeline::ReplaySource`] replays frames
//! from files.
//!
//! # Example
//!
//! ```no_run
//! use sfm_cloud::pipeline::{Pipeline, ReplaySource};
//! use sfm_cloud::PipelineConfig;
//!
//! let mut source = ReplaySource::from_dir("frames").unwrap();
//! let mut pipeline = Pipeline::from_config(PipelineConfig::default());
//! pipeline.run(&mut source, |_| {});
//! let report = pipeline.export();
//! assert!(report.is_success());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod processors;

pub use config::{AggregationConfig, ExportConfig, PipelineConfig, ReplayConfig, ValidityConfig};
pub use crate::core::point::{Point3D, PointBuffer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
