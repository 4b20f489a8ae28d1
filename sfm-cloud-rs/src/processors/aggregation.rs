//! Cross-frame aggregation of valid points into a world-space cloud.
//!
//! Each processed frame shifts the x-offset by a fixed increment, modelling
//! a capture rig moving at constant velocity along x. Valid points of frames
//! inside the frame gate are translated by the current offset, scaled in y
//! and z, and appended to a cloud that only ever grows.

use log::{debug, info};

use crate::config::AggregationConfig;
use crate::core::point::Point3D;

/// Accumulated world-space points plus the running transform parameters.
///
/// Owned by the pipeline and mutated only through [`Aggregator::advance`]
/// and [`Aggregator::accept`]. The two must be called in that order, once
/// per frame, from one thread.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationState {
    points: Vec<Point3D>,
    x_offset: f32,
    frame_count: usize,
    frames_contributed: usize,
}

impl AggregationState {
    pub fn new(initial_x_offset: f32) -> Self {
        Self {
            points: Vec::new(),
            x_offset: initial_x_offset,
            frame_count: 0,
            frames_contributed: 0,
        }
    }

    /// Number of accumulated points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Offset applied to the most recently advanced frame.
    pub fn x_offset(&self) -> f32 {
        self.x_offset
    }

    /// Number of `advance` calls so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Frames whose points were appended (frames with no valid points
    /// inside the gate still count).
    pub fn frames_contributed(&self) -> usize {
        self.frames_contributed
    }
}

/// Read-only view of the aggregate cloud.
#[derive(Debug, Clone, Copy)]
pub struct AggregateSnapshot<'a> {
    pub points: &'a [Point3D],
}

impl AggregateSnapshot<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Applies the per-frame offset/scale transform and the frame gate.
#[derive(Debug, Clone)]
pub struct Aggregator {
    x_offset_increment: f32,
    y_scale: f32,
    z_scale: f32,
    frame_limit: Option<usize>,
}

impl Aggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            x_offset_increment: config.x_offset_increment,
            y_scale: config.y_scale,
            z_scale: config.z_scale,
            frame_limit: config.effective_frame_limit(),
        }
    }

    /// Fresh state for this aggregator's configuration.
    pub fn initial_state(config: &AggregationConfig) -> AggregationState {
        AggregationState::new(config.initial_x_offset)
    }

    /// Gate in force, `None` when every frame contributes.
    pub fn frame_limit(&self) -> Option<usize> {
        self.frame_limit
    }

    /// Start a new frame: bump the frame counter and move the offset.
    pub fn advance(&self, state: &mut AggregationState) {
        state.frame_count += 1;
        state.x_offset += self.x_offset_increment;
    }

    /// True if the frame most recently advanced may still add points.
    ///
    /// The gate compares the zero-based index of the current frame, so a
    /// limit of `n` admits exactly the first `n` frames.
    pub fn is_open(&self, state: &AggregationState) -> bool {
        match self.frame_limit {
            Some(limit) => state.frame_count <= limit,
            None => true,
        }
    }

    /// Append the transformed `valid_points` if the gate is open. Returns the
    /// number of points appended.
    pub fn accept(&self, state: &mut AggregationState, valid_points: &[Point3D]) -> usize {
        if !self.is_open(state) {
            if let Some(limit) = self.frame_limit.filter(|&l| l + 1 == state.frame_count) {
                info!(
                    "Frame limit of {} reached; aggregate frozen at {} points",
                    limit,
                    state.len()
                );
            }
            return 0;
        }

        let offset = state.x_offset;
        state.points.extend(valid_points.iter().map(|p| Point3D {
            x: p.x + offset,
            y: p.y * self.y_scale,
            z: p.z * self.z_scale,
        }));
        state.frames_contributed += 1;

        debug!(
            "Frame {}: appended {} points at x-offset {} (aggregate {})",
            state.frame_count,
            valid_points.len(),
            offset,
            state.len()
        );

        valid_points.len()
    }

    /// Read-only view of the aggregate.
    pub fn snapshot<'a>(&self, state: &'a AggregationState) -> AggregateSnapshot<'a> {
        AggregateSnapshot {
            points: &state.points,
        }
    }
}
