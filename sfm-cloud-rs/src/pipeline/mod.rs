//! Frame loop orchestration.
//!
//! The [`Pipeline`] owns the extractor, the aggregator and the aggregation
//! state. Each ready frame is extracted, then the aggregator advances and
//! accepts the frame's valid points. On shutdown the last frame and the
//! aggregate are exported through [`export`].

pub mod export;
pub mod replay;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::core::point::{Point3D, PointBuffer};
use crate::processors::aggregation::{AggregationState, Aggregator};
use crate::processors::extraction::{
    ExtractionError, ExtractorStats, FrameCloud, FrameCloudExtractor,
};
use crate::processors::validation::{BoundsValidator, PointValidator};

pub use export::{export_snapshot, ArtifactKind, ExportEntry, ExportReport, ExportSnapshot};
pub use replay::{ReplayBuffer, ReplayError, ReplaySource};

/// Result of asking a frame source for the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A new frame is available in the source's point buffer.
    Ready,
    /// No frame yet; ask again.
    Timeout,
    /// The source has no more frames.
    Closed,
}

/// Supplier of per-frame point clouds (the reconstruction engine).
pub trait FrameSource {
    type Buffer: PointBuffer;

    /// Advance to the next frame.
    fn fetch(&mut self) -> FrameStatus;

    /// Point buffer holding the current frame's cloud.
    fn point_buffer(&mut self) -> &mut Self::Buffer;

    /// Restart from the first frame. Returns false if the source cannot be
    /// reopened.
    fn reopen(&mut self) -> bool {
        false
    }
}

/// Cloneable flag used to stop a running pipeline at the next frame
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-frame result reported to `run` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    /// One-based index of the frame among all processed frames.
    pub frame: usize,
    pub valid: usize,
    pub total: usize,
    /// Points added to the aggregate by this frame.
    pub appended: usize,
}

/// Why the frame loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SourceClosed,
    FrameLimit,
    Requested,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames_processed: usize,
    pub frames_failed: usize,
    pub timeouts: usize,
    pub reopens: usize,
    /// Valid points in the last successfully extracted frame.
    pub last_frame_valid: usize,
    /// All points in the last successfully extracted frame.
    pub last_frame_total: usize,
    /// Counters summed over every extracted frame.
    pub extracted: ExtractorStats,
    pub aggregate_points: usize,
    pub frames_contributed: usize,
    pub final_x_offset: f32,
    pub stop_reason: Option<StopReason>,
}

/// Owns all per-run state of the accumulation pipeline.
pub struct Pipeline<V> {
    config: PipelineConfig,
    extractor: FrameCloudExtractor<V>,
    aggregator: Aggregator,
    state: AggregationState,
    last_frame: FrameCloud,
    frames_processed: usize,
    frames_failed: usize,
    timeouts: usize,
    reopens: usize,
    stop_reason: Option<StopReason>,
    stop: StopHandle,
}

impl Pipeline<BoundsValidator> {
    /// Pipeline using the bounds validator described by `config.validity`.
    pub fn from_config(config: PipelineConfig) -> Self {
        let validator = BoundsValidator::from_config(&config.validity);
        Self::new(config, validator)
    }
}

impl<V: PointValidator> Pipeline<V> {
    pub fn new(config: PipelineConfig, validator: V) -> Self {
        let aggregator = Aggregator::new(&config.aggregation);
        let state = Aggregator::initial_state(&config.aggregation);
        Self {
            config,
            extractor: FrameCloudExtractor::new(validator),
            aggregator,
            state,
            last_frame: FrameCloud::default(),
            frames_processed: 0,
            frames_failed: 0,
            timeouts: 0,
            reopens: 0,
            stop_reason: None,
            stop: StopHandle::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that stops [`Pipeline::run`] at the next frame boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> &AggregationState {
        &self.state
    }

    /// Last successfully extracted frame.
    pub fn last_frame(&self) -> &FrameCloud {
        &self.last_frame
    }

    /// Process the frame currently held in `buffer`.
    ///
    /// If extraction fails the frame still advances the aggregator (the rig
    /// kept moving) but contributes no points, and the previous frame stays
    /// the export frame.
    pub fn process_frame<B: PointBuffer + ?Sized>(
        &mut self,
        buffer: &mut B,
    ) -> Result<FrameOutcome, ExtractionError> {
        self.frames_processed += 1;
        let extracted = self.extractor.extract(buffer);
        self.aggregator.advance(&mut self.state);

        let cloud = match extracted {
            Ok(cloud) => cloud,
            Err(e) => {
                self.frames_failed += 1;
                warn!("Skipping frame {}: {}", self.frames_processed, e);
                return Err(e);
            }
        };

        let appended = self.aggregator.accept(&mut self.state, &cloud.valid_points);
        let outcome = FrameOutcome {
            frame: self.frames_processed,
            valid: cloud.valid_count(),
            total: cloud.total_count(),
            appended,
        };
        self.last_frame = cloud;

        Ok(outcome)
    }

    /// Drive the pipeline until the source closes, `replay.max_frames`
    /// frames have been processed, or a stop is requested.
    ///
    /// `on_frame` is called after every processed frame, including frames
    /// whose extraction failed.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> RunSummary
    where
        S: FrameSource,
        F: FnMut(&Result<FrameOutcome, ExtractionError>),
    {
        let max_frames = self.config.replay.max_frames;
        info!(
            "Starting frame loop (gate: {:?}, max frames: {:?})",
            self.aggregator.frame_limit(),
            max_frames
        );

        let reason = loop {
            if self.stop.is_stop_requested() {
                break StopReason::Requested;
            }
            if max_frames.is_some_and(|max| self.frames_processed >= max) {
                break StopReason::FrameLimit;
            }

            match source.fetch() {
                FrameStatus::Timeout => {
                    self.timeouts += 1;
                    continue;
                }
                FrameStatus::Closed => {
                    if self.config.replay.loop_source && source.reopen() {
                        self.reopens += 1;
                        debug!("Frame source reopened");
                        continue;
                    }
                    break StopReason::SourceClosed;
                }
                FrameStatus::Ready => {}
            }

            let outcome = self.process_frame(source.point_buffer());
            on_frame(&outcome);
        };

        self.stop_reason = Some(reason);
        let summary = self.summary();
        info!(
            "Frame loop finished ({:?}): {} frames, {} failed, {} aggregate points",
            reason, summary.frames_processed, summary.frames_failed, summary.aggregate_points
        );
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames_processed: self.frames_processed,
            frames_failed: self.frames_failed,
            timeouts: self.timeouts,
            reopens: self.reopens,
            last_frame_valid: self.last_frame.valid_count(),
            last_frame_total: self.last_frame.total_count(),
            extracted: self.extractor.stats(),
            aggregate_points: self.state.len(),
            frames_contributed: self.state.frames_contributed(),
            final_x_offset: self.state.x_offset(),
            stop_reason: self.stop_reason,
        }
    }

    /// Consistent view of the three export sequences.
    pub fn snapshot(&self) -> ExportSnapshot<'_> {
        ExportSnapshot {
            valid: &self.last_frame.valid_points,
            total: &self.last_frame.all_points,
            aggregate: self.aggregator.snapshot(&self.state).points,
        }
    }

    /// Write the valid, total and aggregate PLY files.
    pub fn export(&self) -> ExportReport {
        info!(
            "valid points: {}, total points: {}, aggregate points: {}",
            self.last_frame.valid_count(),
            self.last_frame.total_count(),
            self.state.len()
        );
        export_snapshot(&self.snapshot(), &self.config.export)
    }

    /// Accumulated world-space points.
    pub fn aggregate(&self) -> &[Point3D] {
        self.aggregator.snapshot(&self.state).points
    }
}
