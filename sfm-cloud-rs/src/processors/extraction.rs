//! Per-frame point cloud extraction.
//!
//! Reads the engine's current point buffer once, under a scoped
//! acquire/release, and splits it into the full sequence and the subset that
//! passes validation.

use log::debug;
use thiserror::Error;

use crate::core::point::{BufferAccess, BufferError, Point3D, PointBuffer};

use super::validation::PointValidator;

/// Errors that can occur while reading a frame's point buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("point buffer access failed: {0}")]
    Buffer(#[from] BufferError),

    #[error("point buffer reported {expected} points but mapped {mapped}")]
    ShortRead { expected: usize, mapped: usize },
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// The two point sequences extracted from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameCloud {
    /// Every sample, verbatim and in buffer order.
    pub all_points: Vec<Point3D>,
    /// Samples that passed validation, in buffer order.
    pub valid_points: Vec<Point3D>,
}

impl FrameCloud {
    pub fn total_count(&self) -> usize {
        self.all_points.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_points.is_empty()
    }
}

/// Running counters across all extracted frames. Reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    pub frames: usize,
    pub valid_points: usize,
    pub total_points: usize,
}

/// Converts engine point buffers into [`FrameCloud`]s.
pub struct FrameCloudExtractor<V> {
    validator: V,
    stats: ExtractorStats,
}

impl<V: PointValidator> FrameCloudExtractor<V> {
    pub fn new(validator: V) -> Self {
        Self {
            validator,
            stats: ExtractorStats::default(),
        }
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Cross-frame counters accumulated so far.
    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }

    /// Read the buffer's current contents.
    ///
    /// An empty buffer yields an empty [`FrameCloud`] without acquiring it.
    /// Otherwise the buffer is acquired for exactly its reported length and
    /// released before returning, including on error or unwind.
    pub fn extract<B: PointBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<FrameCloud> {
        let count = buffer.len()?;
        if count == 0 {
            self.stats.frames += 1;
            return Ok(FrameCloud::default());
        }

        let cloud = {
            let access = BufferAccess::acquire(buffer, count)?;
            let points = access.points();
            if points.len() != count {
                return Err(ExtractionError::ShortRead {
                    expected: count,
                    mapped: points.len(),
                });
            }
            self.split(points)
        };

        self.stats.frames += 1;
        self.stats.valid_points += cloud.valid_count();
        self.stats.total_points += cloud.total_count();

        debug!(
            "Extracted frame: {} valid of {} points",
            cloud.valid_count(),
            cloud.total_count()
        );

        Ok(cloud)
    }

    fn split(&self, points: &[Point3D]) -> FrameCloud {
        let mut all_points = Vec::with_capacity(points.len());
        let mut valid_points = Vec::with_capacity(points.len());

        for &p in points {
            if self.validator.is_valid(&p) {
                valid_points.push(p);
            }
            all_points.push(p);
        }

        FrameCloud {
            all_points,
            valid_points,
        }
    }
}
