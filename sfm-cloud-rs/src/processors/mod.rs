//! Per-frame processing stages.

pub mod aggregation;
pub mod extraction;
pub mod validation;

// Re-export key types for convenience
pub use aggregation::{AggregateSnapshot, AggregationState, Aggregator};
pub use extraction::{ExtractionError, ExtractorStats, FrameCloud, FrameCloudExtractor};
pub use validation::{BoundsValidator, PointValidator};
