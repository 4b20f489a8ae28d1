//! Per-point validity predicates.

use crate::config::ValidityConfig;
use crate::core::point::Point3D;

/// Decides whether a point is a usable sample.
///
/// Implementations must be pure functions of the coordinates; the extractor
/// calls `is_valid` exactly once per point per frame.
pub trait PointValidator {
    fn is_valid(&self, point: &Point3D) -> bool;
}

impl<F> PointValidator for F
where
    F: Fn(&Point3D) -> bool,
{
    #[inline]
    fn is_valid(&self, point: &Point3D) -> bool {
        self(point)
    }
}

/// Accepts finite points inside an axis-aligned cube, optionally in front of
/// a minimum depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsValidator {
    max_abs: f32,
    min_depth: Option<f32>,
}

impl BoundsValidator {
    pub fn new(max_abs: f32, min_depth: Option<f32>) -> Self {
        Self { max_abs, min_depth }
    }

    pub fn from_config(config: &ValidityConfig) -> Self {
        Self::new(config.max_abs_coord, config.min_depth)
    }
}

impl Default for BoundsValidator {
    fn default() -> Self {
        Self::from_config(&ValidityConfig::default())
    }
}

impl PointValidator for BoundsValidator {
    fn is_valid(&self, p: &Point3D) -> bool {
        if !p.is_finite() {
            return false;
        }
        if p.x.abs() > self.max_abs || p.y.abs() > self.max_abs || p.z.abs() > self.max_abs {
            return false;
        }
        match self.min_depth {
            Some(depth) => p.z > depth,
            None => true,
        }
    }
}
