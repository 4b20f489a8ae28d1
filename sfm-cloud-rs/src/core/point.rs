//! Point value type and the engine-owned point buffer interface.

use thiserror::Error;

/// A single 3D sample in engine (camera-relative) or world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns true if all three coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Returns the coordinates as an `[x, y, z]` array.
    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Point3D {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<(f32, f32, f32)> for Point3D {
    fn from((x, y, z): (f32, f32, f32)) -> Self {
        Self { x, y, z }
    }
}

/// Errors reported by an engine point buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("failed to query point buffer size: {0}")]
    Query(String),

    #[error("failed to acquire {requested} points from buffer: {reason}")]
    Acquire { requested: usize, reason: String },
}

/// Point cloud storage owned by the external engine.
///
/// Reading follows an acquire/release handshake: `acquire` maps a read-only
/// range, `points` is only meaningful between `acquire` and `release`, and
/// every successful `acquire` must be matched by exactly one `release`.
/// Callers should go through [`BufferAccess`] rather than pairing the calls
/// by hand.
pub trait PointBuffer {
    /// Number of points the engine currently holds.
    fn len(&self) -> Result<usize, BufferError>;

    /// Map the first `count` points for reading.
    fn acquire(&mut self, count: usize) -> Result<(), BufferError>;

    /// The mapped points.
    fn points(&self) -> &[Point3D];

    /// Unmap the range mapped by the last `acquire`.
    fn release(&mut self);
}

/// Scoped read access to a [`PointBuffer`]. Releases the buffer on drop.
pub struct BufferAccess<'a, B: PointBuffer + ?Sized> {
    buffer: &'a mut B,
}

impl<'a, B: PointBuffer + ?Sized> BufferAccess<'a, B> {
    /// Acquire `count` points. On failure nothing was mapped, so no release
    /// is issued.
    pub fn acquire(buffer: &'a mut B, count: usize) -> Result<Self, BufferError> {
        buffer.acquire(count)?;
        Ok(Self { buffer })
    }

    #[inline]
    pub fn points(&self) -> &[Point3D] {
        self.buffer.points()
    }
}

impl<B: PointBuffer + ?Sized> Drop for BufferAccess<'_, B> {
    fn drop(&mut self) {
        self.buffer.release();
    }
}

/// In-memory [`PointBuffer`], used for replayed frames and tests.
///
/// Tracks how many times it was acquired and released so the handshake can
/// be checked.
#[derive(Debug, Clone, Default)]
pub struct VecBuffer {
    points: Vec<Point3D>,
    mapped: usize,
    acquisitions: usize,
    releases: usize,
}

impl VecBuffer {
    pub fn new(points: Vec<Point3D>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Replace the buffer contents with the next frame's points.
    pub fn replace(&mut self, points: Vec<Point3D>) {
        self.points = points;
        self.mapped = 0;
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    /// True while a range is mapped.
    pub fn is_mapped(&self) -> bool {
        self.acquisitions > self.releases
    }
}

impl PointBuffer for VecBuffer {
    fn len(&self) -> Result<usize, BufferError> {
        Ok(self.points.len())
    }

    fn acquire(&mut self, count: usize) -> Result<(), BufferError> {
        if count > self.points.len() {
            return Err(BufferError::Acquire {
                requested: count,
                reason: format!("buffer holds only {} points", self.points.len()),
            });
        }
        self.mapped = count;
        self.acquisitions += 1;
        Ok(())
    }

    fn points(&self) -> &[Point3D] {
        &self.points[..self.mapped]
    }

    fn release(&mut self) {
        self.mapped = 0;
        self.releases += 1;
    }
}
