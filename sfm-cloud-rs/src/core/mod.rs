//! Core data types and I/O operations.

pub mod loaders;
pub mod point;
pub mod writers;

pub use loaders::{load_cartesian_csv, load_ply, load_points, LoaderError};
pub use point::{BufferAccess, BufferError, Point3D, PointBuffer, VecBuffer};
pub use writers::{write_ply, write_ply_to, WriteError};
