//! Frame source that replays per-frame point files from a directory.
//!
//! Stands in for the reconstruction engine: each file holds the point cloud
//! the engine reported for one frame. Files are ordered by the number in
//! their name (`frame_7.ply` before `frame_12.ply`), then by name.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::core::loaders::{load_points, FrameFormat};
use crate::core::point::{BufferError, Point3D, PointBuffer, VecBuffer};

use super::{FrameSource, FrameStatus};

/// Errors that can occur while setting up a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No PLY or CSV frame files found in directory: {0}")]
    NoFrames(PathBuf),
}

/// Result type for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Extract the frame number from a file stem, if it has one.
fn frame_number(pattern: &Regex, stem: &str) -> Option<u64> {
    pattern
        .captures(stem)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Discover frame files (`.ply` / `.csv`) in `directory`, in replay order.
pub fn find_frame_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(ReplayError::DirectoryNotFound(directory.to_path_buf()));
    }

    let entries = fs::read_dir(directory).map_err(|e| ReplayError::ReadDirectory {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let number_pattern = Regex::new(r"(\d+)\D*$").ok();

    let mut files: Vec<(Option<u64>, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && FrameFormat::from_path(path).is_some())
        .map(|path| {
            let number = path
                .file_stem()
                .and_then(|s| s.to_str())
                .zip(number_pattern.as_ref())
                .and_then(|(stem, pattern)| frame_number(pattern, stem));
            (number, path)
        })
        .collect();

    // Numbered files first, in numeric order; the rest by name.
    files.sort_by(|(na, pa), (nb, pb)| match (na, nb) {
        (Some(a), Some(b)) => a.cmp(b).then_with(|| pa.cmp(pb)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => pa.cmp(pb),
    });

    if files.is_empty() {
        return Err(ReplayError::NoFrames(directory.to_path_buf()));
    }

    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Point buffer for a replayed frame. A frame whose file failed to load
/// reports the load error when queried.
#[derive(Debug, Default)]
pub struct ReplayBuffer {
    inner: VecBuffer,
    load_error: Option<String>,
}

impl ReplayBuffer {
    fn set_frame(&mut self, points: Vec<Point3D>) {
        self.inner.replace(points);
        self.load_error = None;
    }

    fn set_error(&mut self, message: String) {
        self.inner.replace(Vec::new());
        self.load_error = Some(message);
    }

    pub fn acquisitions(&self) -> usize {
        self.inner.acquisitions()
    }

    pub fn releases(&self) -> usize {
        self.inner.releases()
    }
}

impl PointBuffer for ReplayBuffer {
    fn len(&self) -> std::result::Result<usize, BufferError> {
        match &self.load_error {
            Some(message) => Err(BufferError::Query(message.clone())),
            None => self.inner.len(),
        }
    }

    fn acquire(&mut self, count: usize) -> std::result::Result<(), BufferError> {
        self.inner.acquire(count)
    }

    fn points(&self) -> &[Point3D] {
        self.inner.points()
    }

    fn release(&mut self) {
        self.inner.release()
    }
}

/// Replays a fixed list of frame files.
pub struct ReplaySource {
    files: Vec<PathBuf>,
    cursor: usize,
    buffer: ReplayBuffer,
}

impl ReplaySource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            cursor: 0,
            buffer: ReplayBuffer::default(),
        }
    }

    /// Replay every frame file found in `directory`.
    pub fn from_dir<P: AsRef<Path>>(directory: P) -> Result<Self> {
        find_frame_files(directory.as_ref()).map(Self::new)
    }

    pub fn num_frames(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for ReplaySource {
    type Buffer = ReplayBuffer;

    fn fetch(&mut self) -> FrameStatus {
        let Some(path) = self.files.get(self.cursor) else {
            return FrameStatus::Closed;
        };
        self.cursor += 1;

        match load_points(path) {
            Ok(points) => {
                debug!("Loaded {} points from {}", points.len(), path.display());
                self.buffer.set_frame(points);
            }
            Err(e) => {
                warn!("Failed to load frame {}: {}", path.display(), e);
                self.buffer
                    .set_error(format!("{}: {}", path.display(), e));
            }
        }

        FrameStatus::Ready
    }

    fn point_buffer(&mut self) -> &mut ReplayBuffer {
        &mut self.buffer
    }

    fn reopen(&mut self) -> bool {
        self.cursor = 0;
        !self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::writers::write_ply;
    use crate::pipeline::Pipeline;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, points: &[Point3D]) -> PathBuf {
        let path = dir.join(name);
        write_ply(&path, points).unwrap();
        path
    }

    #[test]
    fn test_frame_number() {
        let pattern = Regex::new(r"(\d+)\D*$").unwrap();
        assert_eq!(frame_number(&pattern, "frame_0012"), Some(12));
        assert_eq!(frame_number(&pattern, "cloud-3-final"), Some(3));
        assert_eq!(frame_number(&pattern, "cloud"), None);
    }

    #[test]
    fn test_find_frame_files_numeric_order() {
        let temp_dir = TempDir::new().unwrap();
        write_frame(temp_dir.path(), "frame_10.ply", &[]);
        write_frame(temp_dir.path(), "frame_2.ply", &[]);
        write_frame(temp_dir.path(), "frame_1.ply", &[]);
        fs::write(temp_dir.path().join("extra.csv"), "x,y,z\n").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let files = find_frame_files(temp_dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["frame_1.ply", "frame_2.ply", "frame_10.ply", "extra.csv"]);
    }

    #[test]
    fn test_find_frame_files_errors() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            find_frame_files(temp_dir.path()),
            Err(ReplayError::NoFrames(_))
        ));
        assert!(matches!(
            find_frame_files(&temp_dir.path().join("missing")),
            Err(ReplayError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_replay_source_fetch_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        write_frame(temp_dir.path(), "frame_1.ply", &[Point3D::new(1.0, 2.0, 3.0)]);
        write_frame(temp_dir.path(), "frame_2.ply", &[]);

        let mut source = ReplaySource::from_dir(temp_dir.path()).unwrap();
        assert_eq!(source.num_frames(), 2);

        assert_eq!(source.fetch(), FrameStatus::Ready);
        assert_eq!(source.point_buffer().len(), Ok(1));
        assert_eq!(source.fetch(), FrameStatus::Ready);
        assert_eq!(source.point_buffer().len(), Ok(0));
        assert_eq!(source.fetch(), FrameStatus::Closed);

        assert!(source.reopen());
        assert_eq!(source.fetch(), FrameStatus::Ready);
        assert_eq!(source.point_buffer().len(), Ok(1));
    }

    #[test]
    fn test_unreadable_frame_reports_query_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("frame_1.ply"), "not a ply\n").unwrap();

        let mut source = ReplaySource::from_dir(temp_dir.path()).unwrap();
        assert_eq!(source.fetch(), FrameStatus::Ready);

        assert!(matches!(
            source.point_buffer().len(),
            Err(BufferError::Query(_))
        ));
    }

    #[test]
    fn test_oversized_header_frame_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_frame(temp_dir.path(), "frame_1.ply", &[Point3D::new(0.0, 1.0, 2.0)]);
        fs::write(
            temp_dir.path().join("frame_2.ply"),
            format!(
                "ply\nformat ascii 1.0\nelement vertex {}\nproperty float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n",
                usize::MAX
            ),
        )
        .unwrap();
        write_frame(temp_dir.path(), "frame_3.ply", &[Point3D::new(0.0, 1.0, 2.0)]);

        let mut source = ReplaySource::from_dir(temp_dir.path()).unwrap();
        let mut pipeline = Pipeline::from_config(PipelineConfig::default());
        let summary = pipeline.run(&mut source, |_| {});

        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.frames_failed, 1);
        assert_eq!(summary.aggregate_points, 2);
    }
}
