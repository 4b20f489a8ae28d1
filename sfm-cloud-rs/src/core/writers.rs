//! ASCII PLY writer for point clouds.
//!
//! Output is the vertex-only ASCII variant: a fixed header declaring `x`,
//! `y` and `z` float properties, followed by one `x y z` line per point.
//! Downstream tooling relies on this exact header wording and field order.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::point::Point3D;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write the PLY header and vertex lines for `points` to any writer.
///
/// Coordinates use the shortest representation that round-trips the `f32`
/// value, so `1.5` is written as `1.5` and `2.0` as `2`.
pub fn write_ply_to<W: Write>(writer: &mut W, points: &[Point3D]) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "end_header")?;

    for p in points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }

    Ok(())
}

/// Write points to an ASCII PLY file, creating or truncating it.
///
/// An empty slice produces a header declaring `element vertex 0` and no
/// vertex lines.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `points` - Points to write, in output order
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use sfm_cloud::core::point::Point3D;
/// use sfm_cloud::core::writers::write_ply;
/// use std::path::Path;
///
/// let points = vec![Point3D::new(1.0, 2.0, 3.0)];
/// write_ply(Path::new("output.ply"), &points).unwrap();
/// ```
pub fn write_ply(path: &Path, points: &[Point3D]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let write_err = |e: std::io::Error| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    };

    write_ply_to(&mut writer, points).map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_points() -> Vec<Point3D> {
        vec![
            Point3D::new(1.5, 2.0, 3.0),
            Point3D::new(-0.25, 0.0, 10.0),
            Point3D::new(4.0, 5.0, 6.0),
        ]
    }

    #[test]
    fn test_write_ply_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ply");

        write_ply(&path, &create_test_points()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            &lines[..7],
            &[
                "ply",
                "format ascii 1.0",
                "element vertex 3",
                "property float x",
                "property float y",
                "property float z",
                "end_header",
            ]
        );
        assert_eq!(lines[7], "1.5 2 3");
        assert_eq!(lines[8], "-0.25 0 10");
        assert_eq!(lines[9], "4 5 6");
        assert_eq!(lines.len(), 10);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_write_ply_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.ply");

        write_ply(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[2], "element vertex 0");
        assert_eq!(lines.last(), Some(&"end_header"));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_write_ply_identical_across_paths() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.ply");
        let b = dir.path().join("b.ply");
        let points = create_test_points();

        write_ply(&a, &points).unwrap();
        write_ply(&b, &points).unwrap();

        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_write_ply_overwrites_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ply");

        write_ply(&path, &create_test_points()).unwrap();
        write_ply(&path, &[Point3D::new(7.0, 8.0, 9.0)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("element vertex 1\n"));
        assert_eq!(content.lines().count(), 8);
    }

    #[test]
    fn test_write_ply_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir").join("nested").join("test.ply");

        write_ply(&path, &create_test_points()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_ply_unwritable_path() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a file.
        let result = write_ply(dir.path(), &create_test_points());

        match result {
            Err(WriteError::CreateFile { path, .. }) => {
                assert_eq!(path, dir.path().display().to_string());
            }
            other => panic!("Expected CreateFile error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_ply_to_buffer() {
        let mut buf = Vec::new();
        write_ply_to(&mut buf, &[Point3D::new(0.5, 0.5, 0.5)]).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("end_header\n0.5 0.5 0.5\n"));
    }

    #[test]
    fn test_write_ply_number_format() {
        // Offset built up by repeated inexact increments.
        let mut offset = 0.0f32;
        for _ in 0..7 {
            offset += 0.1;
        }
        let points = [
            Point3D::new(offset, 1.0e10, 1.0e-7),
            Point3D::new(-2.0, 0.25, 100.0),
        ];

        let mut buf = Vec::new();
        write_ply_to(&mut buf, &points).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let body: Vec<&str> = text.lines().skip_while(|l| *l != "end_header").skip(1).collect();

        let first: Vec<&str> = body[0].split(' ').collect();
        assert_eq!(first[0], offset.to_string());
        assert_eq!(first[0].parse::<f32>().unwrap().to_bits(), offset.to_bits());
        assert_eq!(first[1], "10000000000");
        assert_eq!(first[2], "0.0000001");
        assert_eq!(body[1], "-2 0.25 100");
        assert!(!body.join(" ").contains('e'));
    }
}
