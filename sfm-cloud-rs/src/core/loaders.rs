//! Loaders for point cloud frame files.
//!
//! This module provides parsers for:
//! - ASCII PLY files with `x`, `y`, `z` vertex properties (extra properties
//!   such as colors are ignored)
//! - Cartesian CSV files with `x`, `y`, `z` columns

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::point::Point3D;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported frame file: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Frame file formats understood by [`load_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Ply,
    Csv,
}

impl FrameFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ply" => Some(Self::Ply),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Load a frame file, dispatching on its extension.
pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<Point3D>> {
    let path = path.as_ref();
    match FrameFormat::from_path(path) {
        Some(FrameFormat::Ply) => load_ply(path),
        Some(FrameFormat::Csv) => load_cartesian_csv(path),
        None => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Parse one coordinate token. `nan`, `inf` and `-inf` are accepted in any
/// case so frames containing non-finite samples survive a round trip.
fn parse_coord(token: &str, axis: &str) -> Result<f32> {
    token
        .trim()
        .parse::<f32>()
        .or_else(|_| match token.trim().to_ascii_lowercase().as_str() {
            "nan" | "-nan" => Ok(f32::NAN),
            "inf" | "infinity" => Ok(f32::INFINITY),
            "-inf" | "-infinity" => Ok(f32::NEG_INFINITY),
            _ => Err(()),
        })
        .map_err(|_| LoaderError::ParseError(format!("Invalid {} value: {}", axis, token)))
}

/// Upper bound on vertices reserved up front from a PLY header.
const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

/// Load points from an ASCII PLY file.
///
/// Only the `vertex` element is read. Properties other than `x`, `y` and
/// `z` are skipped; an empty vertex element yields an empty vector.
///
/// # Errors
///
/// Returns an error if the file is not an ASCII PLY, lacks an `x`/`y`/`z`
/// property, or holds fewer vertex lines than its header declares.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<Vec<Point3D>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // Check PLY magic number
    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if first_line.trim() != "ply" {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    // Parse header
    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut in_vertex_element = false;
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("format") && !stripped.contains("ascii") {
            return Err(LoaderError::InvalidPly(format!(
                "unsupported encoding: {}",
                stripped
            )));
        } else if stripped.starts_with("element") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            in_vertex_element = parts.get(1) == Some(&"vertex");
            if in_vertex_element {
                num_vertices = parts.get(2).and_then(|s| s.parse().ok());
            }
        } else if stripped.starts_with("property") {
            if in_vertex_element {
                if let Some(name) = stripped.split_whitespace().last() {
                    prop_names.push(name.to_string());
                }
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    // Build property index map
    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let index_of = |axis: &str| {
        prop_idx
            .get(axis)
            .copied()
            .ok_or_else(|| LoaderError::MissingColumns(axis.to_string()))
    };
    let x_idx = index_of("x")?;
    let y_idx = index_of("y")?;
    let z_idx = index_of("z")?;

    // The header count is untrusted; grow past the cap as lines arrive.
    let mut points = Vec::with_capacity(num_vertices.min(MAX_PREALLOCATED_VERTICES));
    for line in lines {
        if points.len() >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        points.push(Point3D::new(
            parse_coord(values[x_idx], "x")?,
            parse_coord(values[y_idx], "y")?,
            parse_coord(values[z_idx], "z")?,
        ));
    }

    if points.len() < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices,
            points.len()
        )));
    }

    Ok(points)
}

/// Load points from a CSV file with x, y, z columns.
///
/// Columns are looked up by name (case-insensitive); without named columns
/// the first three are used.
pub fn load_cartesian_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Point3D>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let x_idx = col_map.get("x").copied().unwrap_or(0);
    let y_idx = col_map.get("y").copied().unwrap_or(1);
    let z_idx = col_map.get("z").copied().unwrap_or(2);

    let mut points = Vec::new();
    for result in reader.records() {
        let record = result?;

        let field = |idx: usize, axis: &str| {
            record
                .get(idx)
                .ok_or_else(|| LoaderError::MissingColumns(axis.to_string()))
                .and_then(|s| parse_coord(s, axis))
        };

        points.push(Point3D::new(
            field(x_idx, "x")?,
            field(y_idx, "y")?,
            field(z_idx, "z")?,
        ));
    }

    Ok(points)
}
