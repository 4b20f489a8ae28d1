//! Shutdown export of the valid, total and aggregate clouds.

use std::fmt;
use std::path::PathBuf;

use log::{error, info};

use crate::config::ExportConfig;
use crate::core::point::Point3D;
use crate::core::writers::{write_ply, WriteError};

/// The three point sequences written at shutdown.
#[derive(Debug, Clone, Copy)]
pub struct ExportSnapshot<'a> {
    /// Valid points of the final frame.
    pub valid: &'a [Point3D],
    /// All points of the final frame.
    pub total: &'a [Point3D],
    /// Cross-frame aggregate.
    pub aggregate: &'a [Point3D],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Valid,
    Total,
    Aggregate,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Valid => "valid",
            ArtifactKind::Total => "total",
            ArtifactKind::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

/// Outcome of writing one artifact.
#[derive(Debug)]
pub struct ExportEntry {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub points: usize,
    pub result: Result<(), WriteError>,
}

/// Outcomes of all three writes, in write order.
#[derive(Debug)]
pub struct ExportReport {
    pub entries: Vec<ExportEntry>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn entry(&self, kind: ArtifactKind) -> Option<&ExportEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

/// Write the snapshot's three sequences to the configured paths.
///
/// Every write is attempted even if an earlier one failed; failures are
/// logged and returned in the report rather than aborting.
pub fn export_snapshot(snapshot: &ExportSnapshot<'_>, config: &ExportConfig) -> ExportReport {
    let jobs = [
        (ArtifactKind::Valid, config.valid_path(), snapshot.valid),
        (ArtifactKind::Total, config.total_path(), snapshot.total),
        (ArtifactKind::Aggregate, config.aggregate_path(), snapshot.aggregate),
    ];

    let entries = jobs
        .into_iter()
        .map(|(kind, path, points)| {
            let result = write_ply(&path, points);
            match &result {
                Ok(()) => info!("Wrote {} points ({}) to {}", points.len(), kind, path.display()),
                Err(e) => error!("Failed to export {} cloud: {}", kind, e),
            }
            ExportEntry {
                kind,
                path,
                points: points.len(),
                result,
            }
        })
        .collect();

    ExportReport { entries }
}
