// End-to-end replay of frame files through export.

use std::fs;
use std::path::Path;

use sfm_cloud::core::{load_ply, write_ply, Point3D};
use sfm_cloud::pipeline::{ArtifactKind, FrameSource, Pipeline, ReplaySource};
use sfm_cloud::{AggregationConfig, ExportConfig, PipelineConfig};

fn write_frames(dir: &Path, frames: &[Vec<Point3D>]) {
    for (i, points) in frames.iter().enumerate() {
        write_ply(&dir.join(format!("frame_{}.ply", i + 1)), points).unwrap();
    }
}

fn config_with_output(out: &Path, frame_limit: usize) -> PipelineConfig {
    PipelineConfig {
        aggregation: AggregationConfig {
            frame_limit,
            ..Default::default()
        },
        export: ExportConfig {
            output_dir: out.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Header vertex count and number of lines after `end_header`.
fn ply_counts(path: &Path) -> (usize, usize) {
    let content = fs::read_to_string(path).unwrap();
    let declared = content
        .lines()
        .find_map(|l| l.strip_prefix("element vertex "))
        .and_then(|n| n.parse().ok())
        .unwrap();
    let body = content
        .lines()
        .skip_while(|l| *l != "end_header")
        .skip(1)
        .count();
    (declared, body)
}

#[test]
fn gate_scenario_end_to_end() {
    let frames_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_frames(
        frames_dir.path(),
        &[
            vec![Point3D::new(1.0, 2.0, 3.0), Point3D::new(f32::NAN, 1.0, 1.0)],
            vec![Point3D::new(0.0, 0.0, 0.0)],
            vec![
                Point3D::new(9.0, 9.0, 9.0),
                Point3D::new(f32::INFINITY, 0.0, 0.0),
                Point3D::new(8.0, 8.0, 8.0),
            ],
        ],
    );

    let mut source = ReplaySource::from_dir(frames_dir.path()).unwrap();
    let mut pipeline = Pipeline::from_config(config_with_output(out_dir.path(), 2));
    let summary = pipeline.run(&mut source, |_| {});
    let report = pipeline.export();

    assert!(report.is_success());
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.aggregate_points, 2);

    let export = pipeline.config().export.clone();
    assert_eq!(
        load_ply(export.aggregate_path()).unwrap(),
        vec![Point3D::new(1.5, 2.0, 3.0), Point3D::new(1.0, 0.0, 0.0)]
    );
    assert_eq!(
        load_ply(export.valid_path()).unwrap(),
        vec![Point3D::new(9.0, 9.0, 9.0), Point3D::new(8.0, 8.0, 8.0)]
    );
    assert_eq!(ply_counts(&export.total_path()), (3, 3));
    assert_eq!(ply_counts(&export.aggregate_path()), (2, 2));
    assert_eq!(
        report.entry(ArtifactKind::Aggregate).unwrap().points,
        summary.aggregate_points
    );
}

#[test]
fn empty_frames_export_zero_vertex_files() {
    let frames_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_frames(frames_dir.path(), &[Vec::new(), Vec::new()]);

    let mut source = ReplaySource::from_dir(frames_dir.path()).unwrap();
    let mut pipeline = Pipeline::from_config(config_with_output(out_dir.path(), 50));
    pipeline.run(&mut source, |_| {});
    let report = pipeline.export();

    assert!(report.is_success());
    for entry in &report.entries {
        assert_eq!(ply_counts(&entry.path), (0, 0), "{}", entry.kind);
    }
    assert_eq!(source.point_buffer().acquisitions(), 0);
}

#[test]
fn broken_frame_is_skipped() {
    let frames_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_frames(
        frames_dir.path(),
        &[vec![Point3D::new(0.0, 1.0, 2.0)], vec![], vec![Point3D::new(0.0, 1.0, 2.0)]],
    );
    fs::write(frames_dir.path().join("frame_2.ply"), "garbage\n").unwrap();

    let mut source = ReplaySource::from_dir(frames_dir.path()).unwrap();
    let mut pipeline = Pipeline::from_config(config_with_output(out_dir.path(), 0));
    let mut failures = 0;
    let summary = pipeline.run(&mut source, |outcome| {
        if outcome.is_err() {
            failures += 1;
        }
    });

    assert_eq!(failures, 1);
    assert_eq!(summary.frames_failed, 1);
    let xs: Vec<f32> = pipeline.aggregate().iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.5, 1.5]);
}
