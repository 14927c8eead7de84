//! Benchmark output: CSV error curves, `.npy` projections, log summaries.

use std::fs;
use std::path::Path;

use log::info;
use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;
use serde::Serialize;

use crate::embed::Point2;
use crate::error::{Error, Result};
use crate::sweep::SweepReport;

#[derive(Debug, Serialize)]
struct CurveRow<'a> {
    detector: &'a str,
    step: usize,
    n_clean: usize,
    n_polluted: usize,
    pollution_pct: f64,
    false_negative_pct: f64,
    false_positive_pct: f64,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write one CSV row per (detector, step). Steps are numbered from 1.
pub fn write_curves_csv(path: &Path, report: &SweepReport) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for curve in &report.curves {
        for (idx, sample) in curve.samples.iter().enumerate() {
            writer.serialize(CurveRow {
                detector: &curve.detector,
                step: idx + 1,
                n_clean: sample.n_clean,
                n_polluted: sample.n_polluted,
                pollution_pct: sample.pollution_pct,
                false_negative_pct: sample.false_negative_pct,
                false_positive_pct: sample.false_positive_pct,
            })?;
        }
    }
    writer.flush()?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Write projected points as an `n x 2` `f64` array.
pub fn write_projection_npy(path: &Path, points: &[Point2]) -> Result<()> {
    ensure_parent(path)?;
    let flat: Vec<f64> = points.iter().flat_map(|p| p.iter().copied()).collect();
    let array = Array2::from_shape_vec((points.len(), 2), flat).map_err(|e| Error::Output {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    write_npy(path, &array).map_err(|e| Error::Output {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Write ground-truth labels as a `u8` vector.
pub fn write_labels_npy(path: &Path, labels: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    write_npy(path, &Array1::from(labels.to_vec())).map_err(|e| Error::Output {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Log mean false-negative and false-positive percentages per detector.
pub fn log_summary(report: &SweepReport) {
    info!(
        "{} steps over {} pollutant rows",
        report.steps.len(),
        report.pollutant_len
    );
    for curve in &report.curves {
        let (fnr, fpr) = curve.mean_rates();
        info!(
            "{:<26} mean FN {:6.2}%  mean FP {:6.2}%",
            curve.detector, fnr, fpr
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::{ErrorCurve, ErrorSample};
    use ndarray_npy::read_npy;
    use std::time::Duration;

    fn report() -> SweepReport {
        let sample = |i: usize| ErrorSample {
            n_clean: 10,
            n_polluted: i,
            pollution_pct: i as f64 / (10 + i) as f64 * 100.0,
            false_negative_pct: 0.0,
            false_positive_pct: 5.0,
        };
        SweepReport {
            curves: vec![
                ErrorCurve {
                    detector: "k-means".into(),
                    samples: vec![sample(1), sample(2)],
                },
                ErrorCurve {
                    detector: "Birch".into(),
                    samples: vec![sample(1), sample(2)],
                },
            ],
            steps: vec![1, 2],
            pollutant_len: 2,
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_curves_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/benchmark_Cat_Noise.csv");
        write_curves_csv(&path, &report()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "detector,step,n_clean,n_polluted,pollution_pct,false_negative_pct,false_positive_pct"
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("k-means,1,10,1,"));
        assert!(lines[4].starts_with("Birch,2,10,2,"));
    }

    #[test]
    fn test_projection_npy_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.npy");
        write_projection_npy(&path, &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();

        let array: Array2<f64> = read_npy(&path).unwrap();
        assert_eq!(array.dim(), (3, 2));
        assert_eq!(array[[2, 1]], 6.0);
    }

    #[test]
    fn test_labels_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.npy");
        write_labels_npy(&path, &[0, 0, 1]).unwrap();
        let array: Array1<u8> = read_npy(&path).unwrap();
        assert_eq!(array.to_vec(), vec![0, 0, 1]);
    }
}
