//! Pollution sweep benchmark.
//!
//! A clean set is contaminated with a growing prefix of a pollutant set. At each
//! step every detector sees the same matrix (clean rows first, then pollutant rows)
//! and the same ground truth (`0` for clean rows, `1` for pollutant rows), and its
//! false-negative and false-positive rates are recorded as percentages of the
//! samples evaluated at that step.
//!
//! Step sizes are `floor(len(pollutant) * j / steps)` for `j = 1..=steps`, so the
//! last step always uses the whole pollutant set. The sweep is sequential and
//! aborts on the first detector failure.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::bottleneck::Bottlenecks;
use crate::detect::OutlierDetector;
use crate::error::{Error, Result};
use crate::score::Confusion;

/// Sweep steps used when none are configured.
pub const DEFAULT_STEPS: usize = 20;

/// One detector evaluated at one sweep step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSample {
    /// Clean rows in the evaluated matrix.
    pub n_clean: usize,
    /// Pollutant rows in the evaluated matrix.
    pub n_polluted: usize,
    /// `n_polluted / (n_clean + n_polluted) * 100`.
    pub pollution_pct: f64,
    /// False negatives as a percentage of evaluated rows.
    pub false_negative_pct: f64,
    /// False positives as a percentage of evaluated rows.
    pub false_positive_pct: f64,
}

/// The samples of one detector across the sweep, in step order.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCurve {
    /// Detector name.
    pub detector: String,
    /// One sample per step.
    pub samples: Vec<ErrorSample>,
}

impl ErrorCurve {
    /// Mean false-negative and false-positive percentages over all steps.
    pub fn mean_rates(&self) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.samples.len() as f64;
        let fnr = self.samples.iter().map(|s| s.false_negative_pct).sum::<f64>() / n;
        let fpr = self.samples.iter().map(|s| s.false_positive_pct).sum::<f64>() / n;
        (fnr, fpr)
    }
}

/// Result of a sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// One curve per detector, in the order the detectors were given.
    pub curves: Vec<ErrorCurve>,
    /// Pollutant rows used at each step.
    pub steps: Vec<usize>,
    /// Pollutant rows available after truncation.
    pub pollutant_len: usize,
    /// Wall-clock time spent running detectors.
    pub elapsed: Duration,
}

impl SweepReport {
    /// The curve of a detector by name.
    pub fn curve(&self, detector: &str) -> Option<&ErrorCurve> {
        self.curves.iter().find(|c| c.detector == detector)
    }
}

/// Pollution sweep configuration.
#[derive(Debug, Clone)]
pub struct PollutionSweep {
    steps: usize,
}

impl Default for PollutionSweep {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
        }
    }
}

/// Ground truth for `n_clean` clean rows followed by `n_polluted` pollutant rows.
pub fn ground_truth(n_clean: usize, n_polluted: usize) -> Vec<u8> {
    let mut gt = vec![0u8; n_clean];
    gt.resize(n_clean + n_polluted, 1);
    gt
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

impl PollutionSweep {
    /// A sweep with [`DEFAULT_STEPS`] steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of sweep steps.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Configured number of steps.
    pub fn n_steps(&self) -> usize {
        self.steps
    }

    /// Pollutant rows used at each step for a pollutant set of `pollutant_len` rows.
    pub fn steps(&self, pollutant_len: usize) -> Vec<usize> {
        (1..=self.steps)
            .map(|j| pollutant_len * j / self.steps)
            .collect()
    }

    /// Run every detector at every step.
    pub fn run<D: OutlierDetector>(
        &self,
        clean: &Bottlenecks,
        pollutant: &Bottlenecks,
        detectors: &[D],
    ) -> Result<SweepReport> {
        if self.steps == 0 {
            return Err(Error::InvalidParameter {
                name: "steps",
                message: "must be at least 1",
            });
        }
        if clean.is_empty() {
            return Err(Error::EmptyInput);
        }
        if !pollutant.is_empty() && pollutant.dim() != clean.dim() {
            return Err(Error::DimensionMismatch {
                expected: clean.dim(),
                found: pollutant.dim(),
            });
        }

        let pollutant = if pollutant.len() > clean.len() {
            warn!(
                "pollutant set ({}) larger than clean set ({}), truncating to {}",
                pollutant.len(),
                clean.len(),
                clean.len()
            );
            pollutant.truncated(clean.len())
        } else {
            pollutant.clone()
        };

        let steps = self.steps(pollutant.len());
        let n_clean = clean.len();
        let mut curves: Vec<ErrorCurve> = detectors
            .iter()
            .map(|d| ErrorCurve {
                detector: d.name().to_string(),
                samples: Vec::with_capacity(steps.len()),
            })
            .collect();

        let t0 = Instant::now();
        for (idx, &i) in steps.iter().enumerate() {
            let matrix = clean.concat(&pollutant, i)?;
            let truth = ground_truth(n_clean, i);
            let total = n_clean + i;
            debug!("step {}/{}: {} clean + {} polluted", idx + 1, steps.len(), n_clean, i);

            for (detector, curve) in detectors.iter().zip(curves.iter_mut()) {
                let predictions = detector.detect(matrix.rows())?;
                let c = Confusion::from_labels(&truth, &predictions).map_err(|e| {
                    Error::Adapter {
                        detector: detector.name().to_string(),
                        source: Box::new(e),
                    }
                })?;
                curve.samples.push(ErrorSample {
                    n_clean,
                    n_polluted: i,
                    pollution_pct: percent(i, total),
                    false_negative_pct: percent(c.false_negatives, total),
                    false_positive_pct: percent(c.false_positives, total),
                });
            }
        }
        let elapsed = t0.elapsed();
        info!(
            "sweep of {} detectors x {} steps finished in {:.3}s",
            detectors.len(),
            steps.len(),
            elapsed.as_secs_f64()
        );

        Ok(SweepReport {
            curves,
            steps,
            pollutant_len: pollutant.len(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{standard_suite, INLIER};
    use std::cell::RefCell;

    /// Predicts everything as inlier and records the matrices it was shown.
    struct Recorder {
        seen: RefCell<Vec<usize>>,
    }

    impl OutlierDetector for Recorder {
        fn name(&self) -> &str {
            "all-inlier"
        }

        fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
            self.seen.borrow_mut().push(data.len());
            Ok(vec![INLIER; data.len()])
        }
    }

    struct Failing;

    impl OutlierDetector for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _data: &[Vec<f32>]) -> Result<Vec<u8>> {
            Err(Error::Adapter {
                detector: "failing".into(),
                source: Box::new(Error::EmptyInput),
            })
        }
    }

    /// Returns one prediction too few.
    struct Short;

    impl OutlierDetector for Short {
        fn name(&self) -> &str {
            "short"
        }

        fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
            Ok(vec![INLIER; data.len() - 1])
        }
    }

    fn set(n: usize, value: f32) -> Bottlenecks {
        Bottlenecks::new(vec![vec![value, value]; n]).unwrap()
    }

    #[test]
    fn test_steps_are_even_and_end_at_full_set() {
        let sweep = PollutionSweep::new();
        assert_eq!(sweep.steps(20), (1..=20).collect::<Vec<_>>());
        let steps = sweep.steps(7);
        assert_eq!(steps.len(), 20);
        assert_eq!(*steps.last().unwrap(), 7);
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(PollutionSweep::new().with_steps(4).steps(10), vec![2, 5, 7, 10]);
    }

    #[test]
    fn test_one_row_per_step() {
        let recorder = Recorder {
            seen: RefCell::new(Vec::new()),
        };
        let report = PollutionSweep::new()
            .run(&set(100, 0.0), &set(20, 5.0), std::slice::from_ref(&recorder))
            .unwrap();

        let seen = recorder.seen.borrow();
        assert_eq!(*seen, (101..=120).collect::<Vec<_>>());

        let curve = report.curve("all-inlier").unwrap();
        assert_eq!(curve.samples.len(), 20);
        let last = curve.samples.last().unwrap();
        assert_eq!(last.n_clean, 100);
        assert_eq!(last.n_polluted, 20);
        assert!((last.false_negative_pct - 20.0 / 120.0 * 100.0).abs() < 1e-9);
        assert_eq!(last.false_positive_pct, 0.0);
    }

    #[test]
    fn test_truncates_large_pollutant_set() {
        let recorder = Recorder {
            seen: RefCell::new(Vec::new()),
        };
        let report = PollutionSweep::new()
            .with_steps(5)
            .run(&set(10, 0.0), &set(35, 1.0), &[recorder])
            .unwrap();
        assert_eq!(report.pollutant_len, 10);
        assert_eq!(report.steps, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_pollution_is_monotone() {
        let report = PollutionSweep::new()
            .with_steps(6)
            .run(&set(30, 0.0), &set(9, 3.0), &standard_suite(1))
            .unwrap();
        assert_eq!(report.curves.len(), 4);
        for curve in &report.curves {
            assert_eq!(curve.samples.len(), 6);
            assert!(curve
                .samples
                .windows(2)
                .all(|w| w[0].pollution_pct <= w[1].pollution_pct));
        }
    }

    #[test]
    fn test_adapter_failure_aborts() {
        let err = PollutionSweep::new()
            .run(&set(5, 0.0), &set(2, 1.0), &[Failing])
            .unwrap_err();
        assert!(matches!(err, Error::Adapter { .. }));
    }

    #[test]
    fn test_wrong_prediction_length_names_detector() {
        let err = PollutionSweep::new()
            .run(&set(5, 0.0), &set(2, 1.0), &[Short])
            .unwrap_err();
        match err {
            Error::Adapter { detector, source } => {
                assert_eq!(detector, "short");
                assert!(matches!(
                    *source,
                    Error::LengthMismatch {
                        expected: 5,
                        found: 4
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let recorder = || Recorder {
            seen: RefCell::new(Vec::new()),
        };
        assert!(PollutionSweep::new()
            .run(&Bottlenecks::default(), &set(2, 1.0), &[recorder()])
            .is_err());
        assert!(PollutionSweep::new()
            .with_steps(0)
            .run(&set(2, 0.0), &set(2, 1.0), &[recorder()])
            .is_err());
        let wide = Bottlenecks::new(vec![vec![0.0; 3]]).unwrap();
        assert!(matches!(
            PollutionSweep::new().run(&set(2, 0.0), &wide, &[recorder()]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_ground_truth_layout() {
        assert_eq!(ground_truth(3, 2), vec![0, 0, 0, 1, 1]);
        assert!(ground_truth(0, 0).is_empty());
    }
}
