//! Scoring of predictions against ground truth.
//!
//! Both vectors are binary (`1` = outlier) and index-aligned; every function here
//! rejects vectors of different lengths with [`Error::LengthMismatch`].
//!
//! "Positive" means outlier, so a *false negative* is a pollutant predicted as an
//! inlier and a *false positive* is a clean sample predicted as an outlier.

use crate::error::{Error, Result};

fn check_aligned(ground_truth: &[u8], predictions: &[u8]) -> Result<()> {
    if ground_truth.len() != predictions.len() {
        return Err(Error::LengthMismatch {
            expected: ground_truth.len(),
            found: predictions.len(),
        });
    }
    Ok(())
}

/// Pollutants predicted as inliers.
pub fn false_negatives(ground_truth: &[u8], predictions: &[u8]) -> Result<usize> {
    Ok(Confusion::from_labels(ground_truth, predictions)?.false_negatives)
}

/// Clean samples predicted as outliers.
pub fn false_positives(ground_truth: &[u8], predictions: &[u8]) -> Result<usize> {
    Ok(Confusion::from_labels(ground_truth, predictions)?.false_positives)
}

/// Number of outliers in a ground-truth vector.
pub fn outlier_count(ground_truth: &[u8]) -> usize {
    ground_truth.iter().filter(|&&g| g != 0).count()
}

/// Confusion matrix of a binary prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Confusion {
    /// Outliers predicted as outliers.
    pub true_positives: usize,
    /// Inliers predicted as inliers.
    pub true_negatives: usize,
    /// Inliers predicted as outliers.
    pub false_positives: usize,
    /// Outliers predicted as inliers.
    pub false_negatives: usize,
}

impl Confusion {
    /// Tally predictions against ground truth. Any non-zero value counts as outlier.
    pub fn from_labels(ground_truth: &[u8], predictions: &[u8]) -> Result<Self> {
        check_aligned(ground_truth, predictions)?;
        let mut c = Confusion::default();
        for (&g, &p) in ground_truth.iter().zip(predictions) {
            match (g != 0, p != 0) {
                (true, true) => c.true_positives += 1,
                (false, false) => c.true_negatives += 1,
                (false, true) => c.false_positives += 1,
                (true, false) => c.false_negatives += 1,
            }
        }
        Ok(c)
    }

    /// Correct predictions.
    pub fn correct(&self) -> usize {
        self.true_positives + self.true_negatives
    }

    /// Total predictions.
    pub fn total(&self) -> usize {
        self.correct() + self.false_positives + self.false_negatives
    }
}

/// Summary metrics of a binary prediction. Undefined ratios are reported as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scores {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Fraction of predicted outliers that are outliers.
    pub precision: f64,
    /// Fraction of outliers that were predicted as outliers.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Accuracy, precision, recall and F1 of `predictions`.
pub fn scores(ground_truth: &[u8], predictions: &[u8]) -> Result<Scores> {
    let c = Confusion::from_labels(ground_truth, predictions)?;
    let precision = ratio(c.true_positives, c.true_positives + c.false_positives);
    let recall = ratio(c.true_positives, c.true_positives + c.false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    Ok(Scores {
        accuracy: ratio(c.correct(), c.total()),
        precision,
        recall,
        f1,
    })
}

/// Indices of misclassified samples, for visual inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Misclassified {
    /// Clean samples flagged as outliers.
    pub false_positives: Vec<usize>,
    /// Pollutants that slipped through as inliers.
    pub false_negatives: Vec<usize>,
}

/// Collect the indices of false positives and false negatives.
pub fn misclassified(ground_truth: &[u8], predictions: &[u8]) -> Result<Misclassified> {
    check_aligned(ground_truth, predictions)?;
    let mut out = Misclassified::default();
    for (i, (&g, &p)) in ground_truth.iter().zip(predictions).enumerate() {
        match (g != 0, p != 0) {
            (false, true) => out.false_positives.push(i),
            (true, false) => out.false_negatives.push(i),
            _ => {}
        }
    }
    Ok(out)
}
