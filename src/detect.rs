//! Detection adapters: feature matrix in, binary prediction out.
//!
//! Predictions use a fixed convention: `0` = inlier, `1` = outlier. Clustering
//! algorithms are adapted with [`ClusterOutliers`], which assumes the contaminated set
//! is dominated by its main class: the most populated cluster is the inlier class
//! and every other cluster is outlying. DBSCAN is adapted with [`DensityOutliers`],
//! which reports noise points directly.

use crate::cluster::{Agglomerative, Birch, Clustering, Dbscan, Kmeans, Spectral};
use crate::error::{Error, Result};

/// Inlier label.
pub const INLIER: u8 = 0;
/// Outlier label.
pub const OUTLIER: u8 = 1;

/// Something that flags outliers in a feature matrix.
pub trait OutlierDetector {
    /// Display name, used to key benchmark curves.
    fn name(&self) -> &str;

    /// One prediction per row of `data`: [`INLIER`] or [`OUTLIER`].
    fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>>;
}

impl<D: OutlierDetector + ?Sized> OutlierDetector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
        (**self).detect(data)
    }
}

fn adapter_error(name: &str, source: Error) -> Error {
    Error::Adapter {
        detector: name.to_string(),
        source: Box::new(source),
    }
}

/// Outliers = points outside the most populated cluster.
#[derive(Debug, Clone)]
pub struct ClusterOutliers<C> {
    name: String,
    model: C,
}

impl<C: Clustering> ClusterOutliers<C> {
    /// Wrap a clustering model under a display name.
    pub fn new(name: impl Into<String>, model: C) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }

    /// The wrapped model.
    pub fn model(&self) -> &C {
        &self.model
    }
}

/// Map cluster labels to predictions: the largest cluster (lowest id on ties) is
/// the inlier class.
pub fn majority_inliers(labels: &[usize]) -> Vec<u8> {
    let n_labels = labels.iter().max().map_or(0, |m| m + 1);
    let mut counts = vec![0usize; n_labels];
    for &l in labels {
        counts[l] += 1;
    }
    let majority = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (id, &c)| if c > best.1 { (id, c) } else { best })
        .0;
    labels
        .iter()
        .map(|&l| if l == majority { INLIER } else { OUTLIER })
        .collect()
}

impl<C: Clustering> OutlierDetector for ClusterOutliers<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
        let labels = self
            .model
            .fit_predict(data)
            .map_err(|e| adapter_error(&self.name, e))?;
        Ok(majority_inliers(&labels))
    }
}

/// Outliers = DBSCAN noise points.
#[derive(Debug, Clone)]
pub struct DensityOutliers {
    name: String,
    model: Dbscan,
}

impl DensityOutliers {
    /// Wrap a DBSCAN model under a display name.
    pub fn new(name: impl Into<String>, model: Dbscan) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }
}

impl OutlierDetector for DensityOutliers {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
        let labels = self
            .model
            .fit_predict_with_noise(data)
            .map_err(|e| adapter_error(&self.name, e))?;
        Ok(labels
            .into_iter()
            .map(|l| if l.is_some() { INLIER } else { OUTLIER })
            .collect())
    }
}

/// The four detectors compared by the pollution benchmark, in plotting order.
///
/// All are two-cluster models; `seed` fixes every random choice they make.
pub fn standard_suite(seed: u64) -> Vec<Box<dyn OutlierDetector>> {
    vec![
        Box::new(ClusterOutliers::new(
            "k-means",
            Kmeans::new(2).with_seed(seed).with_n_init(4),
        )) as Box<dyn OutlierDetector>,
        Box::new(ClusterOutliers::new(
            "Spectral Clustering",
            Spectral::new(2).with_seed(seed),
        )),
        Box::new(ClusterOutliers::new(
            "Agglomerative Clustering",
            Agglomerative::new(2),
        )),
        Box::new(ClusterOutliers::new("Birch", Birch::new(2))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contaminated() -> Vec<Vec<f32>> {
        let mut data: Vec<Vec<f32>> = (0..12)
            .map(|i| vec![(i % 4) as f32 * 0.1, (i / 4) as f32 * 0.1])
            .collect();
        data.push(vec![9.0, 9.0]);
        data.push(vec![9.1, 9.0]);
        data
    }

    #[test]
    fn test_majority_inliers() {
        assert_eq!(majority_inliers(&[1, 1, 0, 1, 2]), vec![0, 0, 1, 0, 1]);
        // Tie: lowest id wins.
        assert_eq!(majority_inliers(&[1, 0, 1, 0]), vec![1, 0, 1, 0]);
        assert!(majority_inliers(&[]).is_empty());
    }

    #[test]
    fn test_standard_suite_flags_far_points() {
        let data = contaminated();
        for detector in standard_suite(42) {
            let pred = detector.detect(&data).unwrap();
            assert_eq!(pred.len(), data.len(), "{}", detector.name());
            assert!(pred[..12].iter().all(|&p| p == INLIER), "{}", detector.name());
            assert!(pred[12..].iter().all(|&p| p == OUTLIER), "{}", detector.name());
        }
    }

    #[test]
    fn test_suite_names_in_order() {
        let names: Vec<String> = standard_suite(0).iter().map(|d| d.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["k-means", "Spectral Clustering", "Agglomerative Clustering", "Birch"]
        );
    }

    #[test]
    fn test_density_outliers() {
        let detector = DensityOutliers::new("DBSCAN", Dbscan::new(0.5, 3));
        let pred = detector.detect(&contaminated()).unwrap();
        assert!(pred[..12].iter().all(|&p| p == INLIER));
        assert!(pred[12..].iter().all(|&p| p == OUTLIER));
    }

    #[test]
    fn test_failure_is_wrapped_with_name() {
        let detector = ClusterOutliers::new("k-means", Kmeans::new(2));
        match detector.detect(&[vec![0.0]]).unwrap_err() {
            Error::Adapter { detector, source } => {
                assert_eq!(detector, "k-means");
                assert!(matches!(*source, Error::InvalidClusterCount { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
