use proptest::prelude::*;
use taint::cache::BottleneckCache;
use taint::cluster::{Agglomerative, Clustering, Kmeans, Linkage};
use taint::detect::{majority_inliers, OutlierDetector};
use taint::score::{self, Confusion};
use taint::sweep::PollutionSweep;
use taint::{Bottlenecks, Result};

/// Flags rows whose first feature exceeds a threshold.
struct Threshold(f32);

impl OutlierDetector for Threshold {
    fn name(&self) -> &str {
        "threshold"
    }

    fn detect(&self, data: &[Vec<f32>]) -> Result<Vec<u8>> {
        Ok(data.iter().map(|row| u8::from(row[0] > self.0)).collect())
    }
}

fn matrix(max_rows: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 1..max_rows)
}

fn binary_pair() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (0usize..60).prop_flat_map(|n| {
        (
            prop::collection::vec(0u8..2, n),
            prop::collection::vec(0u8..2, n),
        )
    })
}

proptest! {
    #[test]
    fn prop_kmeans_all_assigned(data in matrix(20), k in 1usize..5) {
        // Skip if k > n
        if k <= data.len() {
            let labels = Kmeans::new(k).with_seed(42).fit_predict(&data).unwrap();
            prop_assert_eq!(labels.len(), data.len());
            for &l in &labels {
                prop_assert!(l < k);
            }
        }
    }

    #[test]
    fn prop_agglomerative_exact_cluster_count(data in matrix(16), k in 1usize..4) {
        if k <= data.len() {
            for linkage in [Linkage::Ward, Linkage::Average, Linkage::Complete, Linkage::Single] {
                let labels = Agglomerative::new(k)
                    .with_linkage(linkage)
                    .fit_predict(&data)
                    .unwrap();
                let distinct = labels.iter().max().map_or(0, |m| m + 1);
                prop_assert!(distinct <= k);
                prop_assert!(labels.iter().all(|&l| l < k));
            }
        }
    }

    #[test]
    fn prop_errors_and_correct_partition_the_samples((gt, pred) in binary_pair()) {
        let fn_ = score::false_negatives(&gt, &pred).unwrap();
        let fp = score::false_positives(&gt, &pred).unwrap();
        let c = Confusion::from_labels(&gt, &pred).unwrap();
        prop_assert_eq!(fn_ + fp + c.correct(), gt.len());
        prop_assert_eq!(c.total(), gt.len());
    }

    #[test]
    fn prop_outlier_count_is_sum(gt in prop::collection::vec(0u8..2, 0..80)) {
        let sum: usize = gt.iter().map(|&g| usize::from(g)).sum();
        prop_assert_eq!(score::outlier_count(&gt), sum);
    }

    #[test]
    fn prop_majority_cluster_is_inlier(labels in prop::collection::vec(0usize..4, 1..40)) {
        let pred = majority_inliers(&labels);
        let inliers = pred.iter().filter(|&&p| p == 0).count();
        let mut counts = [0usize; 4];
        for &l in &labels {
            counts[l] += 1;
        }
        prop_assert_eq!(inliers, *counts.iter().max().unwrap());
    }

    #[test]
    fn prop_sweep_shape(
        n_clean in 1usize..30,
        n_pollutant in 0usize..50,
        steps in 1usize..12,
    ) {
        let clean = Bottlenecks::new(vec![vec![0.0, 0.0]; n_clean]).unwrap();
        let pollutant = Bottlenecks::new(vec![vec![1.0, 1.0]; n_pollutant]).unwrap();
        let report = PollutionSweep::new()
            .with_steps(steps)
            .run(&clean, &pollutant, &[Threshold(0.5)])
            .unwrap();

        prop_assert!(report.pollutant_len <= n_clean);
        prop_assert_eq!(report.pollutant_len, n_pollutant.min(n_clean));
        prop_assert_eq!(report.steps.last().copied(), Some(report.pollutant_len));

        let curve = &report.curves[0];
        prop_assert_eq!(curve.samples.len(), steps);
        for w in curve.samples.windows(2) {
            prop_assert!(w[0].pollution_pct <= w[1].pollution_pct);
        }
        // A perfect detector makes no errors at any step.
        for s in &curve.samples {
            prop_assert_eq!(s.false_negative_pct, 0.0);
            prop_assert_eq!(s.false_positive_pct, 0.0);
        }
    }

    #[test]
    fn prop_cache_round_trip_is_bit_identical(data in matrix(12)) {
        let dir = tempfile::tempdir().unwrap();
        let cache = BottleneckCache::new(dir.path(), "thumbnail_8");
        let values = Bottlenecks::new(data).unwrap();
        cache.store("Cat", &values).unwrap();
        let back = cache.load("Cat").unwrap().unwrap();

        prop_assert_eq!(back.len(), values.len());
        prop_assert_eq!(back.dim(), values.dim());
        for (a, b) in back.rows().iter().flatten().zip(values.rows().iter().flatten()) {
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
