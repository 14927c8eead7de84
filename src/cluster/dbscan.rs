//! DBSCAN: density-based clustering with explicit noise.
//!
//! A point with at least `min_pts` points (itself included) within `epsilon` is a
//! *core* point. Clusters grow from core points through their neighbourhoods;
//! points reachable from no core point are *noise*. For outlier detection the noise
//! set is the prediction itself, with no cluster-to-outlier mapping needed.
//!
//! `epsilon` is scale dependent: a k-distance plot (k = `min_pts - 1`) of the data
//! is the usual way to pick it.
//!
//! ## References
//!
//! Ester et al. (1996). "A Density-Based Algorithm for Discovering Clusters in Large
//! Spatial Databases with Noise." KDD-96.

use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};

/// DBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Dbscan {
    epsilon: f32,
    min_pts: usize,
}

impl Dbscan {
    /// Create a DBSCAN clusterer.
    ///
    /// * `epsilon` - neighbourhood radius.
    /// * `min_pts` - points (self included) needed within `epsilon` to be core.
    pub fn new(epsilon: f32, min_pts: usize) -> Self {
        Self { epsilon, min_pts }
    }

    /// Set the neighbourhood radius.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the core-point density requirement.
    pub fn with_min_pts(mut self, min_pts: usize) -> Self {
        self.min_pts = min_pts;
        self
    }

    fn neighbours(&self, data: &[Vec<f32>], idx: usize) -> Vec<usize> {
        let point = &data[idx];
        (0..data.len())
            .filter(|&j| j != idx && util::euclidean(point, &data[j]) <= self.epsilon)
            .collect()
    }

    /// Cluster `data`, returning `None` for noise points.
    pub fn fit_predict_with_noise(&self, data: &[Vec<f32>]) -> Result<Vec<Option<usize>>> {
        util::validate(data)?;
        if !(self.epsilon > 0.0) {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                message: "must be positive",
            });
        }
        if self.min_pts == 0 {
            return Err(Error::InvalidParameter {
                name: "min_pts",
                message: "must be at least 1",
            });
        }

        let n = data.len();
        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut next_cluster = 0;

        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let seeds = self.neighbours(data, start);
            if seeds.len() + 1 < self.min_pts {
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[start] = Some(cluster);

            let mut frontier = seeds;
            while let Some(q) = frontier.pop() {
                // Border points first seen as noise are claimed here.
                if labels[q].is_none() {
                    labels[q] = Some(cluster);
                }
                if visited[q] {
                    continue;
                }
                visited[q] = true;

                let reach = self.neighbours(data, q);
                if reach.len() + 1 >= self.min_pts {
                    frontier.extend(reach.into_iter().filter(|&r| !visited[r]));
                }
            }
        }

        Ok(labels)
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(0.5, 5)
    }
}

impl Clustering for Dbscan {
    /// Noise points share one extra cluster id, after all real clusters.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        let labels = self.fit_predict_with_noise(data)?;
        let noise = labels.iter().flatten().max().map_or(0, |m| m + 1);
        Ok(labels.into_iter().map(|l| l.unwrap_or(noise)).collect())
    }

    /// Discovered from the data, so 0.
    fn n_clusters(&self) -> usize {
        0
    }
}
