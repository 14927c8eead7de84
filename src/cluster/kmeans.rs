//! K-means: k-means++ seeding followed by Lloyd iterations.
//!
//! Each iteration assigns every point to its nearest centroid and moves every
//! centroid to the mean of its points, until the total centroid movement drops
//! below `tol` or `max_iter` is reached. With `n_init > 1` the whole procedure is
//! repeated from different seeds and the lowest-inertia run wins.
//!
//! ## References
//!
//! Arthur & Vassilvitskii (2007). "k-means++: The Advantages of Careful Seeding."

use rand::prelude::*;

use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    max_iter: usize,
    tol: f32,
    n_init: usize,
    seed: Option<u64>,
}

/// A fitted k-means model.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// One centroid per cluster.
    pub centroids: Vec<Vec<f32>>,
    /// Cluster label of each training point.
    pub labels: Vec<usize>,
    /// Sum of squared distances of points to their centroid.
    pub inertia: f32,
    /// Lloyd iterations run by the winning initialisation.
    pub n_iter: usize,
}

impl KmeansFit {
    /// Assign new points to the nearest fitted centroid.
    pub fn predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        let d = util::validate(data)?;
        let expected = self.centroids.first().map_or(0, Vec::len);
        if d != expected {
            return Err(Error::DimensionMismatch { expected, found: d });
        }
        Ok(data
            .iter()
            .map(|p| util::nearest(p, &self.centroids).0)
            .collect())
    }
}

impl Kmeans {
    /// Create a k-means clusterer with `k` clusters.
    ///
    /// Defaults: `max_iter = 300`, `tol = 1e-4`, `n_init = 1`, unseeded.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
            seed: None,
        }
    }

    /// Set the maximum number of Lloyd iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on total squared centroid movement.
    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Set the number of independent initialisations.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Fix the RNG seed for reproducible results.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit the model and keep centroids, labels and inertia.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        util::validate_k(data, self.k)?;
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if self.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                message: "must be at least 1",
            });
        }

        let mut best: Option<KmeansFit> = None;
        for run in 0..self.n_init {
            let mut rng: Box<dyn RngCore> = match self.seed {
                Some(s) => Box::new(StdRng::seed_from_u64(s.wrapping_add(run as u64))),
                None => Box::new(rand::rng()),
            };
            let fit = self.lloyd(data, rng.as_mut());
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.ok_or(Error::EmptyInput)
    }

    fn lloyd(&self, data: &[Vec<f32>], rng: &mut dyn RngCore) -> KmeansFit {
        let d = data[0].len();
        let mut centroids = plus_plus(data, self.k, rng);
        let mut labels = vec![0usize; data.len()];
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            for (label, point) in labels.iter_mut().zip(data) {
                *label = util::nearest(point, &centroids).0;
            }

            let mut sums = vec![vec![0.0f32; d]; self.k];
            let mut counts = vec![0usize; self.k];
            for (point, &label) in data.iter().zip(&labels) {
                counts[label] += 1;
                for (s, x) in sums[label].iter_mut().zip(point) {
                    *s += x;
                }
            }

            let mut shift = 0.0f32;
            for c in 0..self.k {
                let next = if counts[c] == 0 {
                    // Empty cluster: restart it on the point worst served by its centroid.
                    let far = farthest_point(data, &centroids, &labels);
                    data[far].clone()
                } else {
                    let inv = 1.0 / counts[c] as f32;
                    sums[c].iter().map(|s| s * inv).collect()
                };
                shift += util::squared_euclidean(&centroids[c], &next);
                centroids[c] = next;
            }

            if shift <= self.tol {
                break;
            }
        }

        let mut inertia = 0.0f32;
        for (label, point) in labels.iter_mut().zip(data) {
            let (c, dist) = util::nearest(point, &centroids);
            *label = c;
            inertia += dist;
        }

        KmeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        }
    }
}

/// k-means++ seeding: each new centroid is drawn with probability proportional to
/// the squared distance to the nearest centroid chosen so far.
fn plus_plus(data: &[Vec<f32>], k: usize, rng: &mut dyn RngCore) -> Vec<Vec<f32>> {
    let n = data.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..n)].clone());

    let mut dist: Vec<f32> = data
        .iter()
        .map(|p| util::squared_euclidean(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f32 = dist.iter().sum();
        let next = if total <= 0.0 {
            // All remaining points coincide with a centroid.
            rng.random_range(0..n)
        } else {
            let mut target = rng.random::<f32>() * total;
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &w) in dist.iter().enumerate() {
                if w > 0.0 {
                    last_positive = i;
                    if target < w {
                        chosen = Some(i);
                        break;
                    }
                }
                target -= w;
            }
            // Rounding can leave `target` just above the last weight.
            chosen.unwrap_or(last_positive)
        };

        let c = data[next].clone();
        for (dv, p) in dist.iter_mut().zip(data) {
            *dv = dv.min(util::squared_euclidean(p, &c));
        }
        centroids.push(c);
    }
    centroids
}

fn farthest_point(data: &[Vec<f32>], centroids: &[Vec<f32>], labels: &[usize]) -> usize {
    let mut best = (0, -1.0f32);
    for (i, (p, &l)) in data.iter().zip(labels).enumerate() {
        let d = util::squared_euclidean(p, &centroids[l]);
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}
