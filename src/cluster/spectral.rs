//! Spectral clustering (Ng, Jordan & Weiss, 2002).
//!
//! 1. Affinity `W_ij = exp(-gamma * ||x_i - x_j||²)` with `W_ii = 0`.
//! 2. Normalised affinity `A = D^{-1/2} W D^{-1/2}` where `D` is the degree matrix.
//! 3. The `k` leading eigenvectors of `A` form an `n x k` embedding.
//! 4. Rows of the embedding are scaled to unit length and clustered with k-means.
//!
//! Unlike k-means on the raw vectors, this can separate groups that are not
//! linearly separable, as long as they are connected at the chosen `gamma`.
//!
//! `gamma` defaults to `1 / median(||x_i - x_j||²)`. A fixed `gamma` of 1.0 is the
//! usual library default, but bottleneck features live at a scale where that drives
//! every affinity to zero.

use super::kmeans::Kmeans;
use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};
use crate::linalg::{self, DenseSymmetric};

/// Spectral clustering with an RBF affinity.
#[derive(Debug, Clone)]
pub struct Spectral {
    k: usize,
    gamma: Option<f64>,
    seed: u64,
}

impl Spectral {
    /// Create a spectral clusterer with `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            gamma: None,
            seed: 0,
        }
    }

    /// Fix the RBF kernel width instead of using the median heuristic.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Seed for the final k-means.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The normalised-affinity embedding, one row per point (before row scaling).
    pub(crate) fn embedding(&self, data: &[Vec<f32>], dims: usize) -> Result<Vec<Vec<f64>>> {
        let n = data.len();
        let affinity = normalized_affinity(data, self.gamma)?;
        let pairs = linalg::top_eigenpairs(&affinity, dims)?;
        Ok((0..n)
            .map(|i| pairs.vectors.iter().map(|v| v[i]).collect())
            .collect())
    }
}

/// RBF affinity normalised as `D^{-1/2} W D^{-1/2}`.
pub(crate) fn normalized_affinity(data: &[Vec<f32>], gamma: Option<f64>) -> Result<DenseSymmetric> {
    let (w, degree) = rbf_affinity(data, gamma)?;
    let inv_sqrt: Vec<f64> = degree
        .iter()
        .map(|&d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 })
        .collect();
    Ok(DenseSymmetric::from_fn(data.len(), |i, j| {
        w.get(i, j) * inv_sqrt[i] * inv_sqrt[j]
    }))
}

/// RBF affinity matrix with zero diagonal, and each row's degree.
pub(crate) fn rbf_affinity(
    data: &[Vec<f32>],
    gamma: Option<f64>,
) -> Result<(DenseSymmetric, Vec<f64>)> {
    let gamma = match gamma {
        Some(g) if g > 0.0 && g.is_finite() => g,
        Some(_) => {
            return Err(Error::InvalidParameter {
                name: "gamma",
                message: "must be positive and finite",
            })
        }
        None => {
            let median = util::median_squared_distance(data);
            if median > 0.0 {
                1.0 / median
            } else {
                1.0
            }
        }
    };

    let d2 = linalg::pairwise_squared(data);
    let n = data.len();
    let w = DenseSymmetric::from_fn(n, |i, j| {
        if i == j {
            0.0
        } else {
            (-gamma * d2.get(i, j)).exp()
        }
    });
    let degree = (0..n).map(|i| w.row(i).iter().sum()).collect();
    Ok((w, degree))
}

impl Clustering for Spectral {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        util::validate_k(data, self.k)?;
        if self.k == 1 {
            return Ok(vec![0; data.len()]);
        }

        let embedding = self.embedding(data, self.k)?;
        let rows: Vec<Vec<f32>> = embedding
            .into_iter()
            .map(|row| {
                let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
                let scale = if norm > f64::EPSILON { 1.0 / norm } else { 0.0 };
                row.iter().map(|x| (x * scale) as f32).collect()
            })
            .collect();

        Kmeans::new(self.k)
            .with_seed(self.seed)
            .with_n_init(4)
            .fit_predict(&rows)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}
