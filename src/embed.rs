//! Two-dimensional projections of bottleneck sets.
//!
//! These answer a question the error curves cannot: are the pollutants separable
//! from the clean class at all in bottleneck space? Each [`Projection`] maps a
//! feature matrix to 2-D points; [`separation`] condenses "how far apart do inliers
//! and outliers land" into one number. Plotting the points is left to external
//! tools (see [`crate::report::write_projection_npy`]).
//!
//! | Projection | Preserves |
//! |---|---|
//! | [`TruncatedSvd`] | directions of largest (uncentred) variance |
//! | [`Isomap`] | geodesic distances along a k-nearest-neighbour graph |
//! | [`LocallyLinear`] | each point's reconstruction from its neighbours |
//! | [`SpectralEmbedding`] | RBF affinity structure (Laplacian eigenmaps) |

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::{DMatrix, DVector};

use crate::cluster::rbf_affinity;
use crate::cluster::util::{self, UnionFind};
use crate::error::{Error, Result};
use crate::linalg::{self, DenseSymmetric};

/// A 2-D point.
pub type Point2 = [f64; 2];

/// Maps a feature matrix to one 2-D point per row.
pub trait Projection {
    /// Display name.
    fn name(&self) -> &str;

    /// Project `data`.
    fn project(&self, data: &[Vec<f32>]) -> Result<Vec<Point2>>;
}

fn check_input(data: &[Vec<f32>], min_points: usize) -> Result<()> {
    util::validate(data)?;
    if data.len() < min_points {
        return Err(Error::InvalidClusterCount {
            requested: min_points,
            n_items: data.len(),
        });
    }
    Ok(())
}

fn to_f64(data: &[Vec<f32>]) -> Vec<Vec<f64>> {
    data.iter()
        .map(|row| row.iter().map(|&x| f64::from(x)).collect())
        .collect()
}

/// Scale eigenvectors by `sqrt(max(lambda, 0))`, one coordinate per eigenpair.
fn scaled_coordinates(pairs: &linalg::Eigenpairs, n: usize) -> Vec<Point2> {
    let s0 = pairs.values[0].max(0.0).sqrt();
    let s1 = pairs.values[1].max(0.0).sqrt();
    (0..n)
        .map(|i| [pairs.vectors[0][i] * s0, pairs.vectors[1][i] * s1])
        .collect()
}

/// Truncated SVD (no centring): `X ≈ U Σ Vᵀ`, points are the rows of `U Σ`.
#[derive(Debug, Clone, Default)]
pub struct TruncatedSvd;

impl TruncatedSvd {
    /// Create the projection.
    pub fn new() -> Self {
        Self
    }
}

impl Projection for TruncatedSvd {
    fn name(&self) -> &str {
        "Principal Components projection"
    }

    fn project(&self, data: &[Vec<f32>]) -> Result<Vec<Point2>> {
        check_input(data, 2)?;
        let x = to_f64(data);
        let gram = DenseSymmetric::from_fn(x.len(), |i, j| linalg::dot(&x[i], &x[j]));
        let pairs = linalg::top_eigenpairs(&gram, 2)?;
        Ok(scaled_coordinates(&pairs, x.len()))
    }
}

/// Indices of the `k` nearest neighbours of every point (self excluded).
fn knn(dist: &DenseSymmetric, k: usize) -> Vec<Vec<usize>> {
    let n = dist.n();
    (0..n)
        .map(|i| {
            let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            others.sort_by(|&a, &b| dist.get(i, a).total_cmp(&dist.get(i, b)));
            others.truncate(k);
            others
        })
        .collect()
}

/// Fails with [`Error::Disconnected`] unless the symmetrised kNN graph is connected.
fn check_connected(neighbours: &[Vec<usize>]) -> Result<()> {
    let mut uf = UnionFind::new(neighbours.len());
    for (i, ns) in neighbours.iter().enumerate() {
        for &j in ns {
            uf.union(i, j);
        }
    }
    let components = uf.labels().into_iter().max().map_or(0, |m| m + 1);
    if components > 1 {
        return Err(Error::Disconnected { components });
    }
    Ok(())
}

fn euclidean_matrix(data: &[Vec<f32>]) -> DenseSymmetric {
    let mut d = linalg::pairwise_squared(data);
    let n = d.n();
    for i in 0..n {
        for j in (i + 1)..n {
            d.set(i, j, d.get(i, j).sqrt());
        }
    }
    d
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    dist: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on distance.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra(graph: &[Vec<(usize, f64)>], source: usize) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.len()];
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(Frontier {
        dist: 0.0,
        node: source,
    });

    while let Some(Frontier { dist: d, node }) = heap.pop() {
        if d > dist[node] {
            continue;
        }
        for &(next, w) in &graph[node] {
            let candidate = d + w;
            if candidate < dist[next] {
                dist[next] = candidate;
                heap.push(Frontier {
                    dist: candidate,
                    node: next,
                });
            }
        }
    }
    dist
}

/// Isomap: classical MDS on shortest-path distances of a symmetric kNN graph.
#[derive(Debug, Clone)]
pub struct Isomap {
    n_neighbors: usize,
}

impl Isomap {
    /// Create an Isomap projection using `n_neighbors` neighbours per point.
    pub fn new(n_neighbors: usize) -> Self {
        Self { n_neighbors }
    }

    /// Geodesic distance matrix along the neighbourhood graph.
    pub fn geodesics(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
        check_input(data, 2)?;
        if self.n_neighbors == 0 {
            return Err(Error::InvalidParameter {
                name: "n_neighbors",
                message: "must be at least 1",
            });
        }

        let n = data.len();
        let dist = euclidean_matrix(data);
        let neighbours = knn(&dist, self.n_neighbors.min(n - 1));

        check_connected(&neighbours)?;

        let mut graph: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (i, ns) in neighbours.iter().enumerate() {
            for &j in ns {
                let w = dist.get(i, j);
                graph[i].push((j, w));
                graph[j].push((i, w));
            }
        }

        Ok((0..n).map(|s| dijkstra(&graph, s)).collect())
    }
}

impl Default for Isomap {
    fn default() -> Self {
        Self::new(25)
    }
}

impl Projection for Isomap {
    fn name(&self) -> &str {
        "Isomap projection"
    }

    fn project(&self, data: &[Vec<f32>]) -> Result<Vec<Point2>> {
        let geo = self.geodesics(data)?;
        let n = geo.len();

        // Double centring of the squared geodesics: B = -1/2 J D² J.
        let sq: Vec<Vec<f64>> = geo
            .iter()
            .map(|row| row.iter().map(|d| d * d).collect())
            .collect();
        let row_mean: Vec<f64> = sq.iter().map(|r| r.iter().sum::<f64>() / n as f64).collect();
        let grand = row_mean.iter().sum::<f64>() / n as f64;
        let b = DenseSymmetric::from_fn(n, |i, j| {
            -0.5 * (sq[i][j] - row_mean[i] - row_mean[j] + grand)
        });

        let pairs = linalg::top_eigenpairs(&b, 2)?;
        Ok(scaled_coordinates(&pairs, n))
    }
}

/// Locally linear embedding (standard variant).
#[derive(Debug, Clone)]
pub struct LocallyLinear {
    n_neighbors: usize,
    reg: f64,
}

impl LocallyLinear {
    /// Create an LLE projection using `n_neighbors` neighbours per point.
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            reg: 1e-3,
        }
    }

    /// Regularisation of the local Gram matrices, relative to their trace.
    pub fn with_reg(mut self, reg: f64) -> Self {
        self.reg = reg;
        self
    }

    /// Reconstruction weights: `(neighbour indices, weights)` per point, weights sum to 1.
    fn weights(&self, data: &[Vec<f32>]) -> Result<Vec<(Vec<usize>, Vec<f64>)>> {
        let n = data.len();
        let x = to_f64(data);
        let dist = euclidean_matrix(data);
        let neighbours = knn(&dist, self.n_neighbors.min(n - 1));
        check_connected(&neighbours)?;

        neighbours
            .into_iter()
            .enumerate()
            .map(|(i, ns)| {
                let z: Vec<Vec<f64>> = ns
                    .iter()
                    .map(|&j| x[j].iter().zip(&x[i]).map(|(a, b)| a - b).collect())
                    .collect();
                let k = ns.len();
                let mut gram = DMatrix::from_fn(k, k, |a, b| linalg::dot(&z[a], &z[b]));
                let trace = gram.trace();
                let r = if trace > 0.0 { self.reg * trace } else { self.reg };
                for a in 0..k {
                    gram[(a, a)] += r;
                }

                let w = linalg::solve(gram, DVector::from_element(k, 1.0))?;
                let total = w.sum();
                Ok((ns, w.iter().map(|v| v / total).collect()))
            })
            .collect()
    }
}

impl Default for LocallyLinear {
    fn default() -> Self {
        Self::new(25)
    }
}

impl Projection for LocallyLinear {
    fn name(&self) -> &str {
        "Locally Linear Embedding"
    }

    fn project(&self, data: &[Vec<f32>]) -> Result<Vec<Point2>> {
        check_input(data, 3)?;
        if self.n_neighbors < 2 {
            return Err(Error::InvalidParameter {
                name: "n_neighbors",
                message: "must be at least 2",
            });
        }
        if self.reg.is_nan() || self.reg <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "reg",
                message: "must be positive",
            });
        }

        let n = data.len();
        let weights = self.weights(data)?;

        // M = (I - W)ᵀ (I - W)
        let mut m = DenseSymmetric::zeros(n);
        for i in 0..n {
            m.add(i, i, 1.0);
        }
        for (i, (ns, w)) in weights.iter().enumerate() {
            for (&j, &wij) in ns.iter().zip(w) {
                m.add(i, j, -wij);
            }
            for p in 0..ns.len() {
                for q in p..ns.len() {
                    m.add(ns[p], ns[q], w[p] * w[q]);
                }
            }
        }

        // The graph is connected, so the null space is the constant vector alone.
        let pairs = linalg::bottom_eigenpairs(&m, 3)?;
        Ok((0..n)
            .map(|i| [pairs.vectors[1][i], pairs.vectors[2][i]])
            .collect())
    }
}

/// Laplacian eigenmaps on an RBF affinity.
#[derive(Debug, Clone, Default)]
pub struct SpectralEmbedding {
    gamma: Option<f64>,
}

impl SpectralEmbedding {
    /// Create the projection with the median-heuristic kernel width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the RBF kernel width instead of using the median heuristic.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }
}

impl Projection for SpectralEmbedding {
    fn name(&self) -> &str {
        "Spectral embedding"
    }

    fn project(&self, data: &[Vec<f32>]) -> Result<Vec<Point2>> {
        check_input(data, 3)?;
        let n = data.len();
        let (w, degree) = rbf_affinity(data, self.gamma)?;
        let inv_sqrt: Vec<f64> = degree
            .iter()
            .map(|&d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 })
            .collect();
        let a = DenseSymmetric::from_fn(n, |i, j| w.get(i, j) * inv_sqrt[i] * inv_sqrt[j]);

        // The leading eigenvector is sqrt(degree); skip it.
        let pairs = linalg::top_eigenpairs(&a, 3)?;
        Ok((0..n)
            .map(|i| {
                [
                    pairs.vectors[1][i] * inv_sqrt[i],
                    pairs.vectors[2][i] * inv_sqrt[i],
                ]
            })
            .collect())
    }
}

/// The four projections of the inspection experiment, in panel order.
pub fn standard_projections(n_neighbors: usize) -> Vec<Box<dyn Projection>> {
    vec![
        Box::new(Isomap::new(n_neighbors)) as Box<dyn Projection>,
        Box::new(LocallyLinear::new(n_neighbors)),
        Box::new(TruncatedSvd::new()),
        Box::new(SpectralEmbedding::new()),
    ]
}

/// Distance between the inlier and outlier centroids, in units of the pooled RMS
/// spread of points around their own class centroid.
///
/// Infinite when both classes collapse to distinct single points.
pub fn separation(points: &[Point2], labels: &[u8]) -> Result<f64> {
    if points.len() != labels.len() {
        return Err(Error::LengthMismatch {
            expected: labels.len(),
            found: points.len(),
        });
    }

    let mut sums = [[0.0f64; 2]; 2];
    let mut counts = [0usize; 2];
    for (p, &l) in points.iter().zip(labels) {
        let c = usize::from(l != 0);
        counts[c] += 1;
        sums[c][0] += p[0];
        sums[c][1] += p[1];
    }
    if counts[0] == 0 || counts[1] == 0 {
        return Err(Error::InvalidParameter {
            name: "labels",
            message: "need both inliers and outliers",
        });
    }
    let centroid = |c: usize| [sums[c][0] / counts[c] as f64, sums[c][1] / counts[c] as f64];
    let (c0, c1) = (centroid(0), centroid(1));

    let spread: f64 = points
        .iter()
        .zip(labels)
        .map(|(p, &l)| {
            let c = if l != 0 { c1 } else { c0 };
            (p[0] - c[0]).powi(2) + (p[1] - c[1]).powi(2)
        })
        .sum::<f64>()
        / points.len() as f64;
    let gap = ((c1[0] - c0[0]).powi(2) + (c1[1] - c0[1]).powi(2)).sqrt();

    if spread > 0.0 {
        Ok(gap / spread.sqrt())
    } else if gap > 0.0 {
        Ok(f64::INFINITY)
    } else {
        Ok(0.0)
    }
}
