//! BIRCH: Balanced Iterative Reducing and Clustering using Hierarchies.
//!
//! Points are streamed into a height-balanced *clustering feature* (CF) tree. Each
//! entry summarises a group of points by `(n, linear sum, squared norm sum)`, enough
//! to recover its centroid and radius. A point is absorbed by the closest leaf
//! subcluster if the radius stays under `threshold`; otherwise it starts a new
//! subcluster. Nodes holding more than `branching_factor` entries split around
//! their two farthest entries, and splits propagate up to the root.
//!
//! The leaf subclusters are then grouped into `n_clusters` with Ward agglomerative
//! clustering on their centroids, and each point takes the label of its nearest
//! subcluster.
//!
//! ## References
//!
//! Zhang, Ramakrishnan & Livny (1996). "BIRCH: An Efficient Data Clustering Method
//! for Very Large Databases." SIGMOD.

use super::agglomerative::Agglomerative;
use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};

/// BIRCH clustering algorithm.
#[derive(Debug, Clone)]
pub struct Birch {
    n_clusters: usize,
    threshold: f64,
    branching_factor: usize,
}

/// Clustering feature of a group of points.
#[derive(Debug, Clone)]
struct Feature {
    n: usize,
    linear_sum: Vec<f64>,
    squared_sum: f64,
    child: Option<usize>,
}

impl Feature {
    fn from_point(point: &[f64]) -> Self {
        Self {
            n: 1,
            linear_sum: point.to_vec(),
            squared_sum: point.iter().map(|x| x * x).sum(),
            child: None,
        }
    }

    fn empty(d: usize) -> Self {
        Self {
            n: 0,
            linear_sum: vec![0.0; d],
            squared_sum: 0.0,
            child: None,
        }
    }

    fn absorb(&mut self, other: &Feature) {
        self.n += other.n;
        for (a, b) in self.linear_sum.iter_mut().zip(&other.linear_sum) {
            *a += b;
        }
        self.squared_sum += other.squared_sum;
    }

    fn centroid(&self) -> Vec<f64> {
        let inv = 1.0 / self.n.max(1) as f64;
        self.linear_sum.iter().map(|x| x * inv).collect()
    }

    /// Radius (RMS distance to the centroid) if `point` were added.
    fn radius_with(&self, point: &Feature) -> f64 {
        let n = (self.n + point.n) as f64;
        let ss = self.squared_sum + point.squared_sum;
        let centroid_sq: f64 = self
            .linear_sum
            .iter()
            .zip(&point.linear_sum)
            .map(|(a, b)| {
                let c = (a + b) / n;
                c * c
            })
            .sum();
        (ss / n - centroid_sq).max(0.0).sqrt()
    }

    fn distance_sq(&self, point: &[f64]) -> f64 {
        let inv = 1.0 / self.n.max(1) as f64;
        self.linear_sum
            .iter()
            .zip(point)
            .map(|(s, x)| {
                let d = s * inv - x;
                d * d
            })
            .sum()
    }
}

#[derive(Debug, Clone)]
struct Node {
    leaf: bool,
    entries: Vec<Feature>,
}

/// A built CF tree: an arena of nodes.
#[derive(Debug)]
struct CfTree {
    nodes: Vec<Node>,
    root: usize,
    threshold: f64,
    branching_factor: usize,
    dim: usize,
}

impl CfTree {
    fn new(dim: usize, threshold: f64, branching_factor: usize) -> Self {
        Self {
            nodes: vec![Node {
                leaf: true,
                entries: Vec::new(),
            }],
            root: 0,
            threshold,
            branching_factor,
            dim,
        }
    }

    fn insert(&mut self, point: &[f64]) {
        let feature = Feature::from_point(point);
        if let Some((left, right)) = self.insert_at(self.root, &feature) {
            self.nodes.push(Node {
                leaf: false,
                entries: vec![left, right],
            });
            self.root = self.nodes.len() - 1;
        }
    }

    fn closest(&self, node: usize, point: &[f64]) -> Option<usize> {
        self.nodes[node]
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e.distance_sq(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Insert into the subtree at `node`. Returns replacement entries if it split.
    fn insert_at(&mut self, node: usize, feature: &Feature) -> Option<(Feature, Feature)> {
        let closest = self.closest(node, &feature.linear_sum);

        if self.nodes[node].leaf {
            let threshold = self.threshold;
            let entries = &mut self.nodes[node].entries;
            match closest {
                Some(i) if entries[i].radius_with(feature) <= threshold => {
                    entries[i].absorb(feature);
                }
                _ => entries.push(feature.clone()),
            }
        } else {
            let i = closest?;
            let child = self.nodes[node].entries[i].child?;
            match self.insert_at(child, feature) {
                Some((left, right)) => {
                    self.nodes[node].entries[i] = left;
                    self.nodes[node].entries.push(right);
                }
                None => self.nodes[node].entries[i].absorb(feature),
            }
        }

        if self.nodes[node].entries.len() > self.branching_factor {
            Some(self.split(node))
        } else {
            None
        }
    }

    /// Split `node` around its two farthest entries; the second half moves to a new node.
    fn split(&mut self, node: usize) -> (Feature, Feature) {
        let entries = std::mem::take(&mut self.nodes[node].entries);
        let leaf = self.nodes[node].leaf;
        let centroids: Vec<Vec<f64>> = entries.iter().map(Feature::centroid).collect();

        let mut seeds = (0, 1);
        let mut far = -1.0;
        for i in 0..centroids.len() {
            for j in (i + 1)..centroids.len() {
                let d: f64 = centroids[i]
                    .iter()
                    .zip(&centroids[j])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if d > far {
                    far = d;
                    seeds = (i, j);
                }
            }
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let to_left = if i == seeds.0 {
                true
            } else if i == seeds.1 {
                false
            } else {
                let c = &centroids[i];
                let dl: f64 = centroids[seeds.0].iter().zip(c).map(|(a, b)| (a - b) * (a - b)).sum();
                let dr: f64 = centroids[seeds.1].iter().zip(c).map(|(a, b)| (a - b) * (a - b)).sum();
                dl <= dr
            };
            if to_left {
                left.push(entry);
            } else {
                right.push(entry);
            }
        }

        let summarize = |entries: &[Feature], child: usize, dim: usize| {
            let mut f = Feature::empty(dim);
            for e in entries {
                f.absorb(e);
            }
            f.child = Some(child);
            f
        };

        let left_summary = summarize(&left, node, self.dim);
        self.nodes[node].entries = left;
        self.nodes.push(Node {
            leaf,
            entries: Vec::new(),
        });
        let right_idx = self.nodes.len() - 1;
        let right_summary = summarize(&right, right_idx, self.dim);
        self.nodes[right_idx].entries = right;

        (left_summary, right_summary)
    }

    fn leaf_centroids(&self) -> Vec<Vec<f64>> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            for e in &node.entries {
                if node.leaf {
                    out.push(e.centroid());
                } else if let Some(child) = e.child {
                    stack.push(child);
                }
            }
        }
        out
    }
}

impl Birch {
    /// Create a BIRCH clusterer producing `n_clusters` clusters.
    ///
    /// Defaults: `threshold = 0.5`, `branching_factor = 50`.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            threshold: 0.5,
            branching_factor: 50,
        }
    }

    /// Set the maximum subcluster radius.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum number of entries per CF node.
    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    /// Centroids of the leaf subclusters of the CF tree built from `data`.
    pub fn subclusters(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let d = util::validate(data)?;
        self.check_params()?;
        Ok(self
            .build(data, d)
            .leaf_centroids()
            .into_iter()
            .map(|c| c.into_iter().map(|x| x as f32).collect())
            .collect())
    }

    fn check_params(&self) -> Result<()> {
        if !(self.threshold >= 0.0 && self.threshold.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be non-negative and finite",
            });
        }
        if self.branching_factor < 2 {
            return Err(Error::InvalidParameter {
                name: "branching_factor",
                message: "must be at least 2",
            });
        }
        Ok(())
    }

    fn build(&self, data: &[Vec<f32>], d: usize) -> CfTree {
        let mut tree = CfTree::new(d, self.threshold, self.branching_factor);
        for point in data {
            let p: Vec<f64> = point.iter().map(|&x| f64::from(x)).collect();
            tree.insert(&p);
        }
        tree
    }
}

impl Clustering for Birch {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        util::validate_k(data, self.n_clusters)?;
        let subclusters = self.subclusters(data)?;

        // Fewer subclusters than requested clusters: every subcluster is its own cluster.
        let k = self.n_clusters.min(subclusters.len());
        let global = Agglomerative::new(k).fit_predict(&subclusters)?;

        let mut labels: Vec<usize> = data
            .iter()
            .map(|p| global[util::nearest(p, &subclusters).0])
            .collect();
        util::compact_labels(&mut labels);
        Ok(labels)
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}
