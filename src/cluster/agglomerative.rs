//! Agglomerative (bottom-up hierarchical) clustering.
//!
//! Every point starts as its own cluster; the two closest clusters are merged until
//! `n_clusters` remain. Cluster distances are updated with the Lance-Williams
//! recurrence, and merges are found with the nearest-neighbour chain algorithm,
//! which needs O(n²) time and memory for every linkage offered here (all of them
//! are *reducible*, so the chain never has to backtrack).
//!
//! ## Linkages
//!
//! - **Ward** (default): merge the pair that least increases within-cluster
//!   variance. Tends to produce compact clusters of similar size.
//! - **Average**: mean pairwise distance between members.
//! - **Complete**: largest pairwise distance.
//! - **Single**: smallest pairwise distance. Prone to chaining.
//!
//! ## References
//!
//! Müllner (2011). "Modern hierarchical, agglomerative clustering algorithms."

use super::traits::Clustering;
use super::util::{self, UnionFind};
use crate::error::Result;
use crate::linalg;

/// How the distance between two clusters is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    /// Minimum variance increase.
    #[default]
    Ward,
    /// Mean pairwise distance.
    Average,
    /// Maximum pairwise distance.
    Complete,
    /// Minimum pairwise distance.
    Single,
}

/// One merge of the dendrogram: clusters represented by points `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Representative point of the first cluster.
    pub a: usize,
    /// Representative point of the second cluster.
    pub b: usize,
    /// Linkage distance at which the merge happens.
    pub distance: f64,
    /// Size of the merged cluster.
    pub size: usize,
}

/// Agglomerative clustering.
#[derive(Debug, Clone)]
pub struct Agglomerative {
    n_clusters: usize,
    linkage: Linkage,
}

impl Agglomerative {
    /// Create a clusterer that stops at `n_clusters` clusters (Ward linkage).
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            linkage: Linkage::Ward,
        }
    }

    /// Set the linkage criterion.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Build the full dendrogram, merges sorted by ascending distance.
    pub fn dendrogram(&self, data: &[Vec<f32>]) -> Result<Vec<Merge>> {
        util::validate(data)?;
        Ok(self.merges(data))
    }

    fn merges(&self, data: &[Vec<f32>]) -> Vec<Merge> {
        let n = data.len();
        let mut dist = linalg::pairwise_squared(data);
        if self.linkage != Linkage::Ward {
            for i in 0..n {
                for j in (i + 1)..n {
                    dist.set(i, j, dist.get(i, j).sqrt());
                }
            }
        }

        let mut size = vec![1usize; n];
        let mut active = vec![true; n];
        let mut remaining = n;
        let mut chain: Vec<usize> = Vec::with_capacity(n);
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        while remaining > 1 {
            if chain.is_empty() {
                // `remaining > 1` guarantees an active slot.
                let start = active.iter().position(|&a| a).unwrap_or(0);
                chain.push(start);
            }

            let a = chain[chain.len() - 1];
            let prev = if chain.len() >= 2 {
                Some(chain[chain.len() - 2])
            } else {
                None
            };

            // Nearest active neighbour of `a`; ties go to `prev` so the chain terminates.
            let mut best = prev;
            let mut best_d = prev.map_or(f64::INFINITY, |p| dist.get(a, p));
            for c in 0..n {
                if c == a || !active[c] {
                    continue;
                }
                let d = dist.get(a, c);
                if d < best_d {
                    best = Some(c);
                    best_d = d;
                }
            }
            let Some(b) = best else { break };

            if Some(b) == prev {
                chain.pop();
                chain.pop();

                let (na, nb) = (size[a] as f64, size[b] as f64);
                let dab = dist.get(a, b);
                for c in 0..n {
                    if !active[c] || c == a || c == b {
                        continue;
                    }
                    let nc = size[c] as f64;
                    let (dac, dbc) = (dist.get(a, c), dist.get(b, c));
                    let updated = match self.linkage {
                        Linkage::Ward => {
                            ((na + nc) * dac + (nb + nc) * dbc - nc * dab) / (na + nb + nc)
                        }
                        Linkage::Average => (na * dac + nb * dbc) / (na + nb),
                        Linkage::Complete => dac.max(dbc),
                        Linkage::Single => dac.min(dbc),
                    };
                    dist.set(a, c, updated);
                }

                size[a] += size[b];
                active[b] = false;
                remaining -= 1;
                merges.push(Merge {
                    a,
                    b,
                    distance: dab,
                    size: size[a],
                });
            } else {
                chain.push(b);
            }
        }

        merges.sort_by(|x, y| x.distance.total_cmp(&y.distance));
        merges
    }
}

impl Clustering for Agglomerative {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        util::validate_k(data, self.n_clusters)?;
        let n = data.len();
        let merges = self.merges(data);

        let mut uf = UnionFind::new(n);
        for m in merges.iter().take(n - self.n_clusters) {
            uf.union(m.a, m.b);
        }
        Ok(uf.labels())
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}
