use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub(crate) struct UnionFind {
    pub(crate) parent: Vec<usize>,
    pub(crate) size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }

        // Union by size.
        let (big, small) = if self.size[ra] < self.size[rb] {
            (rb, ra)
        } else {
            (ra, rb)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    /// Component labels `0..c` in order of first appearance.
    pub(crate) fn labels(&mut self) -> Vec<usize> {
        let mut labels: Vec<usize> = (0..self.parent.len()).map(|i| self.find(i)).collect();
        compact_labels(&mut labels);
        labels
    }
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// Shared input validation: non-empty, uniform dimension. Returns the dimension.
pub(crate) fn validate(data: &[Vec<f32>]) -> Result<usize> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    for point in data {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
    }
    Ok(d)
}

/// Validate data and a requested cluster count.
pub(crate) fn validate_k(data: &[Vec<f32>], k: usize) -> Result<usize> {
    let d = validate(data)?;
    if k == 0 || k > data.len() {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: data.len(),
        });
    }
    Ok(d)
}

/// Index of the centroid nearest to `point`, with its squared distance.
pub(crate) fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Median of all pairwise squared distances (0.0 for fewer than two points).
pub(crate) fn median_squared_distance(data: &[Vec<f32>]) -> f64 {
    let n = data.len();
    let mut d2: Vec<f64> = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            d2.push(f64::from(squared_euclidean(&data[i], &data[j])));
        }
    }
    if d2.is_empty() {
        return 0.0;
    }
    let mid = d2.len() / 2;
    let (_, m, _) = d2.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Relabel so cluster ids are `0..k` in order of first appearance.
pub(crate) fn compact_labels(labels: &mut [usize]) {
    let mut map: Vec<(usize, usize)> = Vec::new();
    for l in labels.iter_mut() {
        let id = match map.iter().find(|(old, _)| old == l) {
            Some(&(_, new)) => new,
            None => {
                let new = map.len();
                map.push((*l, new));
                new
            }
        };
        *l = id;
    }
}
