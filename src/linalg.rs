//! Dense linear algebra for the spectral and manifold methods.
//!
//! Matrices are assembled as [`DenseSymmetric`] and handed to `nalgebra` for the
//! actual decompositions: `SymmetricEigen` for eigenpairs, LU for linear solves.
//! Everything is `f64` and sized for a few thousand rows at most.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{Error, Result};

/// Dense symmetric `n x n` matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DenseSymmetric {
    n: usize,
    data: Vec<f64>,
}

impl DenseSymmetric {
    pub(crate) fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from `f(i, j)` evaluated on the upper triangle and mirrored.
    pub(crate) fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in i..n {
                m.set(i, j, f(i, j));
            }
        }
        m
    }

    #[inline]
    pub(crate) fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub(crate) fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Set `(i, j)` and `(j, i)`.
    #[inline]
    pub(crate) fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] = v;
        self.data[j * self.n + i] = v;
    }

    /// Add `v` to `(i, j)` and, off the diagonal, to `(j, i)`.
    #[inline]
    pub(crate) fn add(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] += v;
        if i != j {
            self.data[j * self.n + i] += v;
        }
    }

    pub(crate) fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.n, self.n, &self.data)
    }
}

/// Eigenvalues with their unit eigenvectors (`vectors[j]` has length `n`).
///
/// Each eigenvector is oriented so that its largest-magnitude component is
/// positive, which makes results reproducible across runs.
#[derive(Debug, Clone)]
pub(crate) struct Eigenpairs {
    pub(crate) values: Vec<f64>,
    pub(crate) vectors: Vec<Vec<f64>>,
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn oriented(column: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = column.collect();
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
    v
}

fn eigenpairs(m: &DenseSymmetric, k: usize, largest: bool) -> Result<Eigenpairs> {
    let n = m.n();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if k == 0 || k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }
    if m.data.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "matrix",
            message: "contains non-finite entries",
        });
    }

    let max_iter = 30 * n + 100;
    let eigen = SymmetricEigen::try_new(m.to_matrix(), f64::EPSILON, max_iter)
        .ok_or(Error::NotConverged { iterations: max_iter })?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    if largest {
        order.reverse();
    }
    order.truncate(k);

    Ok(Eigenpairs {
        values: order.iter().map(|&c| eigen.eigenvalues[c]).collect(),
        vectors: order
            .iter()
            .map(|&c| oriented(eigen.eigenvectors.column(c).iter().copied()))
            .collect(),
    })
}

/// The `k` algebraically largest eigenpairs, eigenvalues descending.
pub(crate) fn top_eigenpairs(m: &DenseSymmetric, k: usize) -> Result<Eigenpairs> {
    eigenpairs(m, k, true)
}

/// The `k` algebraically smallest eigenpairs, eigenvalues ascending.
pub(crate) fn bottom_eigenpairs(m: &DenseSymmetric, k: usize) -> Result<Eigenpairs> {
    eigenpairs(m, k, false)
}

/// Solve `a x = b` with an LU decomposition.
pub(crate) fn solve(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>> {
    if !a.is_square() || a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: b.len(),
            found: a.nrows(),
        });
    }
    a.lu().solve(&b).ok_or(Error::InvalidParameter {
        name: "matrix",
        message: "singular system",
    })
}

/// Pairwise squared Euclidean distances.
pub(crate) fn pairwise_squared(data: &[Vec<f32>]) -> DenseSymmetric {
    DenseSymmetric::from_fn(data.len(), |i, j| {
        if i == j {
            0.0
        } else {
            data[i]
                .iter()
                .zip(&data[j])
                .map(|(a, b)| {
                    let d = f64::from(*a) - f64::from(*b);
                    d * d
                })
                .sum()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(values: &[f64]) -> DenseSymmetric {
        DenseSymmetric::from_fn(values.len(), |i, j| if i == j { values[i] } else { 0.0 })
    }

    /// Laplacian of the path graph 0 - 1 - ... - (n-1).
    fn path_laplacian(n: usize) -> DenseSymmetric {
        let mut m = DenseSymmetric::zeros(n);
        for i in 0..n - 1 {
            m.add(i, i, 1.0);
            m.add(i + 1, i + 1, 1.0);
            m.add(i, i + 1, -1.0);
        }
        m
    }

    #[test]
    fn test_top_eigenpairs_diagonal() {
        let m = diag(&[1.0, 5.0, 3.0, -2.0, 0.5]);
        let pairs = top_eigenpairs(&m, 2).unwrap();
        assert!((pairs.values[0] - 5.0).abs() < 1e-12);
        assert!((pairs.values[1] - 3.0).abs() < 1e-12);
        assert!((pairs.vectors[0][1] - 1.0).abs() < 1e-12);
        assert!((pairs.vectors[1][2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bottom_eigenpairs_diagonal() {
        let m = diag(&[1.0, 5.0, 3.0, -2.0, 0.5]);
        let pairs = bottom_eigenpairs(&m, 2).unwrap();
        assert!((pairs.values[0] + 2.0).abs() < 1e-12);
        assert!((pairs.values[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bottom_eigenpairs_finds_null_vector() {
        // Path Laplacian: eigenvalues 2 - 2 cos(pi j / n), the first with a
        // constant eigenvector.
        let n = 100;
        let pairs = bottom_eigenpairs(&path_laplacian(n), 3).unwrap();

        assert!(pairs.values[0].abs() < 1e-10);
        let c = 1.0 / (n as f64).sqrt();
        assert!(pairs.vectors[0].iter().all(|x| (x - c).abs() < 1e-8));

        for (j, value) in pairs.values.iter().enumerate() {
            let exact = 2.0 - 2.0 * (std::f64::consts::PI * j as f64 / n as f64).cos();
            assert!((value - exact).abs() < 1e-10, "j={j}: {value} vs {exact}");
        }
        assert!(pairs.values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_top_eigenpairs_dense() {
        // [[2, 1], [1, 2]] has eigenvalues 3 and 1.
        let m = DenseSymmetric::from_fn(2, |i, j| if i == j { 2.0 } else { 1.0 });
        let pairs = top_eigenpairs(&m, 2).unwrap();
        assert!((pairs.values[0] - 3.0).abs() < 1e-12);
        assert!((pairs.values[1] - 1.0).abs() < 1e-12);
        let v = &pairs.vectors[0];
        assert!((v[0] - v[1]).abs() < 1e-12);
        assert!(dot(&pairs.vectors[0], &pairs.vectors[1]).abs() < 1e-12);
    }

    #[test]
    fn test_eigenpairs_reject_bad_input() {
        assert!(matches!(
            top_eigenpairs(&diag(&[1.0, 2.0]), 3),
            Err(Error::InvalidClusterCount { .. })
        ));
        assert!(matches!(
            bottom_eigenpairs(&DenseSymmetric::zeros(0), 1),
            Err(Error::EmptyInput)
        ));
        assert!(top_eigenpairs(&diag(&[1.0, f64::NAN]), 1).is_err());
    }

    #[test]
    fn test_solve() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 3.0, 1.0]);
        let x = solve(a, DVector::from_vec(vec![4.0, 5.0])).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(solve(singular, DVector::from_vec(vec![1.0, 2.0])).is_err());
    }

    #[test]
    fn test_pairwise_squared() {
        let m = pairwise_squared(&[vec![0.0, 0.0], vec![3.0, 4.0]]);
        assert_eq!(m.get(0, 1), 25.0);
        assert_eq!(m.get(1, 0), 25.0);
        assert_eq!(m.get(1, 1), 0.0);
    }
}
