//! Bottleneck feature sets.
//!
//! A [`Bottlenecks`] value is one labelled set of fixed-length embeddings, one row
//! per image. Rows are kept as `Vec<Vec<f32>>` so they can be handed straight to the
//! [`Clustering`](crate::cluster::Clustering) algorithms; conversion to and from
//! `ndarray::Array2` happens only at the cache boundary.

use ndarray::Array2;

use crate::error::{Error, Result};

/// A feature-vector set: rows = samples, all of the same dimension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bottlenecks {
    rows: Vec<Vec<f32>>,
    dim: usize,
}

impl Bottlenecks {
    /// Build a set from rows, rejecting ragged input.
    pub fn new(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }
        Ok(Self { rows, dim })
    }

    /// Build a set from a 2-D array (rows = samples).
    pub fn from_array(array: Array2<f32>) -> Self {
        let dim = array.ncols();
        let rows = array.outer_iter().map(|row| row.to_vec()).collect();
        Self { rows, dim }
    }

    /// Copy the set into a 2-D array (rows = samples).
    pub fn to_array(&self) -> Array2<f32> {
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        // Shape is consistent by construction.
        Array2::from_shape_vec((self.rows.len(), self.dim), flat)
            .unwrap_or_else(|_| Array2::zeros((0, self.dim)))
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the set holds no samples.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Embedding dimension (0 for an empty set built from rows).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// The first `n` rows (or all of them if `n >= len`).
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            rows: self.rows[..n.min(self.rows.len())].to_vec(),
            dim: self.dim,
        }
    }

    /// The first `floor(len * fraction)` rows.
    pub fn take_fraction(&self, fraction: f64) -> Self {
        let n = (self.rows.len() as f64 * fraction.clamp(0.0, 1.0)).floor() as usize;
        self.truncated(n)
    }

    /// All rows of `self` followed by the first `take` rows of `other`.
    pub fn concat(&self, other: &Bottlenecks, take: usize) -> Result<Self> {
        let take = take.min(other.len());
        if take > 0 && !self.is_empty() && other.dim != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: other.dim,
            });
        }
        let mut rows = Vec::with_capacity(self.len() + take);
        rows.extend_from_slice(&self.rows);
        rows.extend_from_slice(&other.rows[..take]);
        let dim = if self.is_empty() { other.dim } else { self.dim };
        Ok(Self { rows, dim })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Bottlenecks::new(vec![vec![0.0, 1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_array_conversion_preserves_bits() {
        let rows = vec![vec![0.1, -3.5, f32::MIN_POSITIVE], vec![1e-30, 7.25, -0.0]];
        let set = Bottlenecks::new(rows.clone()).unwrap();
        let back = Bottlenecks::from_array(set.to_array());
        for (a, b) in back.rows().iter().flatten().zip(rows.iter().flatten()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(back.dim(), 3);
    }

    #[test]
    fn test_concat_and_fraction() {
        let clean = Bottlenecks::new(vec![vec![0.0]; 10]).unwrap();
        let dirty = Bottlenecks::new(vec![vec![1.0]; 4]).unwrap();

        let mixed = clean.concat(&dirty, 3).unwrap();
        assert_eq!(mixed.len(), 13);
        assert_eq!(mixed.rows()[12], vec![1.0]);

        // Asking for more than available takes everything.
        assert_eq!(clean.concat(&dirty, 99).unwrap().len(), 14);

        assert_eq!(clean.take_fraction(0.05).len(), 0);
        assert_eq!(clean.take_fraction(0.25).len(), 2);
    }

    #[test]
    fn test_concat_dimension_mismatch() {
        let a = Bottlenecks::new(vec![vec![0.0, 0.0]]).unwrap();
        let b = Bottlenecks::new(vec![vec![0.0]]).unwrap();
        assert!(a.concat(&b, 1).is_err());
        // Nothing taken from `b`: nothing to mismatch.
        assert!(a.concat(&b, 0).is_ok());
    }
}
