use crate::error::Result;

/// A hard partition of a feature matrix: one cluster id per row.
///
/// Ids are dense (`0..n_found`) but carry no meaning beyond grouping; the
/// detection adapters decide which cluster is the inlier class.
pub trait Clustering {
    /// Fit the model on `data` and label every row.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;

    /// Configured cluster count, or 0 when the algorithm finds it (DBSCAN).
    fn n_clusters(&self) -> usize;
}

impl<C: Clustering + ?Sized> Clustering for Box<C> {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        (**self).fit_predict(data)
    }

    fn n_clusters(&self) -> usize {
        (**self).n_clusters()
    }
}
