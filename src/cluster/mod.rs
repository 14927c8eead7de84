//! Clustering algorithms used as outlier detectors.
//!
//! None of these algorithms knows what an outlier is. The detection adapters in
//! [`crate::detect`] turn their partitions into inlier/outlier predictions, usually
//! by treating every point outside the most populated cluster as an outlier.
//!
//! ## Algorithms
//!
//! ### K-means
//!
//! Assign each point to the nearest centroid, move centroids to the mean of their
//! points, repeat. Assumes roughly spherical clusters of similar size, and needs k.
//!
//! ### Agglomerative
//!
//! Start from singletons and repeatedly merge the two closest clusters. The linkage
//! (Ward, average, complete, single) defines "closest".
//!
//! ### Spectral
//!
//! K-means on the leading eigenvectors of a normalised RBF affinity matrix. Finds
//! clusters that are connected rather than convex.
//!
//! ### BIRCH
//!
//! Compress the data into a tree of small subclusters in one pass, then cluster the
//! subcluster centroids.
//!
//! ### DBSCAN
//!
//! Density-based; reports points in sparse regions as noise.
//!
//! ## Usage
//!
//! ```rust
//! use taint::cluster::{Agglomerative, Birch, Clustering, Kmeans, Spectral};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).with_seed(42).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! for model in [
//!     Box::new(Agglomerative::new(2)) as Box<dyn Clustering>,
//!     Box::new(Spectral::new(2).with_seed(42)),
//!     Box::new(Birch::new(2)),
//! ] {
//!     let labels = model.fit_predict(&data).unwrap();
//!     assert_eq!(labels.len(), data.len());
//! }
//! ```

mod agglomerative;
mod birch;
mod dbscan;
mod kmeans;
mod spectral;
mod traits;
pub(crate) mod util;

pub use agglomerative::{Agglomerative, Linkage, Merge};
pub use birch::Birch;
pub use dbscan::Dbscan;
pub use kmeans::{Kmeans, KmeansFit};
pub use spectral::Spectral;
pub use traits::Clustering;

pub(crate) use spectral::rbf_affinity;
