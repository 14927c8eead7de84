//! Clustering-based outlier detection on image bottleneck features.
//!
//! `taint` measures how well unsupervised detectors find pollutants mixed into a
//! clean image set. Images are reduced to bottleneck vectors (cached on disk per
//! label and architecture), a clean set is contaminated step by step with a
//! pollutant set, and each detector's false-negative and false-positive rates are
//! recorded as the contamination grows.
//!
//! - [`cache`] / [`extract`]: image directories to [`Bottlenecks`], with a `.npy` cache
//! - [`cluster`]: k-means, agglomerative, spectral, BIRCH, DBSCAN
//! - [`detect`]: clustering partitions to inlier/outlier predictions
//! - [`score`]: false negatives, false positives, accuracy/precision/recall
//! - [`sweep`]: the pollution sweep benchmark
//! - [`embed`]: 2-D projections for inspecting separability
//! - [`report`]: CSV and `.npy` output

#![forbid(unsafe_code)]

pub mod bottleneck;
pub mod cache;
pub mod cluster;
pub mod detect;
pub mod embed;
pub mod error;
pub mod extract;
pub mod report;
pub mod score;
pub mod sweep;

pub(crate) mod linalg;

pub use bottleneck::Bottlenecks;
pub use cache::BottleneckCache;
pub use cluster::{Agglomerative, Birch, Clustering, Dbscan, Kmeans, KmeansFit, Spectral};
pub use detect::{standard_suite, OutlierDetector, INLIER, OUTLIER};
pub use embed::Projection;
pub use error::{Error, Result};
pub use sweep::{PollutionSweep, SweepReport};
