use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by this crate.
///
/// None of these are retried: every caller either propagates them or aborts.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Points in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// Ground truth and predictions are not index-aligned.
    #[error("length mismatch: ground truth has {expected} entries, predictions have {found}")]
    LengthMismatch {
        /// Ground-truth length.
        expected: usize,
        /// Prediction length.
        found: usize,
    },

    /// Bad label, image directory or cache directory.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The feature extractor failed on an image.
    #[error("feature extraction failed for {}: {message}", path.display())]
    Extraction {
        /// Image (or directory) being processed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A cache entry could not be read or written.
    #[error("cache entry {} unusable", path.display())]
    CacheIo {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O or npy error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A detection adapter failed.
    #[error("detector {detector} failed")]
    Adapter {
        /// Detector name.
        detector: String,
        /// Underlying clustering error.
        #[source]
        source: Box<Error>,
    },

    /// A neighbourhood graph is not connected, so geodesic distances are undefined.
    #[error("neighbourhood graph has {components} connected components")]
    Disconnected {
        /// Number of connected components found.
        components: usize,
    },

    /// An eigendecomposition did not converge.
    #[error("eigendecomposition did not converge within {iterations} iterations")]
    NotConverged {
        /// Iteration budget that was exhausted.
        iterations: usize,
    },

    /// A projection or label array could not be written.
    #[error("could not write {}", path.display())]
    Output {
        /// Output file path.
        path: PathBuf,
        /// Underlying npy error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Report writing failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV report writing failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn cache_io(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::CacheIo {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
