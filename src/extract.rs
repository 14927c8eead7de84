//! Feature extraction.
//!
//! Bottleneck vectors normally come from an intermediate layer of a pretrained image
//! classifier. That network lives outside this crate: its output reaches us through
//! the cache (see [`crate::cache`]). The [`FeatureExtractor`] trait is the seam where
//! an in-process extractor plugs in; [`ThumbnailExtractor`] is the built-in one, a
//! downsampled grayscale image, which is enough to exercise the whole pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use log::debug;

use crate::bottleneck::Bottlenecks;
use crate::error::{Error, Result};

/// File extensions treated as images when listing a directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Turns one image into one fixed-length feature vector.
pub trait FeatureExtractor {
    /// Identifier of the architecture; part of every cache key.
    fn architecture(&self) -> &str;

    /// Extract the feature vector of a single image.
    fn extract(&self, image: &Path) -> Result<Vec<f32>>;
}

/// Grayscale thumbnail features: `side * side` luma values scaled to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    side: u32,
    architecture: String,
}

impl ThumbnailExtractor {
    /// Prefix of the architecture identifiers handled by this extractor.
    pub const PREFIX: &'static str = "thumbnail_";

    /// Create an extractor producing `side * side` features.
    pub fn new(side: u32) -> Result<Self> {
        if side == 0 {
            return Err(Error::InvalidParameter {
                name: "side",
                message: "must be at least 1",
            });
        }
        Ok(Self {
            side,
            architecture: format!("{}{}", Self::PREFIX, side),
        })
    }

    /// Thumbnail side length in pixels.
    pub fn side(&self) -> u32 {
        self.side
    }
}

impl FeatureExtractor for ThumbnailExtractor {
    fn architecture(&self) -> &str {
        &self.architecture
    }

    fn extract(&self, image: &Path) -> Result<Vec<f32>> {
        let img = image::open(image).map_err(|e| Error::extraction(image, e))?;
        let thumb = img
            .resize_exact(self.side, self.side, FilterType::Triangle)
            .to_luma8();
        Ok(thumb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect())
    }
}

/// Built-in extractor for an architecture identifier, if there is one.
///
/// Only `thumbnail_<side>` is built in. Network architectures such as
/// `MobileNet_1.0_224` return `None`: their bottlenecks must already be cached.
pub fn extractor_for(architecture: &str) -> Option<Box<dyn FeatureExtractor>> {
    let side = architecture
        .strip_prefix(ThumbnailExtractor::PREFIX)?
        .parse::<u32>()
        .ok()?;
    ThumbnailExtractor::new(side)
        .ok()
        .map(|e| Box::new(e) as Box<dyn FeatureExtractor>)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// List the images of a directory, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Configuration(format!(
            "image directory {} does not exist",
            dir.display()
        )));
    }
    let entries = fs::read_dir(dir).map_err(|e| Error::extraction(dir, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::extraction(dir, e))?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Run `extractor` over every image of `dir`, one row per image.
pub fn extract_directory(extractor: &dyn FeatureExtractor, dir: &Path) -> Result<Bottlenecks> {
    let images = list_images(dir)?;
    debug!(
        "extracting {} images from {} with {}",
        images.len(),
        dir.display(),
        extractor.architecture()
    );

    let mut rows = Vec::with_capacity(images.len());
    for path in &images {
        rows.push(extractor.extract(path)?);
    }

    Bottlenecks::new(rows).map_err(|e| Error::extraction(dir, e))
}
