//! On-disk bottleneck cache.
//!
//! Extracting bottlenecks is by far the slowest part of an experiment, so every
//! labelled set is persisted as a NumPy `.npy` file named
//! `<label>_<architecture>.npy`. A file present under that name is trusted verbatim.
//!
//! # Staleness
//!
//! The key is only `(label, architecture)`: editing the images of a label does not
//! change it, and the cache keeps serving the old vectors. Delete the entry
//! ([`BottleneckCache::invalidate`]) or enable refresh
//! ([`BottleneckCache::with_refresh`]) after touching an image directory.
//!
//! The directory is read then written without locking. Entries are written to a
//! temporary sibling and renamed into place, so a reader never sees a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};

use crate::bottleneck::Bottlenecks;
use crate::error::{Error, Result};
use crate::extract::{self, FeatureExtractor};

/// Cache of bottleneck sets keyed by `(label, architecture)`.
#[derive(Debug, Clone)]
pub struct BottleneckCache {
    dir: PathBuf,
    architecture: String,
    refresh: bool,
}

impl BottleneckCache {
    /// Create a cache rooted at `dir` for one extractor architecture.
    pub fn new(dir: impl Into<PathBuf>, architecture: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            architecture: architecture.into(),
            refresh: false,
        }
    }

    /// Re-extract and overwrite entries instead of trusting them.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Architecture identifier used in every key.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Label of an image directory: its final path component.
    pub fn label_for(image_dir: &Path) -> Result<String> {
        image_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "cannot derive a label from image directory {}",
                    image_dir.display()
                ))
            })
    }

    /// File name of the entry for `label`.
    pub fn entry_name(&self, label: &str) -> String {
        format!("{}_{}.npy", label, self.architecture)
    }

    /// Full path of the entry for `label`.
    pub fn entry_path(&self, label: &str) -> PathBuf {
        self.dir.join(self.entry_name(label))
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.exists() {
            if !self.dir.is_dir() {
                return Err(Error::Configuration(format!(
                    "cache path {} is not a directory",
                    self.dir.display()
                )));
            }
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| Error::cache_io(&self.dir, e))
    }

    /// Load the entry for `label`, or `None` if there is none.
    pub fn load(&self, label: &str) -> Result<Option<Bottlenecks>> {
        let path = self.entry_path(label);
        if !path.is_file() {
            return Ok(None);
        }
        let array: Array2<f32> = read_npy(&path).map_err(|e| Error::cache_io(&path, e))?;
        Ok(Some(Bottlenecks::from_array(array)))
    }

    /// Persist `values` under `label`. Existing entries are kept unless refresh is on.
    pub fn store(&self, label: &str, values: &Bottlenecks) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.entry_path(label);
        if path.exists() && !self.refresh {
            warn!("cache entry {} already exists, not overwriting", path.display());
            return Ok(path);
        }

        let tmp = self.dir.join(format!("{}.tmp", self.entry_name(label)));
        write_npy(&tmp, &values.to_array()).map_err(|e| Error::cache_io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::cache_io(&path, e))?;
        Ok(path)
    }

    /// Delete the entry for `label`. Returns whether an entry existed.
    pub fn invalidate(&self, label: &str) -> Result<bool> {
        let path = self.entry_path(label);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::cache_io(&path, e)),
        }
    }

    /// Load the bottlenecks of one image directory, extracting them on a miss.
    ///
    /// `extractor` may be `None` when the architecture has no in-process extractor;
    /// a miss is then an [`Error::Extraction`].
    pub fn load_or_extract(
        &self,
        image_dir: &Path,
        extractor: Option<&dyn FeatureExtractor>,
    ) -> Result<Bottlenecks> {
        self.ensure_dir()?;
        let label = Self::label_for(image_dir)?;
        let path = self.entry_path(&label);

        if !self.refresh {
            if let Some(values) = self.load(&label)? {
                info!("Loading bottlenecks from: {}", path.display());
                return Ok(values);
            }
        }

        let extractor = extractor.ok_or_else(|| {
            Error::extraction(
                image_dir,
                format!(
                    "no built-in extractor for architecture {}; provide {}",
                    self.architecture,
                    path.display()
                ),
            )
        })?;
        if extractor.architecture() != self.architecture {
            return Err(Error::Configuration(format!(
                "extractor architecture {} does not match cache architecture {}",
                extractor.architecture(),
                self.architecture
            )));
        }

        let values = extract::extract_directory(extractor, image_dir)?;
        let path = self.store(&label, &values)?;
        info!("Creating bottleneck for: {}", path.display());
        Ok(values)
    }

    /// Load every directory of `image_dirs`, keyed by label.
    pub fn load_all<P: AsRef<Path>>(
        &self,
        image_dirs: &[P],
        extractor: Option<&dyn FeatureExtractor>,
    ) -> Result<BTreeMap<String, Bottlenecks>> {
        let mut out = BTreeMap::new();
        for dir in image_dirs {
            let dir = dir.as_ref();
            let label = Self::label_for(dir)?;
            let values = self.load_or_extract(dir, extractor)?;
            out.insert(label, values);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ThumbnailExtractor;
    use std::cell::Cell;

    struct CountingExtractor {
        calls: Cell<usize>,
    }

    impl FeatureExtractor for CountingExtractor {
        fn architecture(&self) -> &str {
            "counting"
        }

        fn extract(&self, _image: &Path) -> Result<Vec<f32>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![self.calls.get() as f32, 0.5])
        }
    }

    fn image_dir(root: &Path, name: &str, n: usize) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..n {
            image::GrayImage::from_pixel(4, 4, image::Luma([i as u8 * 40]))
                .save(dir.join(format!("{i:03}.png")))
                .unwrap();
        }
        dir
    }

    #[test]
    fn test_entry_naming() {
        let cache = BottleneckCache::new("/tmp/x", "MobileNet_1.0_224");
        assert_eq!(cache.entry_name("Cat"), "Cat_MobileNet_1.0_224.npy");
        assert_eq!(
            BottleneckCache::label_for(Path::new("./Cat/")).unwrap(),
            "Cat"
        );
        assert!(BottleneckCache::label_for(Path::new("/")).is_err());
    }

    #[test]
    fn test_miss_then_hit_extracts_once() {
        let root = tempfile::tempdir().unwrap();
        let dir = image_dir(root.path(), "Cat", 3);
        let cache = BottleneckCache::new(root.path().join("cache"), "counting");
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };

        let first = cache.load_or_extract(&dir, Some(&extractor)).unwrap();
        assert_eq!(extractor.calls.get(), 3);
        assert!(cache.entry_path("Cat").is_file());

        let second = cache.load_or_extract(&dir, Some(&extractor)).unwrap();
        assert_eq!(extractor.calls.get(), 3, "hit must not re-extract");
        assert_eq!(first, second);
    }

    #[test]
    fn test_hit_ignores_changed_images() {
        let root = tempfile::tempdir().unwrap();
        let dir = image_dir(root.path(), "Dog", 2);
        let extractor = ThumbnailExtractor::new(2).unwrap();
        let cache = BottleneckCache::new(root.path().join("cache"), "thumbnail_2");

        let before = cache.load_or_extract(&dir, Some(&extractor)).unwrap();
        image_dir(root.path(), "Dog", 5);
        let after = cache.load_or_extract(&dir, Some(&extractor)).unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 2);

        // Manual invalidation picks up the new images.
        assert!(cache.invalidate("Dog").unwrap());
        assert!(!cache.invalidate("Dog").unwrap());
        let fresh = cache.load_or_extract(&dir, Some(&extractor)).unwrap();
        assert_eq!(fresh.len(), 5);
    }

    #[test]
    fn test_refresh_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let dir = image_dir(root.path(), "Flag", 2);
        let extractor = ThumbnailExtractor::new(2).unwrap();
        let cache = BottleneckCache::new(root.path().join("cache"), "thumbnail_2");
        cache.load_or_extract(&dir, Some(&extractor)).unwrap();

        image_dir(root.path(), "Flag", 4);
        let refreshing = cache.clone().with_refresh(true);
        assert_eq!(refreshing.load_or_extract(&dir, Some(&extractor)).unwrap().len(), 4);
        assert_eq!(cache.load("Flag").unwrap().unwrap().len(), 4);
    }

    #[test]
    fn test_miss_without_extractor_fails() {
        let root = tempfile::tempdir().unwrap();
        let dir = image_dir(root.path(), "Noise", 1);
        let cache = BottleneckCache::new(root.path().join("cache"), "MobileNet_1.0_224");
        let err = cache.load_or_extract(&dir, None).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_corrupt_entry_is_cache_error() {
        let root = tempfile::tempdir().unwrap();
        let cache = BottleneckCache::new(root.path(), "arch");
        fs::write(cache.entry_path("Cat"), b"garbage").unwrap();
        let err = cache.load("Cat").unwrap_err();
        assert!(matches!(err, Error::CacheIo { .. }));
    }

    #[test]
    fn test_cache_path_is_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not_a_dir");
        fs::write(&file, b"").unwrap();
        let cache = BottleneckCache::new(&file, "arch");
        let values = Bottlenecks::new(vec![vec![1.0]]).unwrap();
        assert!(matches!(
            cache.store("Cat", &values).unwrap_err(),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn test_load_all_keys_by_label() {
        let root = tempfile::tempdir().unwrap();
        let cat = image_dir(root.path(), "Cat", 2);
        let noise = image_dir(root.path(), "Noise", 1);
        let extractor = ThumbnailExtractor::new(3).unwrap();
        let cache = BottleneckCache::new(root.path().join("cache"), "thumbnail_3");

        let all = cache.load_all(&[cat, noise], Some(&extractor)).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["Cat", "Noise"]);
        assert_eq!(all["Cat"].dim(), 9);
    }
}
