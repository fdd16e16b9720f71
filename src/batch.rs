use std::fs::{self, ReadDir};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::extraction::{ExtractionResult, Extractor};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

pub fn is_supported_image(path: &Utf8Path) -> bool {
    path.extension()
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// Images with a supported extension that were processed.
    pub scanned: usize,
    /// Images that produced text.
    pub extracted: usize,
    /// Images that produced no text, including unreadable ones.
    pub empty: usize,
}

/// Walks a directory of images and extracts their text.
pub struct BatchExtractor<'a> {
    extractor: &'a Extractor,
}

impl<'a> BatchExtractor<'a> {
    pub fn new(extractor: &'a Extractor) -> Self {
        Self { extractor }
    }

    /// Starts a fresh walk over `directory`. Only failing to open the
    /// directory itself is an error; every image is handled in isolation.
    pub fn extract_all(&self, directory: &Utf8Path) -> Result<Extractions<'a>> {
        if !directory.is_dir() {
            return Err(Error::InvalidInput(directory.to_owned()));
        }
        let entries = fs::read_dir(directory)
            .map_err(|_| Error::InvalidInput(directory.to_owned()))?;

        info!("processing images in folder: {directory}");
        Ok(Extractions {
            entries,
            extractor: self.extractor,
            stats: BatchStats::default(),
        })
    }
}

/// Lazily yields one [`ExtractionResult`] per image that produced text.
/// Directory order is whatever the filesystem returns.
pub struct Extractions<'a> {
    entries: ReadDir,
    extractor: &'a Extractor,
    stats: BatchStats,
}

impl Extractions<'_> {
    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    fn next_image(&mut self) -> Option<Utf8PathBuf> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("unable to read directory entry: {e}");
                    continue;
                }
            };

            let path = match Utf8PathBuf::from_path_buf(entry.path()) {
                Ok(path) => path,
                Err(path) => {
                    warn!("skipping non UTF-8 path {}", path.display());
                    continue;
                }
            };

            if path.is_file() && is_supported_image(&path) {
                return Some(path);
            }
        }
    }
}

impl Iterator for Extractions<'_> {
    type Item = ExtractionResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.next_image()?;
            self.stats.scanned += 1;

            let result = self.extractor.extract_file(&path);
            if result.is_empty() {
                self.stats.empty += 1;
                info!("✗ no text extracted from {}", result.source_name());
                continue;
            }

            self.stats.extracted += 1;
            info!(
                "✓ extracted {} characters from {}",
                result.length(),
                result.source_name()
            );
            return Some(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    use super::*;
    use crate::image_processing::ocr::tests::FakeRecognizer;
    use crate::image_processing::ocr::OcrAdapter;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    fn write_image(dir: &Utf8Path, name: &str) {
        GrayImage::from_pixel(6, 6, Luma([200]))
            .save(dir.join(name))
            .unwrap();
    }

    fn extractor(text: &str) -> Extractor {
        Extractor::new(OcrAdapter::new(FakeRecognizer::returning(text)))
    }

    fn names(results: impl Iterator<Item = ExtractionResult>) -> BTreeSet<String> {
        results.map(|r| r.source_name().to_string()).collect()
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        for name in ["a.jpg", "b.JPEG", "c.Png", "d.bmp", "e.TIFF", "f.tif"] {
            assert!(is_supported_image(Utf8Path::new(name)), "{name}");
        }
        for name in ["notes.txt", "archive.png.zip", "noext", ".png"] {
            assert!(!is_supported_image(Utf8Path::new(name)), "{name}");
        }
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        std::fs::write(root.join("readme.txt"), "not an image").unwrap();

        let extractor = extractor("text");
        let mut results = BatchExtractor::new(&extractor).extract_all(&root).unwrap();
        assert!(results.next().is_none());
        assert_eq!(results.stats(), BatchStats::default());
    }

    #[test]
    fn corrupt_image_does_not_affect_valid_ones() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        write_image(&root, "one.png");
        write_image(&root, "two.bmp");

        let extractor = extractor("Some words");
        let batch = BatchExtractor::new(&extractor);
        let baseline = names(batch.extract_all(&root).unwrap());

        std::fs::write(root.join("corrupt.jpg"), b"\xff\xd8 truncated").unwrap();
        let mut results = batch.extract_all(&root).unwrap();
        let with_corrupt = names(results.by_ref());

        assert_eq!(baseline.len(), 2);
        assert_eq!(with_corrupt, baseline);
        assert_eq!(
            results.stats(),
            BatchStats {
                scanned: 3,
                extracted: 2,
                empty: 1,
            }
        );
    }

    #[test]
    fn images_without_text_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        write_image(&root, "blank.png");

        let extractor = extractor("  \n ");
        let mut results = BatchExtractor::new(&extractor).extract_all(&root).unwrap();
        assert!(results.next().is_none());
        assert_eq!(results.stats().empty, 1);
    }

    #[test]
    fn walks_are_restartable() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        write_image(&root, "a.png");
        write_image(&root, "b.png");

        let extractor = extractor("abc");
        let batch = BatchExtractor::new(&extractor);
        let first = names(batch.extract_all(&root).unwrap());
        let second = names(batch.extract_all(&root).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn missing_directory_is_invalid_input() {
        let extractor = extractor("abc");
        let result = BatchExtractor::new(&extractor).extract_all(Utf8Path::new("/no/such/dir"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
