use camino::Utf8Path;
use tracing::{info, instrument, warn};

use crate::image_processing::ocr::OcrAdapter;
use crate::image_processing::preprocess::preprocess;
use crate::normalize::normalize;

/// Text recognised in one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    source_name: String,
    text: String,
    length: usize,
}

impl ExtractionResult {
    /// `text` is normalized on the way in, so a result never holds
    /// characters the report cannot carry.
    pub fn new(source_name: impl Into<String>, text: &str) -> Self {
        let text = normalize(text);
        let length = text.chars().count();
        Self {
            source_name: source_name.into(),
            text,
            length,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters in [`Self::text`].
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Preprocessing followed by recognition, for one image at a time.
pub struct Extractor {
    ocr: OcrAdapter,
}

impl Extractor {
    pub fn new(ocr: OcrAdapter) -> Self {
        Self { ocr }
    }

    /// Extracts the text of the image at `path`. Never fails: an image that
    /// cannot be decoded, or an engine error, yields an empty result.
    #[instrument(skip(self))]
    pub fn extract_file(&self, path: &Utf8Path) -> ExtractionResult {
        let source_name = path.file_name().unwrap_or(path.as_str());
        info!("processing {source_name}");

        let bitmap = match preprocess(path) {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                warn!("error preprocessing image: {e:?}");
                None
            }
        };
        let text = self.ocr.read_text(bitmap.as_ref());
        ExtractionResult::new(source_name, &text)
    }
}
