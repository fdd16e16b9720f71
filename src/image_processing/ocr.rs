use std::io::Write;
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::image_processing::preprocess::PreprocessedBitmap;
use crate::normalize::normalize;

/// Page segmentation mode 6: a single uniform block of text.
const PAGE_SEGMENTATION_MODE: &str = "6";
/// Engine mode 3: legacy and LSTM recognisers combined.
const ENGINE_MODE: &str = "3";

/// Anything able to turn a binarized bitmap into raw text.
pub trait TextRecognizer {
    fn recognize(&self, bitmap: &PreprocessedBitmap) -> Result<String>;
}

/// Runs the `tesseract` executable, feeding it PNG data over stdin.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: Utf8PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: Option<Utf8PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.unwrap_or_else(|| Utf8PathBuf::from("tesseract")),
            language: language.into(),
        }
    }

    /// Asks the executable for its version. Returns `None` when it cannot be
    /// started, which usually means it is not installed or not on `PATH`.
    pub fn probe(&self) -> Option<String> {
        let output = Command::new(&self.command).arg("--version").output();
        match output {
            Ok(output) if output.status.success() => {
                // tesseract has printed its version to either stream over time
                let text = if output.stdout.is_empty() {
                    output.stderr
                } else {
                    output.stdout
                };
                let version = String::from_utf8_lossy(&text)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                info!(command = %self.command, %version, "found tesseract");
                Some(version)
            }
            Ok(output) => {
                warn!(command = %self.command, status = %output.status, "tesseract --version failed");
                None
            }
            Err(e) => {
                warn!(command = %self.command, "unable to run tesseract: {e}");
                None
            }
        }
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, bitmap: &PreprocessedBitmap) -> Result<String> {
        let png = bitmap.to_png()?;
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout"])
            .args(["--oem", ENGINE_MODE, "--psm", PAGE_SEGMENTATION_MODE])
            .args(["-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::OcrEngineFailure(format!("failed to start {}: {e}", self.command)))?;

        // Written from a separate thread so the child is always reaped, even
        // when it exits before consuming the whole image.
        let feeder = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || -> std::io::Result<()> {
                stdin.write_all(&png)?;
                stdin.flush()
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| Error::OcrEngineFailure(format!("tesseract did not finish: {e}")))?;
        let sent = match feeder {
            Some(feeder) => feeder
                .join()
                .map_err(|_| Error::OcrEngineFailure("image writer panicked".into()))?,
            None => Err(std::io::Error::other("stdin unavailable")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::OcrEngineFailure(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        sent.map_err(|e| Error::OcrEngineFailure(format!("failed to send image: {e}")))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pure Rust recognition through `ocrs`, with the models loaded up front.
pub struct OcrsEngine {
    engine: OcrEngine,
}

impl OcrsEngine {
    pub fn new(detection_model: &Utf8Path, recognition_model: &Utf8Path) -> Result<Self> {
        let load = |path: &Utf8Path| {
            rten::Model::load_file(path).map_err(|e| {
                Error::OcrEngineFailure(format!("failed to load model {path}: {e}"))
            })
        };

        let params = OcrEngineParams {
            detection_model: Some(load(detection_model)?),
            recognition_model: Some(load(recognition_model)?),
            ..Default::default()
        };
        let engine = OcrEngine::new(params)
            .map_err(|e| Error::OcrEngineFailure(format!("failed to create engine: {e}")))?;

        Ok(Self { engine })
    }
}

impl TextRecognizer for OcrsEngine {
    fn recognize(&self, bitmap: &PreprocessedBitmap) -> Result<String> {
        let image = DynamicImage::ImageLuma8(bitmap.to_gray_image()).to_rgb8();
        let img_source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| Error::OcrEngineFailure(format!("invalid image source: {e}")))?;
        let input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| Error::OcrEngineFailure(format!("failed to prepare input: {e}")))?;
        self.engine
            .get_text(&input)
            .map_err(|e| Error::OcrEngineFailure(format!("failed to get text: {e}")))
    }
}

/// Wraps a recognizer so that its output is always normalized and its
/// failures never escape.
pub struct OcrAdapter {
    engine: Box<dyn TextRecognizer>,
}

impl OcrAdapter {
    pub fn new(engine: impl TextRecognizer + 'static) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    /// Returns the normalized text for `bitmap`. A missing bitmap
    /// short-circuits to an empty string without calling the engine, and
    /// engine errors are logged and turned into an empty string.
    #[instrument(skip_all)]
    pub fn read_text(&self, bitmap: Option<&PreprocessedBitmap>) -> String {
        let Some(bitmap) = bitmap else {
            return String::new();
        };

        match self.engine.recognize(bitmap) {
            Ok(raw) => normalize(&raw),
            Err(e) => {
                warn!("{e}");
                String::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use image::{DynamicImage, GrayImage};

    use super::*;
    use crate::image_processing::preprocess::preprocess_image;

    /// Returns canned text and counts how often it was asked.
    #[derive(Clone, Default)]
    pub(crate) struct FakeRecognizer {
        pub text: String,
        pub fail: bool,
        pub calls: Rc<Cell<usize>>,
    }

    impl FakeRecognizer {
        pub(crate) fn returning(text: &str) -> Self {
            Self {
                text: text.to_string(),
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(&self, _bitmap: &PreprocessedBitmap) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(Error::OcrEngineFailure("engine exploded".into()))
            } else {
                Ok(self.text.clone())
            }
        }
    }

    fn bitmap() -> PreprocessedBitmap {
        preprocess_image(&DynamicImage::ImageLuma8(GrayImage::new(4, 4)))
    }

    #[test]
    fn normalizes_engine_output() {
        let adapter = OcrAdapter::new(FakeRecognizer::returning("  HELLO\n\n WORLD ©\n"));
        assert_eq!(adapter.read_text(Some(&bitmap())), "HELLO WORLD");
    }

    #[test]
    fn missing_bitmap_skips_the_engine() {
        let fake = FakeRecognizer::returning("never seen");
        let calls = fake.calls.clone();
        let adapter = OcrAdapter::new(fake);

        assert_eq!(adapter.read_text(None), "");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn engine_failure_becomes_empty_text() {
        let fake = FakeRecognizer::failing();
        let calls = fake.calls.clone();
        let adapter = OcrAdapter::new(fake);

        assert_eq!(adapter.read_text(Some(&bitmap())), "");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_tesseract_binary_is_an_engine_failure() {
        let engine = TesseractEngine::new(
            Some(Utf8PathBuf::from("/nonexistent/bin/tesseract")),
            "eng",
        );
        assert!(engine.probe().is_none());
        assert!(matches!(
            engine.recognize(&bitmap()),
            Err(Error::OcrEngineFailure(_))
        ));
    }

    #[cfg(unix)]
    fn fake_tesseract(dir: &tempfile::TempDir, script: &str) -> Utf8PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = Utf8PathBuf::from_path_buf(dir.path().join("tesseract")).unwrap();
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn noisy_bitmap() -> PreprocessedBitmap {
        let image = GrayImage::from_fn(1200, 900, |x, y| {
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 251;
            image::Luma([if v % 3 == 0 { 0 } else { 255 }])
        });
        preprocess_image(&DynamicImage::ImageLuma8(image))
    }

    #[cfg(unix)]
    #[test]
    fn early_exit_reports_engine_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = fake_tesseract(
            &dir,
            "echo \"Failed loading language 'xyz'\" >&2\nexit 1",
        );
        let engine = TesseractEngine::new(Some(command), "xyz");

        let bitmap = noisy_bitmap();
        for _ in 0..3 {
            match engine.recognize(&bitmap) {
                Err(Error::OcrEngineFailure(message)) => {
                    assert!(
                        message.contains("Failed loading language 'xyz'"),
                        "{message}"
                    );
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn reads_recognized_text_from_stdout() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = fake_tesseract(&dir, "cat > /dev/null\nprintf 'HELLO\\n  WORLD\\n'");
        let adapter = OcrAdapter::new(TesseractEngine::new(Some(command), "eng"));

        assert_eq!(adapter.read_text(Some(&noisy_bitmap())), "HELLO WORLD");
    }

    #[test]
    fn missing_models_fail_engine_construction() {
        let result = OcrsEngine::new(
            Utf8Path::new("/nonexistent/detection.rten"),
            Utf8Path::new("/nonexistent/recognition.rten"),
        );
        assert!(matches!(result, Err(Error::OcrEngineFailure(_))));
    }
}
