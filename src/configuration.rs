use camino::{Utf8Path, Utf8PathBuf};
use config::Config;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The external `tesseract` executable.
    Tesseract,
    /// The built-in ocrs recognizer, using `.rten` models.
    Ocrs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    /// Where screenshots are saved.
    pub capture_directory: Utf8PathBuf,
    /// Where reports are written.
    pub output_directory: Utf8PathBuf,
    /// Seconds to wait before taking a screenshot.
    pub capture_delay_secs: u64,
    pub engine: EngineKind,
    /// Location of the tesseract executable, if it is not on `PATH`.
    pub tesseract_path: Option<Utf8PathBuf>,
    /// Tesseract language code.
    pub language: String,
    pub detection_model: Utf8PathBuf,
    pub recognition_model: Utf8PathBuf,
}

/// Reads defaults, then an optional config file, then `GLEAN_*` environment
/// variables. Without an explicit `file`, `glean.{toml,yaml,json}` in the
/// working directory is used when present.
pub fn load(file: Option<&Utf8Path>) -> Result<Configuration> {
    let file_source = match file {
        Some(path) => config::File::with_name(path.as_str()),
        None => config::File::with_name("glean").required(false),
    };

    let settings = Config::builder()
        .set_default("capture_directory", "images")?
        .set_default("output_directory", "extracted")?
        .set_default("capture_delay_secs", 3)?
        .set_default("engine", "tesseract")?
        .set_default("language", "eng")?
        .set_default("detection_model", "models/text-detection.rten")?
        .set_default("recognition_model", "models/text-recognition.rten")?
        .add_source(file_source)
        .add_source(config::Environment::with_prefix("GLEAN"))
        .build()?;

    settings.try_deserialize().map_err(From::from)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = Utf8PathBuf::from_path_buf(dir.path().join("absent")).unwrap();
        assert!(load(Some(&missing)).is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("glean.toml")).unwrap();
        std::fs::write(
            &path,
            "output_directory = \"reports\"\nengine = \"ocrs\"\ncapture_delay_secs = 5\ntesseract_path = \"/opt/tesseract/bin/tesseract\"\n",
        )
        .unwrap();

        let configuration = load(Some(&path)).unwrap();
        assert_eq!(configuration.output_directory, "reports");
        assert_eq!(configuration.capture_directory, "images");
        assert_eq!(configuration.engine, EngineKind::Ocrs);
        assert_eq!(configuration.capture_delay_secs, 5);
        assert_eq!(configuration.language, "eng");
        assert_eq!(
            configuration.tesseract_path.as_deref(),
            Some(Utf8Path::new("/opt/tesseract/bin/tesseract"))
        );
    }
}
