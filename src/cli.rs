use camino::Utf8PathBuf;
use clap::{ArgGroup, Parser};

use glean::configuration::{Configuration, EngineKind};

#[derive(Debug, Parser)]
#[command(name = "glean", version)]
#[command(about = "Extract text from images using OCR and save it to a text report")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "screenshot"])))]
pub struct Cli {
    /// Input image file or folder containing images.
    #[arg(short, long)]
    pub input: Option<Utf8PathBuf>,

    /// Take a screenshot and extract text from it.
    #[arg(short, long)]
    pub screenshot: bool,

    /// Delay in seconds before taking the screenshot.
    #[arg(long, conflicts_with = "input")]
    pub delay: Option<u64>,

    /// Report file name, created inside the output directory.
    #[arg(short, long, default_value = "extracted_text.txt")]
    pub output: String,

    /// Path to the tesseract executable, if it is not on PATH.
    #[arg(short, long)]
    pub tesseract_path: Option<Utf8PathBuf>,

    /// OCR engine to use.
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,

    /// Tesseract language code.
    #[arg(long)]
    pub language: Option<String>,

    /// Keep the screenshot file after its text has been saved.
    #[arg(long)]
    pub keep_capture: bool,

    /// Configuration file; defaults to glean.{toml,yaml,json} when present.
    #[arg(long, env = "GLEAN_CONFIG")]
    pub config: Option<Utf8PathBuf>,
}

impl Cli {
    /// Command-line flags take precedence over every other source.
    pub fn apply(&self, configuration: &mut Configuration) {
        if let Some(delay) = self.delay {
            configuration.capture_delay_secs = delay;
        }
        if let Some(path) = &self.tesseract_path {
            configuration.tesseract_path = Some(path.clone());
        }
        if let Some(engine) = self.engine {
            configuration.engine = engine;
        }
        if let Some(language) = &self.language {
            configuration.language = language.clone();
        }
    }
}
