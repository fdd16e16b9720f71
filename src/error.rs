use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not decode image {path}")]
    UnreadableImage {
        path: Utf8PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("screen capture is not supported in this environment")]
    CaptureUnsupported,

    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("OCR engine failed: {0}")]
    OcrEngineFailure(String),

    #[error("could not write report {path}")]
    WriteFailure {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a valid file or directory")]
    InvalidInput(Utf8PathBuf),

    #[error("report name {0:?} must be a plain file name")]
    InvalidReportName(String),

    #[error("invalid configuration")]
    Configuration(#[from] config::ConfigError),
}
