use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use image::{ImageFormat, RgbaImage};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};

/// Platform hook that grabs the whole screen.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self) -> Result<RgbaImage>;
}

/// A screenshot written to disk.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    path: Utf8PathBuf,
    timestamp: OffsetDateTime,
}

impl CaptureArtifact {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }

    /// Deletes the capture file. Failure is logged and reported through the
    /// return value only.
    pub fn discard(self) -> bool {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("deleted capture {}", self.path);
                true
            }
            Err(e) => {
                warn!("could not delete capture {}: {e}", self.path);
                false
            }
        }
    }
}

pub fn capture_file_name(timestamp: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = timestamp
        .format(&format)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string());
    format!("capture_{stamp}.png")
}

/// Creates a new, previously absent capture file. A capture taken within the
/// same second as an existing one gets a `_<n>` suffix.
fn create_capture_file(
    directory: &Utf8Path,
    timestamp: OffsetDateTime,
) -> io::Result<(Utf8PathBuf, File)> {
    let base = capture_file_name(timestamp);
    let stem = base.trim_end_matches(".png");
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => base.clone(),
            n => format!("{stem}_{n}.png"),
        };
        let path = directory.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Produces screenshots into a capture directory, if the environment allows
/// it. Availability is settled when the source is built.
#[derive(Clone)]
pub struct CaptureSource {
    directory: Utf8PathBuf,
    grabber: Option<Arc<dyn ScreenGrabber>>,
}

impl CaptureSource {
    pub fn new(directory: impl Into<Utf8PathBuf>, grabber: impl ScreenGrabber + 'static) -> Self {
        Self {
            directory: directory.into(),
            grabber: Some(Arc::new(grabber)),
        }
    }

    pub fn unsupported(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            grabber: None,
        }
    }

    /// Probes the platform once and returns a source that is either usable
    /// or permanently unavailable.
    pub fn detect(directory: impl Into<Utf8PathBuf>) -> Self {
        match platform::probe() {
            Some(grabber) => Self::new(directory, grabber),
            None => {
                warn!("screenshot functionality is not available in this environment");
                Self::unsupported(directory)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.grabber.is_some()
    }

    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Waits `delay` with a per-second countdown, then saves a screenshot
    /// as `capture_<YYYYMMDD_HHMMSS>.png` in the capture directory.
    #[instrument(skip(self))]
    pub async fn capture(&self, delay: Duration) -> Result<CaptureArtifact> {
        let grabber = self.grabber.clone().ok_or(Error::CaptureUnsupported)?;

        countdown(delay).await;
        info!("taking screenshot now");

        let directory = self.directory.clone();
        tokio::task::spawn_blocking(move || {
            let image = grabber.grab()?;
            std::fs::create_dir_all(&directory)
                .map_err(|e| Error::CaptureFailed(format!("cannot create {directory}: {e}")))?;

            let timestamp = now();
            let (path, file) = create_capture_file(&directory, timestamp)
                .map_err(|e| Error::CaptureFailed(format!("cannot create capture file: {e}")))?;
            let mut out = BufWriter::new(file);
            let saved = image
                .write_to(&mut out, ImageFormat::Png)
                .map_err(|e| e.to_string())
                .and_then(|()| out.flush().map_err(|e| e.to_string()));
            drop(out);
            if let Err(e) = saved {
                let _ = std::fs::remove_file(&path);
                return Err(Error::CaptureFailed(format!("cannot save {path}: {e}")));
            }
            info!("screenshot saved to {path}");

            Ok(CaptureArtifact { path, timestamp })
        })
        .await
        .map_err(|e| Error::CaptureFailed(format!("capture task failed: {e}")))?
    }
}

async fn countdown(delay: Duration) {
    let mut remaining = delay.as_secs();
    if remaining > 0 {
        info!("taking screenshot in {remaining} seconds, prepare your screen");
    }
    while remaining > 0 {
        info!("{remaining}...");
        tokio::time::sleep(Duration::from_secs(1)).await;
        remaining -= 1;
    }
    let fraction = delay - Duration::from_secs(delay.as_secs());
    if !fraction.is_zero() {
        tokio::time::sleep(fraction).await;
    }
}

#[cfg(feature = "screen-capture")]
mod platform {
    use image::{imageops, Rgba, RgbaImage};
    use tracing::{debug, warn};
    use xcap::Monitor;

    use super::ScreenGrabber;
    use crate::error::{Error, Result};

    /// Grabs every monitor and places them side by side.
    pub struct XcapGrabber;

    impl ScreenGrabber for XcapGrabber {
        fn grab(&self) -> Result<RgbaImage> {
            let failed = |e: xcap::XCapError| Error::CaptureFailed(e.to_string());
            let monitors = Monitor::all().map_err(failed)?;
            if monitors.is_empty() {
                return Err(Error::CaptureFailed("no monitors detected".into()));
            }

            let mut shots = Vec::with_capacity(monitors.len());
            for monitor in &monitors {
                shots.push(monitor.capture_image().map_err(failed)?);
            }

            let width: u32 = shots.iter().map(|s| s.width()).sum();
            let height = shots.iter().map(|s| s.height()).max().unwrap_or(0);
            let mut composite = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
            let mut x_offset = 0i64;
            for shot in &shots {
                imageops::overlay(&mut composite, shot, x_offset, 0);
                x_offset += i64::from(shot.width());
            }
            Ok(composite)
        }
    }

    pub fn probe() -> Option<XcapGrabber> {
        match Monitor::all() {
            Ok(monitors) if !monitors.is_empty() => {
                debug!(monitors = monitors.len(), "screen capture available");
                Some(XcapGrabber)
            }
            Ok(_) => {
                warn!("no monitors detected");
                None
            }
            Err(e) => {
                warn!("screen capture unavailable: {e}");
                None
            }
        }
    }
}

#[cfg(not(feature = "screen-capture"))]
mod platform {
    use super::ScreenGrabber;
    use crate::error::Result;

    pub enum NoGrabber {}

    impl ScreenGrabber for NoGrabber {
        fn grab(&self) -> Result<image::RgbaImage> {
            match *self {}
        }
    }

    pub fn probe() -> Option<NoGrabber> {
        None
    }
}
