use camino::Utf8Path;
use image::{DynamicImage, GrayImage, ImageFormat};
use ndarray::{Array2, Zip};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;
const MEDIAN_WINDOW: usize = 3;

/// Single-channel bitmap holding only [`BACKGROUND`] and [`FOREGROUND`]
/// pixels, with the dimensions of the image it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedBitmap {
    pixels: Array2<u8>,
}

impl PreprocessedBitmap {
    pub fn width(&self) -> u32 {
        self.pixels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.nrows() as u32
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            image::Luma([self.pixels[[y as usize, x as usize]]])
        })
    }

    /// Encodes the bitmap as PNG, the format handed to external engines.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = std::io::Cursor::new(vec![]);
        self.to_gray_image()
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| Error::OcrEngineFailure(format!("failed to encode bitmap: {e}")))?;
        Ok(bytes.into_inner())
    }
}

fn to_ndarray(image: &DynamicImage) -> Array2<u8> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32).0[0]
    })
}

/// Picks the global threshold that maximises the between-class variance of
/// the intensity histogram (Otsu's method). Ties resolve to the lowest
/// threshold, so the result is deterministic.
pub fn otsu_threshold(gray: &Array2<u8>) -> u8 {
    let mut histogram = [0u64; 256];
    for &value in gray {
        histogram[value as usize] += 1;
    }

    let total = gray.len() as f64;
    if total == 0.0 {
        return 0;
    }

    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_weight = 0.0;
    let mut background_sum = 0.0;
    let mut best_threshold = 0u8;
    let mut best_variance = 0.0;

    for (value, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        background_sum += value as f64 * count as f64;

        let foreground_weight = total - background_weight;
        if background_weight == 0.0 || foreground_weight == 0.0 {
            continue;
        }

        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_sum - background_sum) / foreground_weight;
        let difference = background_mean - foreground_mean;
        let variance = background_weight * foreground_weight * difference * difference;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }

    best_threshold
}

/// Pixels strictly above `threshold` become foreground, the rest background.
pub fn binarize(gray: &Array2<u8>, threshold: u8) -> Array2<u8> {
    gray.mapv(|value| if value > threshold { FOREGROUND } else { BACKGROUND })
}

/// 3x3 median filter. Borders are handled by replicating the edge pixels.
pub fn median_filter(image: &Array2<u8>) -> Array2<u8> {
    let (height, width) = image.dim();
    if height == 0 || width == 0 {
        return image.clone();
    }

    let radius = MEDIAN_WINDOW / 2;
    let padded = Array2::from_shape_fn((height + 2 * radius, width + 2 * radius), |(y, x)| {
        let y = y.saturating_sub(radius).min(height - 1);
        let x = x.saturating_sub(radius).min(width - 1);
        image[[y, x]]
    });

    Zip::from(padded.windows((MEDIAN_WINDOW, MEDIAN_WINDOW))).map_collect(|window| {
        let mut values = [0u8; MEDIAN_WINDOW * MEDIAN_WINDOW];
        for (slot, &value) in values.iter_mut().zip(window.iter()) {
            *slot = value;
        }
        values.sort_unstable();
        values[values.len() / 2]
    })
}

/// Grayscale, Otsu binarization and speckle removal for an in-memory image.
pub fn preprocess_image(image: &DynamicImage) -> PreprocessedBitmap {
    let gray = to_ndarray(image);
    let threshold = otsu_threshold(&gray);
    debug!(threshold, "binarizing image");
    let binary = binarize(&gray, threshold);
    PreprocessedBitmap {
        pixels: median_filter(&binary),
    }
}

/// Loads the image at `path` and prepares it for recognition.
#[instrument]
pub fn preprocess(path: &Utf8Path) -> Result<PreprocessedBitmap> {
    let image = image::open(path).map_err(|source| Error::UnreadableImage {
        path: path.to_owned(),
        source,
    })?;
    Ok(preprocess_image(&image))
}
