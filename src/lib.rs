//! Extracts text from screenshots and image files and collects it into a
//! plain-text report.
//!
//! A run moves every image through [`image_processing::preprocess()`]
//! (grayscale, Otsu binarization, median denoising), an OCR engine wrapped by
//! [`image_processing::ocr::OcrAdapter`], and [`normalize::normalize`], before
//! [`report::ReportWriter`] persists the results.

pub mod batch;
pub mod capture;
pub mod configuration;
pub mod error;
pub mod extraction;
pub mod image_processing;
pub mod normalize;
pub mod report;

pub use error::{Error, Result};
