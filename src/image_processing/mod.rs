pub mod ocr;
pub mod preprocess;

pub use preprocess::{preprocess, PreprocessedBitmap};
