//! Text-recognition collaborator.

pub mod recognizer;
pub mod tesseract;

pub use recognizer::{MockRecognizer, TextRecognizer};
pub use tesseract::TesseractRecognizer;
