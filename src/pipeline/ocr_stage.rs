//! OCR stage: sampled frame → frame with recognized text.

use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{ExtractedFrame, IndexedFrame};
use crate::ocr::TextRecognizer;
use std::sync::Arc;

/// Runs text recognition on each frame and relays its metadata.
#[derive(Clone)]
pub struct OcrStage {
    recognizer: Arc<dyn TextRecognizer>,
    language: Arc<str>,
}

impl OcrStage {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, language: &str) -> Self {
        Self {
            recognizer,
            language: Arc::from(language),
        }
    }
}

impl Stage for OcrStage {
    type Input = ExtractedFrame;
    type Output = IndexedFrame;

    fn name(&self) -> &'static str {
        "ocr"
    }

    fn process(&mut self, frame: ExtractedFrame) -> Result<Vec<IndexedFrame>, StageError> {
        let text = self.recognizer.recognize(&frame.path, &self.language)?;
        log::debug!(
            "[{}/{}] {:.3}s text: {}",
            frame.index,
            frame.total,
            frame.timestamp,
            text.replace('\n', " ")
        );
        Ok(vec![IndexedFrame::from_extracted(frame, text)])
    }
}
