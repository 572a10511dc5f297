//! Text recognition with the `tesseract` command-line tool.

use crate::defaults;
use crate::error::Result;
use crate::ocr::recognizer::TextRecognizer;
use crate::process::{CommandRunner, SystemCommandRunner};
use std::path::Path;
use std::sync::Arc;

/// Recognizer running `tesseract <image> stdout -l <lang> --psm <mode>`.
pub struct TesseractRecognizer {
    runner: Arc<dyn CommandRunner>,
    program: String,
    page_segmentation: u8,
}

impl TesseractRecognizer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: defaults::TESSERACT.to_string(),
            page_segmentation: defaults::PAGE_SEGMENTATION_MODE,
        }
    }

    /// Recognizer running the system's `tesseract`.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemCommandRunner::new()))
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the page segmentation mode passed as `--psm`.
    pub fn with_page_segmentation(mut self, mode: u8) -> Self {
        self.page_segmentation = mode;
        self
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &Path, language: &str) -> Result<String> {
        let image_arg = image.to_string_lossy();
        let psm = self.page_segmentation.to_string();
        let stdout = self.runner.run(
            &self.program,
            &[&*image_arg, "stdout", "-l", language, "--psm", psm.as_str()],
        )?;
        Ok(stdout.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardsubError;
    use crate::process::mock::MockCommandRunner;

    #[test]
    fn test_recognize_passes_language_and_psm() {
        let runner = Arc::new(MockCommandRunner::new().with_response("  Je reviens.\n\x0c"));
        let recognizer = TesseractRecognizer::new(runner.clone());

        let text = recognizer
            .recognize(Path::new("/out/ep1/frame_0000000042.png"), "fra")
            .unwrap();

        assert_eq!(text, "Je reviens.");
        assert_eq!(
            runner.call(0),
            Some((
                "tesseract".to_string(),
                vec![
                    "/out/ep1/frame_0000000042.png".to_string(),
                    "stdout".to_string(),
                    "-l".to_string(),
                    "fra".to_string(),
                    "--psm".to_string(),
                    "6".to_string(),
                ]
            ))
        );
    }

    #[test]
    fn test_blank_output_is_empty_text() {
        let runner = Arc::new(MockCommandRunner::new().with_response(" \n\x0c"));
        let recognizer = TesseractRecognizer::new(runner);
        assert_eq!(recognizer.recognize(Path::new("f.png"), "eng").unwrap(), "");
    }

    #[test]
    fn test_custom_program_and_mode() {
        let runner = Arc::new(MockCommandRunner::new());
        let recognizer = TesseractRecognizer::new(runner.clone())
            .with_program("/opt/tesseract/bin/tesseract")
            .with_page_segmentation(7);

        recognizer.recognize(Path::new("f.png"), "eng").unwrap();

        let (program, args) = runner.call(0).unwrap();
        assert_eq!(program, "/opt/tesseract/bin/tesseract");
        assert_eq!(args.last().unwrap(), "7");
        assert_eq!(recognizer.name(), "/opt/tesseract/bin/tesseract");
    }

    #[test]
    fn test_tool_failure_propagates() {
        let runner = Arc::new(MockCommandRunner::new().with_error(HardsubError::ToolNotFound {
            tool: "tesseract".to_string(),
        }));
        let recognizer = TesseractRecognizer::new(runner);

        assert!(matches!(
            recognizer.recognize(Path::new("f.png"), "fra"),
            Err(HardsubError::ToolNotFound { .. })
        ));
    }
}
