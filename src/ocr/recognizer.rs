use crate::error::{HardsubError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for reading the text printed on a frame image.
///
/// This trait allows swapping implementations (real Tesseract vs mock).
pub trait TextRecognizer: Send + Sync {
    /// Recognizes the text of `image` in `language`.
    ///
    /// Returns the text with surrounding whitespace trimmed; an empty string
    /// when nothing was read.
    fn recognize(&self, image: &Path, language: &str) -> Result<String>;

    /// Name of the backing engine, for logs.
    fn name(&self) -> &str;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Arc<T> {
    fn recognize(&self, image: &Path, language: &str) -> Result<String> {
        (**self).recognize(image, language)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Recognizer answering from a fixed table, keyed by trailing path components.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    texts: Vec<(PathBuf, String)>,
    failing: Vec<PathBuf>,
    default_text: String,
}

impl MockRecognizer {
    /// Creates a recognizer that reads nothing from every image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Images whose path ends with `suffix` read as `text`.
    pub fn with_text(mut self, suffix: impl Into<PathBuf>, text: &str) -> Self {
        self.texts.push((suffix.into(), text.to_string()));
        self
    }

    /// Images not otherwise configured read as `text`.
    pub fn with_default(mut self, text: &str) -> Self {
        self.default_text = text.to_string();
        self
    }

    /// Recognition fails for images whose path ends with `suffix`.
    pub fn with_failure(mut self, suffix: impl Into<PathBuf>) -> Self {
        self.failing.push(suffix.into());
        self
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, image: &Path, _language: &str) -> Result<String> {
        if self.failing.iter().any(|suffix| image.ends_with(suffix)) {
            return Err(HardsubError::ExternalTool {
                tool: "mock".to_string(),
                message: format!("cannot read {}", image.display()),
            });
        }

        let text = self
            .texts
            .iter()
            .find(|(suffix, _)| image.ends_with(suffix))
            .map_or(self.default_text.as_str(), |(_, text)| text.as_str());
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
