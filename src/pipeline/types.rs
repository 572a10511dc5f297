//! Data types moving through the subtitle extraction pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stable identifier of a source video (its path), shared by every frame of it.
pub type SourceId = Arc<Path>;

/// A frame file produced by the frame-extraction stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrame {
    /// Video this frame was sampled from.
    pub source: SourceId,
    /// 0-based position in the source's frame sequence.
    pub index: usize,
    /// Number of frames extracted from the source.
    pub total: usize,
    /// Presentation time in seconds.
    pub timestamp: f64,
    /// Image file on disk.
    pub path: PathBuf,
}

/// A frame after text recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFrame {
    pub source: SourceId,
    pub index: usize,
    pub total: usize,
    pub timestamp: f64,
    /// Recognized text, trimmed. Empty when nothing was read.
    pub text: String,
}

impl IndexedFrame {
    /// Creates an indexed frame.
    pub fn new(
        source: SourceId,
        index: usize,
        total: usize,
        timestamp: f64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            index,
            total,
            timestamp,
            text: text.into(),
        }
    }

    /// Attaches recognized text to an extracted frame, relaying its metadata.
    pub fn from_extracted(frame: ExtractedFrame, text: String) -> Self {
        Self {
            source: frame.source,
            index: frame.index,
            total: frame.total,
            timestamp: frame.timestamp,
            text,
        }
    }
}

/// A consolidated subtitle line, ready for the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    /// Timestamp of the first frame of the run, in seconds.
    pub start: f64,
    /// Timestamp of the last frame of the run, in seconds.
    pub end: f64,
    pub text: String,
    /// Number of frames in the run.
    pub frame_span: usize,
    /// Number of frames in the source video.
    pub frame_total: usize,
    pub source: SourceId,
}
