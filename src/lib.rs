//! hardsub - Extract burned-in subtitles from videos
//!
//! Samples a band of each video frame with ffmpeg, reads it with tesseract
//! and merges consecutive identical readings into SubRip entries.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod process;
pub mod srt;
pub mod video;

// Collaborator traits (video → frames → text)
pub use ocr::TextRecognizer;
pub use process::{CommandRunner, SystemCommandRunner};
pub use video::FrameExtractor;

// Pipeline
pub use pipeline::consolidation::ConsolidationEngine;
pub use pipeline::orchestrator::{Pipeline, PipelineReport};
pub use pipeline::types::{ExtractedFrame, IndexedFrame, SubtitleEntry};

// Error handling
pub use error::{HardsubError, Result};

// Config
pub use config::Config;

// Stage framework (for custom stages)
pub use pipeline::error::{ErrorReporter, StageError};
pub use pipeline::stage::Stage;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
