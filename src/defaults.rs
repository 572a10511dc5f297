//! Default configuration constants for hardsub.
//!
//! Shared by the TOML configuration, the CLI and the stage builders so the
//! three never drift apart.

/// Default frame sampling rate in frames per second.
///
/// Six samples per second is dense enough to catch short subtitle lines
/// while keeping the OCR workload manageable.
pub const FPS: f64 = 6.0;

/// Default height in pixels of the cropped subtitle band.
pub const CROP_HEIGHT: u32 = 100;

/// Default vertical offset in pixels of the cropped subtitle band.
///
/// Tuned for 480p sources where subtitles sit in the lower fifth.
pub const Y_POSITION: u32 = 380;

/// Default OCR language code (Tesseract traineddata name).
pub const LANGUAGE: &str = "fra";

/// Default Tesseract page segmentation mode.
///
/// Mode 6 assumes a single uniform block of text, which matches a cropped
/// subtitle band and skips layout analysis.
pub const PAGE_SEGMENTATION_MODE: u8 = 6;

/// Default number of frame-extraction workers.
pub const FRAME_WORKERS: usize = 1;

/// Default number of OCR workers.
pub const OCR_WORKERS: usize = 6;

/// Capacity of the telemetry side channel before the oldest messages are dropped.
pub const TELEMETRY_BUFFER: usize = 1024;

/// Default frame-extraction program.
pub const FFMPEG: &str = "ffmpeg";

/// Default stream probing program.
pub const FFPROBE: &str = "ffprobe";

/// Default OCR program.
pub const TESSERACT: &str = "tesseract";

/// File extensions recognised as video inputs when scanning a directory.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "m4v", "mpg", "mpeg", "wmv", "flv", "ts", "ogv",
];

/// Extension of the subtitle files written next to the extracted frames.
pub const SUBTITLE_EXTENSION: &str = "srt";
