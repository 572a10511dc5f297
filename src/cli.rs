//! Command-line interface for hardsub
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Extract burned-in subtitles from videos
#[derive(Parser, Debug)]
#[command(
    name = "hardsub",
    version,
    about = "Extract burned-in subtitles from videos into SubRip files"
)]
pub struct Cli {
    /// Video file, or directory of videos
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory receiving frames and .srt files (created if missing)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Height in pixels of the subtitle band kept from each frame (default: 100)
    #[arg(long, value_name = "PIXELS")]
    pub crop_height: Option<u32>,

    /// Top edge of the subtitle band, in pixels from the top (default: 380)
    #[arg(long = "y-pos", value_name = "PIXELS")]
    pub y_pos: Option<u32>,

    /// Frames sampled per second of video (default: 6.0)
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f64>,

    /// Tesseract language code (default: fra). Examples: eng, deu, fra+eng
    #[arg(long, value_name = "LANG")]
    pub lang: Option<String>,

    /// Number of parallel frame extraction workers (default: 1)
    #[arg(long, value_name = "N")]
    pub frame_workers: Option<usize>,

    /// Number of parallel OCR workers (default: 6)
    #[arg(long, value_name = "N")]
    pub ocr_workers: Option<usize>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start without asking for confirmation
    #[arg(long)]
    pub no_verify: bool,

    /// Suppress output (quiet mode)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose output (-v: per-video progress, -vv: per-frame diagnostics)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Applies explicitly given flags on top of `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(crop_height) = self.crop_height {
            config.extraction.crop_height = crop_height;
        }
        if let Some(y_pos) = self.y_pos {
            config.extraction.y_position = y_pos;
        }
        if let Some(fps) = self.fps {
            config.extraction.fps = fps;
        }
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
        if let Some(workers) = self.frame_workers {
            config.workers.frames = workers;
        }
        if let Some(workers) = self.ocr_workers {
            config.workers.ocr = workers;
        }
    }

    /// Whether to ask before starting.
    ///
    /// Only an interactive stdin is asked; piped or scripted runs proceed.
    pub fn needs_confirmation(&self, stdin_is_terminal: bool) -> bool {
        !self.no_verify && stdin_is_terminal
    }

    /// Log filter implied by `-q` / `-v`.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}

/// Returns true if `answer` to the start prompt means yes.
pub fn is_confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
