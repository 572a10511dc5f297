use crate::defaults;
use crate::error::{HardsubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
    pub workers: WorkersConfig,
    pub tools: ToolsConfig,
    pub telemetry: TelemetryConfig,
}

/// Frame sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub fps: f64,
    pub crop_height: u32,
    pub y_position: u32,
}

/// Text recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    pub language: String,
    pub page_segmentation: u8,
}

/// Pool sizes of the parallel stages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkersConfig {
    pub frames: usize,
    pub ocr: usize,
}

/// External program names or paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub tesseract: String,
}

/// Progress side-channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub buffer: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fps: defaults::FPS,
            crop_height: defaults::CROP_HEIGHT,
            y_position: defaults::Y_POSITION,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: defaults::LANGUAGE.to_string(),
            page_segmentation: defaults::PAGE_SEGMENTATION_MODE,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            frames: defaults::FRAME_WORKERS,
            ocr: defaults::OCR_WORKERS,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: defaults::FFMPEG.to_string(),
            ffprobe: defaults::FFPROBE.to_string(),
            tesseract: defaults::TESSERACT.to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer: defaults::TELEMETRY_BUFFER,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is unreadable or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| HardsubError::ConfigParse {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(HardsubError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Resolves the configuration for a run.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) => Self::load_or_default(&path)?,
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - HARDSUB_LANG → ocr.language
    /// - HARDSUB_FPS → extraction.fps
    /// - HARDSUB_OCR_WORKERS → workers.ocr
    ///
    /// Empty values are ignored; unparsable numbers are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("HARDSUB_LANG")
            && !language.is_empty()
        {
            self.ocr.language = language;
        }

        if let Ok(fps) = std::env::var("HARDSUB_FPS")
            && !fps.is_empty()
        {
            match fps.parse() {
                Ok(fps) => self.extraction.fps = fps,
                Err(_) => log::warn!("Ignoring HARDSUB_FPS={fps}: not a number"),
            }
        }

        if let Ok(workers) = std::env::var("HARDSUB_OCR_WORKERS")
            && !workers.is_empty()
        {
            match workers.parse() {
                Ok(workers) => self.workers.ocr = workers,
                Err(_) => log::warn!("Ignoring HARDSUB_OCR_WORKERS={workers}: not a count"),
            }
        }

        self
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| {
            Err(HardsubError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };

        if !(self.extraction.fps.is_finite() && self.extraction.fps > 0.0) {
            return invalid("extraction.fps", "must be a positive number");
        }
        if self.extraction.crop_height == 0 {
            return invalid("extraction.crop_height", "must be at least 1 pixel");
        }
        if self.ocr.language.trim().is_empty() {
            return invalid("ocr.language", "must not be empty");
        }
        if self.workers.frames == 0 {
            return invalid("workers.frames", "must be at least 1");
        }
        if self.workers.ocr == 0 {
            return invalid("workers.ocr", "must be at least 1");
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/hardsub/config.toml on Linux, or `None` when the
    /// platform has no configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hardsub").join("config.toml"))
    }
}
