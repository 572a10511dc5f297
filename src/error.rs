//! Error types for hardsub.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HardsubError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input/output path errors
    #[error("Invalid input path {}: {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Invalid output path {}: {reason}", .path.display())]
    InvalidOutput { path: PathBuf, reason: String },

    // External tool errors (frame extraction, OCR)
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    // Pipeline invariant errors
    #[error("Queue '{queue}' is closed")]
    ClosedQueue { queue: String },

    #[error(
        "Inconsistent frame buffer for {}: expected {expected}, got {actual}",
        .video.display()
    )]
    BufferInconsistency {
        video: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Stage '{stage}' cannot run with concurrency {requested}: {reason}")]
    InvalidConcurrency {
        stage: String,
        requested: usize,
        reason: String,
    },

    #[error("Failed to start worker thread for stage '{stage}': {message}")]
    WorkerSpawn { stage: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HardsubError>;
