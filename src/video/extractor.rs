//! Frame-extraction collaborator interface and an in-memory mock.

use crate::defaults;
use crate::error::{HardsubError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where and how to sample frames from a video.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    /// Frames per second to sample.
    pub fps: f64,
    /// Height in pixels of the band kept from each frame.
    pub crop_height: u32,
    /// Top edge of the kept band, in pixels from the top of the frame.
    pub y_position: u32,
    /// Parent directory; each video gets its own subdirectory.
    pub frames_root: PathBuf,
}

impl ExtractionRequest {
    /// Directory receiving the frames of `video`: `<frames_root>/<stem>`.
    pub fn frames_dir(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "video".into());
        self.frames_root.join(stem)
    }
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            fps: defaults::FPS,
            crop_height: defaults::CROP_HEIGHT,
            y_position: defaults::Y_POSITION,
            frames_root: PathBuf::from("."),
        }
    }
}

/// One sampled frame on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFile {
    pub path: PathBuf,
    /// Presentation time in seconds.
    pub timestamp: f64,
}

/// File name of the frame sampled at presentation tick `tick`.
pub fn frame_file_name(tick: u64) -> String {
    format!("frame_{tick:010}.png")
}

/// Trait for sampling frames out of a video.
///
/// Implementations return frames in presentation order; the frame count of
/// the video is the length of the returned list.
pub trait FrameExtractor: Send + Sync {
    /// Samples `video` according to `request`.
    fn extract(&self, video: &Path, request: &ExtractionRequest) -> Result<Vec<FrameFile>>;

    /// Name of the backing tool, for logs.
    fn name(&self) -> &str;
}

impl<T: FrameExtractor + ?Sized> FrameExtractor for Arc<T> {
    fn extract(&self, video: &Path, request: &ExtractionRequest) -> Result<Vec<FrameFile>> {
        (**self).extract(video, request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Extractor that fabricates frame lists without touching the disk.
#[derive(Debug, Clone, Default)]
pub struct MockFrameExtractor {
    timestamps: Vec<f64>,
    per_video: HashMap<String, Vec<f64>>,
    failing: Vec<String>,
}

impl MockFrameExtractor {
    /// Every video yields `count` frames sampled at `fps`.
    pub fn new(count: usize, fps: f64) -> Self {
        Self {
            timestamps: (0..count).map(|i| i as f64 / fps).collect(),
            ..Self::default()
        }
    }

    /// Every video yields frames at exactly these timestamps.
    pub fn with_timestamps(mut self, timestamps: Vec<f64>) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// The video whose file name is `file_name` yields these timestamps.
    pub fn with_video(mut self, file_name: &str, timestamps: Vec<f64>) -> Self {
        self.per_video.insert(file_name.to_string(), timestamps);
        self
    }

    /// Extraction of the video whose file name is `file_name` fails.
    pub fn with_failure(mut self, file_name: &str) -> Self {
        self.failing.push(file_name.to_string());
        self
    }
}

impl FrameExtractor for MockFrameExtractor {
    fn extract(&self, video: &Path, request: &ExtractionRequest) -> Result<Vec<FrameFile>> {
        let file_name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.failing.contains(&file_name) {
            return Err(HardsubError::ExternalTool {
                tool: "mock".to_string(),
                message: format!("cannot decode {file_name}"),
            });
        }

        let dir = request.frames_dir(video);
        let timestamps = self.per_video.get(&file_name).unwrap_or(&self.timestamps);
        Ok(timestamps
            .iter()
            .enumerate()
            .map(|(i, timestamp)| FrameFile {
                path: dir.join(frame_file_name(i as u64)),
                timestamp: *timestamp,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
