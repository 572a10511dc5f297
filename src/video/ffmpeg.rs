//! Frame sampling with the `ffmpeg` and `ffprobe` command-line tools.

use crate::defaults;
use crate::error::{HardsubError, Result};
use crate::process::{CommandRunner, SystemCommandRunner};
use crate::video::extractor::{ExtractionRequest, FrameExtractor, FrameFile};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = "png";

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

/// Extractor driving `ffprobe` to check for a video stream, then `ffmpeg`
/// to crop and sample frames.
///
/// The `fps` filter re-times its output to a time base of `1/fps`, so the
/// `<pts>` in `frame_<pts>.png` counts sampling periods from the start of
/// the video and a frame's timestamp is `pts / fps` seconds.
pub struct FfmpegExtractor {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegExtractor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            ffmpeg: defaults::FFMPEG.to_string(),
            ffprobe: defaults::FFPROBE.to_string(),
        }
    }

    /// Extractor running the system's `ffmpeg` and `ffprobe`.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemCommandRunner::new()))
    }

    /// Overrides the program names or paths.
    pub fn with_programs(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Fails unless `video` has a video stream to sample.
    fn check_video_stream(&self, video: &str) -> Result<()> {
        let stdout = self.runner.run(
            &self.ffprobe,
            &[
                "-v",
                "quiet",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "json",
                video,
            ],
        )?;

        let output: FfprobeOutput = serde_json::from_str(&stdout)?;
        if output
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("video"))
        {
            Ok(())
        } else {
            Err(HardsubError::ExternalTool {
                tool: self.ffprobe.clone(),
                message: format!("no video stream in {video}"),
            })
        }
    }

    fn sample(&self, video: &str, frames_dir: &Path, request: &ExtractionRequest) -> Result<()> {
        let filter = format!(
            "fps=fps={}:round=up,crop=w=in_w:h={}:x=0:y={}",
            request.fps, request.crop_height, request.y_position
        );
        let pattern = frames_dir
            .join(format!("{FRAME_PREFIX}%010d.{FRAME_EXTENSION}"))
            .to_string_lossy()
            .into_owned();

        self.runner.run(
            &self.ffmpeg,
            &[
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                video,
                "-vf",
                filter.as_str(),
                "-frame_pts",
                "1",
                pattern.as_str(),
            ],
        )?;
        Ok(())
    }
}

impl FrameExtractor for FfmpegExtractor {
    fn extract(&self, video: &Path, request: &ExtractionRequest) -> Result<Vec<FrameFile>> {
        let video_arg = video.to_string_lossy();
        self.check_video_stream(&video_arg)?;

        let frames_dir = request.frames_dir(video);
        fs::create_dir_all(&frames_dir)?;
        let stale = clear_frames(&frames_dir)?;
        if stale > 0 {
            log::debug!(
                "{}: removed {stale} frame(s) left by an earlier run",
                frames_dir.display()
            );
        }

        self.sample(&video_arg, &frames_dir, request)?;

        let frames = list_frames(&frames_dir)?
            .into_iter()
            .map(|(pts, path)| FrameFile {
                path,
                timestamp: pts as f64 / request.fps,
            })
            .collect();
        Ok(frames)
    }

    fn name(&self) -> &str {
        &self.ffmpeg
    }
}

/// Extracts the presentation tick from a `frame_<pts>.png` file name.
pub fn frame_pts(path: &Path) -> Option<u64> {
    if path.extension()? != FRAME_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FRAME_PREFIX)?
        .parse()
        .ok()
}

/// Lists sampled frames in `dir`, sorted by presentation tick.
///
/// Files that do not follow the frame naming scheme are ignored.
fn list_frames(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(pts) = frame_pts(&path) {
            frames.push((pts, path));
        }
    }
    frames.sort_by_key(|(pts, _)| *pts);
    Ok(frames)
}

/// Deletes every sampled frame in `dir` and returns how many were removed.
///
/// Other files are left alone.
fn clear_frames(dir: &Path) -> Result<usize> {
    let stale = list_frames(dir)?;
    for (_, path) in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale.len())
}
