//! Subtitle extraction application entry point.
//!
//! Orchestrates the complete flow:
//! discover videos → extract frames → OCR → consolidate → write .srt

use crate::config::Config;
use crate::defaults;
use crate::error::{HardsubError, Result};
use crate::ocr::{TesseractRecognizer, TextRecognizer};
use crate::pipeline::error::{LogReporter, StageError, StageFailure};
use crate::pipeline::orchestrator::{Pipeline, StageDescriptor};
use crate::pipeline::telemetry::Telemetry;
use crate::pipeline::types::SubtitleEntry;
use crate::pipeline::{FrameStage, OcrStage, SubtitleStage};
use crate::srt;
use crate::video::{ExtractionRequest, FfmpegExtractor, FrameExtractor};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// Videos fed into the pipeline.
    pub videos: Vec<PathBuf>,
    /// Subtitle entries written across all files.
    pub entries: usize,
    /// Subtitle files written, one per video that produced entries.
    pub files: Vec<PathBuf>,
    pub failures: Vec<StageFailure>,
    pub stages: Vec<StageDescriptor>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Returns true if an internal invariant was violated during the run.
    ///
    /// Tool failures only cost the affected frames and do not count.
    pub fn has_invariant_violation(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, StageError::Invariant(_)))
    }
}

/// Returns true if `path` has a known video file extension.
pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            defaults::VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Lists the videos to process.
///
/// `input` is either a video file or a directory whose regular video files
/// are taken (not recursively), sorted by path. Each video's frames and
/// subtitles are named after its file stem, so two videos sharing a stem
/// are rejected.
pub fn discover_videos(input: &Path) -> Result<Vec<PathBuf>> {
    let invalid = |reason: &str| HardsubError::InvalidInput {
        path: input.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut videos = if input.is_file() {
        vec![input.to_path_buf()]
    } else if input.is_dir() {
        let mut found = Vec::new();
        for entry in fs::read_dir(input)? {
            let path = entry?.path();
            if path.is_file() {
                found.push(path);
            }
        }
        found
    } else {
        return Err(invalid("does not exist"));
    };

    videos.retain(|path| is_video(path));
    videos.sort();

    if videos.is_empty() {
        return Err(invalid("no video files found"));
    }

    let mut stems: HashMap<_, &PathBuf> = HashMap::new();
    for video in &videos {
        if let Some(first) = stems.insert(video.file_stem(), video) {
            return Err(invalid(&format!(
                "{} and {} would both write {}.srt",
                display_name(first),
                display_name(video),
                video.file_stem().unwrap_or_default().to_string_lossy()
            )));
        }
    }
    Ok(videos)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Creates the output directory if needed and checks it is a directory.
pub fn prepare_output(output: &Path) -> Result<()> {
    if !output.exists() {
        fs::create_dir_all(output)?;
    }
    if !output.is_dir() {
        return Err(HardsubError::InvalidOutput {
            path: output.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(())
}

/// Builds the three-stage pipeline.
pub fn build_pipeline(
    config: &Config,
    output: &Path,
    extractor: Arc<dyn FrameExtractor>,
    recognizer: Arc<dyn TextRecognizer>,
    telemetry: Telemetry,
) -> Result<Pipeline<PathBuf, SubtitleEntry>> {
    let request = ExtractionRequest {
        fps: config.extraction.fps,
        crop_height: config.extraction.crop_height,
        y_position: config.extraction.y_position,
        frames_root: output.to_path_buf(),
    };

    Ok(Pipeline::new()
        .stage(FrameStage::new(extractor, request), config.workers.frames)?
        .stage(OcrStage::new(recognizer, &config.ocr.language), config.workers.ocr)?
        .stage(SubtitleStage::new(), 1)?
        .with_error_reporter(Arc::new(LogReporter))
        .with_telemetry(telemetry))
}

/// Runs a complete extraction with the given collaborators.
///
/// Invalid input or output paths and invalid configuration abort before
/// any worker starts. Whatever the pipeline produced is written even when
/// some stage failed.
pub fn run(
    config: &Config,
    input: &Path,
    output: &Path,
    extractor: Arc<dyn FrameExtractor>,
    recognizer: Arc<dyn TextRecognizer>,
    telemetry: Telemetry,
) -> Result<RunSummary> {
    config.validate()?;
    let videos = discover_videos(input)?;
    prepare_output(output)?;

    log::info!(
        "Extracting subtitles from {} video(s) into {}",
        videos.len(),
        output.display()
    );

    let pipeline = build_pipeline(config, output, extractor, recognizer, telemetry)?;
    let report = pipeline.run(videos.clone())?;

    let entries = report.items.len();
    let files = srt::write_all(output, report.items)?;

    Ok(RunSummary {
        videos,
        entries,
        files,
        failures: report.failures,
        stages: report.descriptors,
        elapsed: report.elapsed,
    })
}

/// Runs a complete extraction with ffmpeg and tesseract.
pub fn run_with_system_tools(
    config: &Config,
    input: &Path,
    output: &Path,
    telemetry: Telemetry,
) -> Result<RunSummary> {
    let extractor = FfmpegExtractor::system()
        .with_programs(config.tools.ffmpeg.as_str(), config.tools.ffprobe.as_str());
    let recognizer = TesseractRecognizer::system()
        .with_program(config.tools.tesseract.as_str())
        .with_page_segmentation(config.ocr.page_segmentation);

    run(
        config,
        input,
        output,
        Arc::new(extractor),
        Arc::new(recognizer),
        telemetry,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::MockRecognizer;
    use crate::video::MockFrameExtractor;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_is_video() {
        assert!(is_video(Path::new("a.mp4")));
        assert!(is_video(Path::new("/x/Episode.MKV")));
        assert!(!is_video(Path::new("notes.txt")));
        assert!(!is_video(Path::new("mkv")));
    }

    #[test]
    fn test_discover_single_file() {
        let tmp = TempDir::new().unwrap();
        let video = touch(tmp.path(), "clip.mov");
        assert_eq!(discover_videos(&video).unwrap(), vec![video]);
    }

    #[test]
    fn test_discover_directory_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let b = touch(tmp.path(), "b.mkv");
        let a = touch(tmp.path(), "a.mp4");
        touch(tmp.path(), "cover.jpg");
        fs::create_dir(tmp.path().join("extras.mkv")).unwrap();

        assert_eq!(discover_videos(tmp.path()).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_discover_rejects_missing_and_empty_inputs() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_videos(&tmp.path().join("missing")),
            Err(HardsubError::InvalidInput { .. })
        ));

        touch(tmp.path(), "readme.md");
        match discover_videos(tmp.path()) {
            Err(HardsubError::InvalidInput { reason, .. }) => {
                assert_eq!(reason, "no video files found")
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_rejects_videos_sharing_a_stem() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "ep.mp4");
        touch(tmp.path(), "ep.mkv");
        touch(tmp.path(), "other.mkv");

        match discover_videos(tmp.path()) {
            Err(HardsubError::InvalidInput { path, reason }) => {
                assert_eq!(path, tmp.path());
                assert_eq!(reason, "ep.mkv and ep.mp4 would both write ep.srt");
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_output_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("nested").join("out");
        prepare_output(&output).unwrap();
        assert!(output.is_dir());
        // Existing directory is fine
        prepare_output(&output).unwrap();
    }

    #[test]
    fn test_prepare_output_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "out");
        assert!(matches!(
            prepare_output(&file),
            Err(HardsubError::InvalidOutput { .. })
        ));
    }

    #[test]
    fn test_build_pipeline_layout() {
        let mut config = Config::default();
        config.workers.ocr = 3;

        let pipeline = build_pipeline(
            &config,
            Path::new("out"),
            Arc::new(MockFrameExtractor::new(1, 6.0)),
            Arc::new(MockRecognizer::new()),
            Telemetry::disabled(),
        )
        .unwrap();

        let names: Vec<String> = pipeline.descriptors().iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["frames×1", "ocr×3", "subtitles×1"]);
        assert_eq!(pipeline.queue_count(), 4);
    }

    #[test]
    fn test_run_rejects_invalid_config_before_touching_output() {
        let tmp = TempDir::new().unwrap();
        let video = touch(tmp.path(), "a.mp4");
        let output = tmp.path().join("out");
        let mut config = Config::default();
        config.workers.ocr = 0;

        let result = run(
            &config,
            &video,
            &output,
            Arc::new(MockFrameExtractor::new(1, 6.0)),
            Arc::new(MockRecognizer::new()),
            Telemetry::disabled(),
        );

        assert!(matches!(result, Err(HardsubError::ConfigInvalidValue { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_run_with_system_tools_checks_paths_before_starting_tools() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.tools.ffmpeg = "hardsub-missing-ffmpeg".to_string();
        config.tools.tesseract = "hardsub-missing-tesseract".to_string();

        let result = run_with_system_tools(
            &config,
            &tmp.path().join("missing.mkv"),
            &tmp.path().join("out"),
            Telemetry::disabled(),
        );

        assert!(matches!(result, Err(HardsubError::InvalidInput { .. })));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_run_writes_one_file_per_video() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("videos");
        fs::create_dir(&input).unwrap();
        touch(&input, "a.mp4");
        touch(&input, "b.mkv");
        let output = tmp.path().join("out");

        let recognizer = MockRecognizer::new().with_default("Bonjour");
        let summary = run(
            &Config::default(),
            &input,
            &output,
            Arc::new(MockFrameExtractor::new(4, 2.0)),
            Arc::new(recognizer),
            Telemetry::disabled(),
        )
        .unwrap();

        assert_eq!(summary.videos.len(), 2);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.files, vec![output.join("a.srt"), output.join("b.srt")]);
        assert!(!summary.has_invariant_violation());
        assert_eq!(
            fs::read_to_string(output.join("a.srt")).unwrap(),
            "1\n00:00:00,000 --> 00:00:01,500\nBonjour\n\n"
        );
    }
}
