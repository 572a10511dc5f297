//! Frame-extraction stage: video path → sampled frames.

use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{ExtractedFrame, SourceId};
use crate::video::{ExtractionRequest, FrameExtractor};
use std::path::PathBuf;
use std::sync::Arc;

/// Samples every input video and emits its frames with index and total.
#[derive(Clone)]
pub struct FrameStage {
    extractor: Arc<dyn FrameExtractor>,
    request: Arc<ExtractionRequest>,
}

impl FrameStage {
    pub fn new(extractor: Arc<dyn FrameExtractor>, request: ExtractionRequest) -> Self {
        Self {
            extractor,
            request: Arc::new(request),
        }
    }
}

impl Stage for FrameStage {
    type Input = PathBuf;
    type Output = ExtractedFrame;

    fn name(&self) -> &'static str {
        "frames"
    }

    fn process(&mut self, video: PathBuf) -> Result<Vec<ExtractedFrame>, StageError> {
        log::info!("Processing video file: {}", video.display());
        let frames = self.extractor.extract(&video, &self.request)?;

        if frames.is_empty() {
            log::warn!(
                "{} produced no frames, skipping (check the crop band and fps)",
                video.display()
            );
            return Ok(Vec::new());
        }

        let total = frames.len();
        log::info!(
            "Extracted {total} frames from {} with {}",
            video.display(),
            self.extractor.name()
        );

        let source: SourceId = Arc::from(video);
        Ok(frames
            .into_iter()
            .enumerate()
            .map(|(index, frame)| ExtractedFrame {
                source: source.clone(),
                index,
                total,
                timestamp: frame.timestamp,
                path: frame.path,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::MockFrameExtractor;
    use std::path::Path;

    fn stage(extractor: MockFrameExtractor) -> FrameStage {
        let request = ExtractionRequest {
            frames_root: PathBuf::from("/out"),
            ..ExtractionRequest::default()
        };
        FrameStage::new(Arc::new(extractor), request)
    }

    #[test]
    fn test_frames_are_indexed_with_total() {
        let mut stage = stage(MockFrameExtractor::new(4, 2.0));
        let frames = stage.process(PathBuf::from("/videos/ep1.mkv")).unwrap();

        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, i);
            assert_eq!(frame.total, 4);
            assert_eq!(frame.timestamp, i as f64 * 0.5);
            assert_eq!(&*frame.source, Path::new("/videos/ep1.mkv"));
        }
        assert!(frames[3].path.starts_with("/out/ep1"));
        assert!(Arc::ptr_eq(&frames[0].source, &frames[3].source));
    }

    #[test]
    fn test_empty_extraction_yields_nothing() {
        let mut stage = stage(MockFrameExtractor::new(0, 6.0));
        assert!(stage.process(PathBuf::from("blank.mp4")).unwrap().is_empty());
    }

    #[test]
    fn test_tool_failure_is_fatal() {
        let mut stage = stage(MockFrameExtractor::new(2, 6.0).with_failure("broken.mp4"));
        match stage.process(PathBuf::from("/videos/broken.mp4")) {
            Err(StageError::Fatal(msg)) => assert!(msg.contains("broken.mp4"), "got: {msg}"),
            other => panic!("Expected Fatal error, got {:?}", other),
        }
    }
}
