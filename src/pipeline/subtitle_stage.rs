//! Consolidation stage: recognized frames → subtitle entries.

use crate::pipeline::consolidation::ConsolidationEngine;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::Stage;
use crate::pipeline::types::{IndexedFrame, SubtitleEntry};

/// Wraps the [`ConsolidationEngine`]. Owns every source buffer, so it must
/// run as a single worker.
#[derive(Debug, Clone, Default)]
pub struct SubtitleStage {
    engine: ConsolidationEngine,
}

impl SubtitleStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for SubtitleStage {
    type Input = IndexedFrame;
    type Output = SubtitleEntry;

    fn name(&self) -> &'static str {
        "subtitles"
    }

    fn process(&mut self, frame: IndexedFrame) -> Result<Vec<SubtitleEntry>, StageError> {
        Ok(self.engine.push(frame)?)
    }

    fn finalize(&mut self) -> Result<Vec<SubtitleEntry>, StageError> {
        for (source, buffer) in self.engine.buffers() {
            if !buffer.is_complete() {
                log::warn!(
                    "{}: only {}/{} frames recognized, some subtitles may be missing",
                    source.display(),
                    buffer.len(),
                    buffer.size()
                );
            }
        }
        self.engine.clear();
        Ok(Vec::new())
    }

    fn max_concurrency(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::SourceId;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_stage_is_single_owner() {
        assert_eq!(SubtitleStage::new().max_concurrency(), Some(1));
    }

    #[test]
    fn test_entries_flow_through_and_finalize_is_empty() {
        let source: SourceId = Arc::from(Path::new("a.mp4"));
        let mut stage = SubtitleStage::new();

        assert!(
            stage
                .process(IndexedFrame::new(source.clone(), 1, 2, 0.5, "Oui"))
                .unwrap()
                .is_empty()
        );
        let entries = stage
            .process(IndexedFrame::new(source.clone(), 0, 2, 0.0, "Oui"))
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, 0.0);
        assert_eq!(entries[0].end, 0.5);

        assert!(stage.finalize().unwrap().is_empty());
    }

    #[test]
    fn test_inconsistent_total_is_invariant_violation() {
        let source: SourceId = Arc::from(Path::new("a.mp4"));
        let mut stage = SubtitleStage::new();
        stage
            .process(IndexedFrame::new(source.clone(), 0, 3, 0.0, "A"))
            .unwrap();

        assert!(matches!(
            stage.process(IndexedFrame::new(source, 1, 5, 0.5, "A")),
            Err(StageError::Invariant(_))
        ));
    }
}
