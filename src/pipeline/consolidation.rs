//! Turns out-of-order per-frame OCR results into subtitle entries.
//!
//! Frames are buffered per source video. A frame belongs to a *run*: the
//! maximal span of contiguous indices with identical text. A run's bounds can
//! only be computed once every frame from one frame before the run to one
//! frame after it is buffered (or the run touches the first or last index), so
//! each arrival re-attempts the computation and emits an entry as soon as the
//! neighbourhood has no gaps.
//!
//! An arrival is the last missing piece for at most three runs: its own, and
//! the runs ending right before or starting right after it. All three are
//! re-evaluated. Nothing is deduplicated; the same run may be emitted more
//! than once.

use crate::error::{HardsubError, Result};
use crate::pipeline::types::{IndexedFrame, SourceId, SubtitleEntry};
use std::collections::HashMap;
use std::path::Path;

/// A buffered OCR result.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedText {
    pub index: usize,
    pub timestamp: f64,
    pub text: String,
}

/// Per-source buffer of OCR results, keyed by frame index.
#[derive(Debug, Clone)]
pub struct SubtitleBuffer {
    size: usize,
    entries: HashMap<usize, TimedText>,
}

impl SubtitleBuffer {
    /// Creates an empty buffer for a source with `size` frames.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: HashMap::with_capacity(size),
        }
    }

    /// Number of frames in the source. Fixed at creation.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of frames buffered so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true once every index of the source is buffered.
    pub fn is_complete(&self) -> bool {
        self.entries.len() == self.size
    }

    pub fn get(&self, index: usize) -> Option<&TimedText> {
        self.entries.get(&index)
    }

    /// Stores a frame, replacing any earlier result for the same index.
    pub fn insert(&mut self, entry: TimedText) {
        self.entries.insert(entry.index, entry);
    }

    /// First frame of the run containing `index`.
    ///
    /// Returns `None` when a gap hides the start of the run.
    pub fn past_boundary(&self, index: usize) -> Option<&TimedText> {
        let text = &self.entries.get(&index)?.text;
        let mut i = index;
        loop {
            let current = self.entries.get(&i)?;
            if current.text != *text {
                return self.entries.get(&(i + 1));
            }
            if i == 0 {
                return Some(current);
            }
            i -= 1;
        }
    }

    /// Last frame of the run containing `index`.
    ///
    /// Returns `None` when a gap hides the end of the run.
    pub fn future_boundary(&self, index: usize) -> Option<&TimedText> {
        let text = &self.entries.get(&index)?.text;
        let mut i = index;
        loop {
            let current = self.entries.get(&i)?;
            if current.text != *text {
                return self.entries.get(&(i - 1));
            }
            if i + 1 >= self.size {
                return Some(current);
            }
            i += 1;
        }
    }

    /// Resolves the run containing `index` into `(first, last)` frames.
    fn resolve(&self, index: usize) -> Option<(&TimedText, &TimedText)> {
        let current = self.entries.get(&index)?;
        // Blank frames never yield a subtitle, whatever surrounds them.
        if current.text.is_empty() {
            return None;
        }
        Some((self.past_boundary(index)?, self.future_boundary(index)?))
    }
}

/// Consolidation state for every source seen so far.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationEngine {
    buffers: HashMap<SourceId, SubtitleBuffer>,
}

impl ConsolidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers one frame and returns every entry it makes resolvable.
    ///
    /// Fails with [`HardsubError::BufferInconsistency`] when the frame's
    /// `total` differs from the one first recorded for its source, or its
    /// index is out of range. Rejected frames are not buffered.
    pub fn push(&mut self, frame: IndexedFrame) -> Result<Vec<SubtitleEntry>> {
        if frame.index >= frame.total {
            return Err(HardsubError::BufferInconsistency {
                video: frame.source.to_path_buf(),
                expected: format!("frame index below {}", frame.total),
                actual: format!("frame index {}", frame.index),
            });
        }

        let buffer = self
            .buffers
            .entry(frame.source.clone())
            .or_insert_with(|| {
                log::debug!(
                    "Initializing subtitle buffer for {}, size {}",
                    frame.source.display(),
                    frame.total
                );
                SubtitleBuffer::new(frame.total)
            });

        if buffer.size != frame.total {
            return Err(HardsubError::BufferInconsistency {
                video: frame.source.to_path_buf(),
                expected: format!("{} frames", buffer.size),
                actual: format!("{} frames", frame.total),
            });
        }

        let IndexedFrame {
            source,
            index,
            total,
            timestamp,
            text,
        } = frame;
        log::trace!("[{index}/{total}] {timestamp:.3}s buffered");
        buffer.insert(TimedText {
            index,
            timestamp,
            text,
        });

        let mut emitted = Vec::new();
        for candidate in candidates(buffer, index) {
            if let Some((first, last)) = buffer.resolve(candidate) {
                log::debug!(
                    "[{candidate}/{total}] Found boundaries: {} -> {}",
                    first.index,
                    last.index
                );
                emitted.push(SubtitleEntry {
                    start: first.timestamp,
                    end: last.timestamp,
                    text: first.text.clone(),
                    frame_span: last.index - first.index + 1,
                    frame_total: buffer.size,
                    source: source.clone(),
                });
            }
        }
        Ok(emitted)
    }

    /// Returns the buffer of a source, if any frame of it was seen.
    pub fn buffer(&self, source: &Path) -> Option<&SubtitleBuffer> {
        self.buffers.get(source)
    }

    /// Iterates over every source buffer, in no particular order.
    pub fn buffers(&self) -> impl Iterator<Item = (&SourceId, &SubtitleBuffer)> {
        self.buffers.iter()
    }

    /// Number of sources with a buffer.
    pub fn source_count(&self) -> usize {
        self.buffers.len()
    }

    /// Discards every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

/// The arrived frame, plus direct neighbours whose run it may have closed.
///
/// Neighbours with the same text share the arrived frame's run and would
/// only repeat its result.
fn candidates(buffer: &SubtitleBuffer, index: usize) -> Vec<usize> {
    let mut indices = vec![index];
    let Some(text) = buffer.get(index).map(|entry| &entry.text) else {
        return indices;
    };

    let before = index.checked_sub(1);
    let after = Some(index + 1).filter(|i| *i < buffer.size);
    for neighbour in [before, after].into_iter().flatten() {
        if buffer.get(neighbour).is_some_and(|entry| entry.text != *text) {
            indices.push(neighbour);
        }
    }
    indices
}
