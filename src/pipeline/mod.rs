//! Staged concurrent pipeline for subtitle extraction.
//!
//! Each stage runs in a pool of worker threads. Pools are connected by
//! closable crossbeam queues, and each pool closes its output through a
//! completion latch once every worker is done:
//!
//! ```text
//! videos → FrameStage×N → OcrStage×M → SubtitleStage×1 → entries
//! ```

pub mod consolidation;
pub mod error;
pub mod frame_stage;
pub mod ocr_stage;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod stage;
pub mod subtitle_stage;
pub mod telemetry;
pub mod types;

pub use consolidation::{ConsolidationEngine, SubtitleBuffer, TimedText};
pub use error::{ErrorReporter, LogReporter, StageError, StageFailure};
pub use frame_stage::FrameStage;
pub use ocr_stage::OcrStage;
pub use orchestrator::{Pipeline, PipelineReport, StageDescriptor};
pub use pool::{CompletionLatch, PoolContext, PoolHandle};
pub use queue::{Queue, Received};
pub use stage::Stage;
pub use subtitle_stage::SubtitleStage;
pub use telemetry::{Level, StageMessage, Telemetry};
pub use types::{ExtractedFrame, IndexedFrame, SourceId, SubtitleEntry};
