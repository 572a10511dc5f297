//! Frame-extraction collaborator.

pub mod extractor;
pub mod ffmpeg;

pub use extractor::{
    ExtractionRequest, FrameExtractor, FrameFile, MockFrameExtractor, frame_file_name,
};
pub use ffmpeg::FfmpegExtractor;
