use fauxcam_core::prelude::WireFormat;

use crate::fallback::FallbackStage;

/// Errors from the engine's fallible setters.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Encoded source image could not be decoded.
    #[error("failed to decode source image: {0}")]
    Decode(#[from] image::ImageError),
    /// Decoded source image has no pixels.
    #[error("source image is empty")]
    EmptyImage,
}

/// What a successful frame request wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Format actually written.
    pub format: WireFormat,
    /// Fallback stage that produced the frame.
    pub stage: FallbackStage,
    /// Payload bytes written across all planes.
    pub bytes_written: usize,
    /// At least one plane was too small and got truncated.
    pub degraded: bool,
    /// The frame is the placeholder rather than the configured source.
    pub placeholder: bool,
    /// Encoded bytes came from the frame cache.
    pub cache_hit: bool,
}

/// Outcome of [`crate::FrameEngine::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Written(FrameReport),
    /// Zero-sized request; no plane was touched.
    NoOp,
    /// Every fallback stage failed; details were logged.
    Failed,
}

impl WriteResult {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteResult::Written(_))
    }

    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            WriteResult::Written(report) => Some(report),
            _ => None,
        }
    }
}
