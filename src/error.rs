use crate::pipeline::SessionState;
use serde::{Deserialize, Serialize};

/// Why a captured frame could not be stitched.
///
/// Rejections are surfaced to the session controller, whose failure policy
/// decides between aborting, finalizing or skipping the frame. None of them
/// leaves a partially mutated canvas behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Rejection {
    #[error("Frame {frame_index} is identical to the previous frame")]
    DuplicateFrame { frame_index: usize },

    #[error("Alignment confidence {confidence:.3} below threshold {threshold:.3}")]
    LowConfidence { confidence: f32, threshold: f32 },

    #[error("Scroll jump: offset {offset}px is not stitchable (frame length {frame_length}px)")]
    ScrollJump { offset: i32, frame_length: u32 },

    #[error("No overlap: offset {offset}px leaves nothing shared with a {frame_length}px frame")]
    NoOverlap { offset: i32, frame_length: u32 },

    #[error("Scroll advanced only {offset}px, overlap ratio {overlap_ratio:.3} too high")]
    InsufficientAdvance { offset: i32, overlap_ratio: f32 },

    #[error("Content drifted {shift}px across the scroll axis (limit {limit}px)")]
    CrossAxisShift { shift: i32, limit: u32 },

    #[error("Canvas would grow to {requested} pixels, limit is {limit}")]
    CanvasSizeExceeded { requested: u64, limit: u64 },
}

impl Rejection {
    /// Short machine-friendly name, used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::DuplicateFrame { .. } => "duplicate_frame",
            Rejection::LowConfidence { .. } => "low_confidence",
            Rejection::ScrollJump { .. } => "scroll_jump",
            Rejection::NoOverlap { .. } => "no_overlap",
            Rejection::InsufficientAdvance { .. } => "insufficient_advance",
            Rejection::CrossAxisShift { .. } => "cross_axis_shift",
            Rejection::CanvasSizeExceeded { .. } => "canvas_size_exceeded",
        }
    }
}

/// Host-side misuse of a stitching session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Operation '{operation}' is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Frame is {actual}px along the scroll axis, session frames are {expected}px")]
    FrameLengthMismatch { expected: u32, actual: u32 },

    #[error("Frame has zero width or height")]
    EmptyFrame,

    #[error("Session finished without any accepted frame")]
    NothingCaptured,

    #[error("Session was cancelled")]
    Cancelled,

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),
}
