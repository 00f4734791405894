//! Long-screenshot stitching engine.
//!
//! A [`StitchSession`] receives overlapping frames captured while a region
//! scrolls, finds how far the content moved between consecutive frames and
//! appends only the newly revealed rows to a growing canvas.

pub mod algorithms;
pub mod canvas;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod utils;

pub use algorithms::{CorrelationAligner, FeatureAligner};
pub use canvas::{Canvas, CanvasAssembler};
pub use config::StitchConfig;
pub use data::{load_bitmap, Frame};
pub use error::{Rejection, SessionError};
pub use pipeline::{
    AcceptedOverlap, AlignmentAlgorithm, AlignmentEstimator, AlignmentMethod, AlignmentMode, AlignmentResult,
    DirectionHint, FailurePolicy, ScrollAxis, SessionState,
};
pub use session::{CancelHandle, CaptureRegion, FrameOutcome, StitchOutput, StitchSession, StitchSummary};

pub type Result<T> = anyhow::Result<T>;
