use crate::pipeline::types::{AlignmentMethod, AlignmentResult, DirectionHint};
use image::GrayImage;

/// An offset estimator between two consecutive frames.
///
/// Both images are luma views in scroll-normalised orientation (scroll axis
/// along rows). Implementations never fail: an estimate they do not trust is
/// reported with `valid = false` and the confidence they reached.
pub trait AlignmentAlgorithm: Send + Sync {
    /// Returns the name of the algorithm
    fn name(&self) -> &str;

    fn method(&self) -> AlignmentMethod;

    /// Confidence below which results are marked invalid
    fn min_confidence(&self) -> f32;

    /// Estimate where `candidate` sits relative to `previous`.
    /// `pair` carries the sequence indices recorded in the result.
    fn align(
        &self,
        previous: &GrayImage,
        candidate: &GrayImage,
        pair: (usize, usize),
        hint: Option<DirectionHint>,
    ) -> AlignmentResult;
}

/// A step of the per-frame pipeline, named for logs and metrics.
pub trait PipelineStage {
    fn stage_name(&self) -> &'static str;
}
