//! Structured spans for per-frame and per-estimator logging
//!
//! Frame spans carry the session id; algorithm spans nest inside them so a
//! multi-session host can untangle interleaved output.

use std::time::Instant;
use tracing::field::Empty;
use tracing::{span, Level, Span};
use uuid::Uuid;

/// Span covering one `push_frame` call
pub struct FrameSpan {
    span: Span,
    start_time: Instant,
}

impl FrameSpan {
    pub fn new(session_id: Uuid, frame_index: usize, dimensions: (u32, u32)) -> Self {
        let span = span!(
            Level::INFO,
            "frame",
            session_id = %session_id,
            frame_index = frame_index,
            width = dimensions.0,
            height = dimensions.1,
            outcome = Empty,
            offset = Empty,
            execution_time_ms = Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Record what happened to the frame
    pub fn record_outcome(&self, outcome: &str, offset: Option<i32>) {
        let duration = self.start_time.elapsed();
        self.span.record("outcome", outcome);
        if let Some(offset) = offset {
            self.span.record("offset", offset);
        }
        self.span.record("execution_time_ms", duration.as_secs_f64() * 1000.0);

        tracing::debug!(
            parent: &self.span,
            outcome = outcome,
            offset = ?offset,
            execution_time_ms = duration.as_millis(),
            "Frame processed"
        );
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span for one alignment estimator run
pub struct AlgorithmSpan {
    span: Span,
    start_time: Instant,
}

impl AlgorithmSpan {
    pub fn new(algorithm_name: &str, pair: (usize, usize)) -> Self {
        let span = span!(
            Level::DEBUG,
            "algorithm_execution",
            algorithm = algorithm_name,
            frame_a = pair.0,
            frame_b = pair.1,
            keypoints = Empty,
            raw_matches = Empty,
            filtered_matches = Empty,
            ransac_iterations = Empty,
            ransac_inliers = Empty,
            success = Empty,
            final_confidence = Empty,
            offset = Empty,
            execution_time_ms = Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Record feature detection results
    pub fn record_feature_detection(&self, previous_keypoints: usize, candidate_keypoints: usize) {
        self.span.record("keypoints", previous_keypoints + candidate_keypoints);
        tracing::debug!(
            parent: &self.span,
            previous_keypoints,
            candidate_keypoints,
            "Feature detection completed"
        );
    }

    /// Record matching results
    pub fn record_matching(&self, raw_matches: usize, filtered_matches: usize) {
        self.span.record("raw_matches", raw_matches);
        self.span.record("filtered_matches", filtered_matches);
        tracing::debug!(
            parent: &self.span,
            raw_matches,
            filtered_matches,
            "Feature matching completed"
        );
    }

    /// Record RANSAC estimation results
    pub fn record_ransac(&self, iterations: usize, inliers: usize, translation: (f32, f32)) {
        self.span.record("ransac_iterations", iterations);
        self.span.record("ransac_inliers", inliers);
        tracing::debug!(
            parent: &self.span,
            iterations,
            inliers,
            translation = %format!("({:.2}, {:.2})", translation.0, translation.1),
            "RANSAC estimation completed"
        );
    }

    /// Record the final estimate
    pub fn record_result(&self, success: bool, confidence: f32, offset: i32) {
        let duration = self.start_time.elapsed();
        self.span.record("success", success);
        self.span.record("final_confidence", confidence);
        self.span.record("offset", offset);
        self.span.record("execution_time_ms", duration.as_secs_f64() * 1000.0);

        tracing::debug!(
            parent: &self.span,
            success,
            confidence = %format!("{:.3}", confidence),
            offset,
            execution_time_ms = duration.as_millis(),
            "Algorithm execution completed"
        );
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
