use serde::{Deserialize, Serialize};

/// Axis along which the captured window scrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

/// Strategy that produced an alignment estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMethod {
    Correlation,
    FeatureMatch,
}

impl AlignmentMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AlignmentMethod::Correlation => "correlation",
            AlignmentMethod::FeatureMatch => "feature_match",
        }
    }
}

/// Expected sign of the offset, established by the first accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionHint {
    /// Content moves towards the origin (scrolling down / right)
    Forward,
    /// Content moves away from the origin (scrolling up / left)
    Backward,
}

impl DirectionHint {
    pub fn from_offset(offset: i32) -> Option<Self> {
        match offset.signum() {
            1 => Some(DirectionHint::Forward),
            -1 => Some(DirectionHint::Backward),
            _ => None,
        }
    }

    pub fn agrees_with(&self, offset: i32) -> bool {
        match self {
            DirectionHint::Forward => offset >= 0,
            DirectionHint::Backward => offset <= 0,
        }
    }
}

/// Host override of the estimator's fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    #[default]
    Auto,
    CorrelationOnly,
    FeatureOnly,
}

/// What the session does when a frame is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Discard all progress and end the session
    #[default]
    Abort,
    /// Keep everything accepted so far and end the session
    Finalize,
    /// Drop the offending frame and keep capturing
    Skip,
}

/// Lifecycle of a stitching session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Capturing,
    Finished,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Aborted)
    }
}

/// Outcome of the duplicate/stillness filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    RejectDuplicate,
}

/// Offset estimate between two consecutive frames.
///
/// `offset` is measured along the scroll axis: a positive value means the
/// content of `frame_b` sits `offset` pixels closer to the origin than in
/// `frame_a`, i.e. the user scrolled forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub frame_a_index: usize,
    pub frame_b_index: usize,

    /// Signed shift along the scroll axis, in pixels
    pub offset: i32,

    /// Signed drift perpendicular to the scroll axis, in pixels
    pub cross_axis_offset: i32,

    /// Confidence level (0-1, where 1 is highest confidence)
    pub confidence: f32,

    /// Threshold the producing method judged `confidence` against
    pub min_confidence: f32,

    pub method: AlignmentMethod,

    /// Confidence met the method threshold and the sign agreed with the hint
    pub valid: bool,

    /// False when the offset sign contradicts the session's scroll direction
    pub direction_consistent: bool,

    /// Candidate correspondences considered (rows or descriptor matches)
    pub matches: usize,

    /// Correspondences agreeing with the winning offset
    pub inliers: usize,

    pub execution_time_ms: f64,
}

impl AlignmentResult {
    pub fn new(method: AlignmentMethod, frame_a_index: usize, frame_b_index: usize) -> Self {
        Self {
            frame_a_index,
            frame_b_index,
            offset: 0,
            cross_axis_offset: 0,
            confidence: 0.0,
            min_confidence: 0.0,
            method,
            valid: false,
            direction_consistent: true,
            matches: 0,
            inliers: 0,
            execution_time_ms: 0.0,
        }
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_cross_axis_offset(mut self, cross_axis_offset: i32) -> Self {
        self.cross_axis_offset = cross_axis_offset;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_support(mut self, matches: usize, inliers: usize) -> Self {
        self.matches = matches;
        self.inliers = inliers;
        self
    }

    /// Mark the result valid or not against a confidence threshold and an
    /// optional direction hint.
    pub fn judge(mut self, min_confidence: f32, hint: Option<DirectionHint>) -> Self {
        self.min_confidence = min_confidence;
        self.direction_consistent = hint.map_or(true, |h| h.agrees_with(self.offset));
        self.valid = self.confidence >= min_confidence && self.direction_consistent;
        self
    }
}

/// Validated transition between two accepted frames, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedOverlap {
    /// Sequence index of the frame this overlap introduced
    pub frame_index: usize,
    /// Scroll advance relative to the previous accepted frame
    pub offset: u32,
    /// Rows (or columns) shared with the previous accepted frame
    pub overlap_height: u32,
}

impl AcceptedOverlap {
    /// Rows of new content this transition contributes to the canvas
    pub fn new_content(&self, frame_length: u32) -> u32 {
        frame_length.saturating_sub(self.overlap_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_hint_agreement() {
        assert_eq!(DirectionHint::from_offset(40), Some(DirectionHint::Forward));
        assert_eq!(DirectionHint::from_offset(-3), Some(DirectionHint::Backward));
        assert_eq!(DirectionHint::from_offset(0), None);
        assert!(DirectionHint::Forward.agrees_with(12));
        assert!(!DirectionHint::Forward.agrees_with(-12));
        assert!(DirectionHint::Backward.agrees_with(-1));
    }

    #[test]
    fn test_judge_marks_opposite_sign_invalid() {
        let result = AlignmentResult::new(AlignmentMethod::Correlation, 0, 1)
            .with_offset(-25)
            .with_confidence(0.9)
            .judge(0.3, Some(DirectionHint::Forward));
        assert!(!result.valid);
        assert!(!result.direction_consistent);

        let result = AlignmentResult::new(AlignmentMethod::Correlation, 0, 1)
            .with_offset(25)
            .with_confidence(0.2)
            .judge(0.3, Some(DirectionHint::Forward));
        assert!(!result.valid);
        assert!(result.direction_consistent);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let result = AlignmentResult::new(AlignmentMethod::FeatureMatch, 0, 1).with_confidence(1.7);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_scroll_axis_serde_names() {
        let json = serde_json::to_string(&ScrollAxis::Horizontal).unwrap();
        assert_eq!(json, "\"horizontal\"");
        let policy: FailurePolicy = serde_json::from_str("\"finalize\"").unwrap();
        assert_eq!(policy, FailurePolicy::Finalize);
    }
}
