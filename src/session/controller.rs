use crate::canvas::CanvasAssembler;
use crate::config::StitchConfig;
use crate::data::{Frame, FrameBuffer};
use crate::error::{Rejection, SessionError};
use crate::logging::{FrameSpan, MetricsCollector, PerformanceStats, Timer};
use crate::pipeline::{
    AcceptedOverlap, AlignmentEstimator, AlignmentMethod, DirectionHint, DuplicateFilter, FailurePolicy,
    FilterDecision, OverlapValidator, PipelineStage, ScrollAxis, SessionState,
};
use crate::utils::image_conversion::{restore_orientation, scroll_length, scroll_luma, scroll_rgba};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Screen rectangle being captured, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Thread-safe cancellation flag, observed between processing steps.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A frame the session refused, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedFrame {
    pub frame_index: usize,
    pub rejection: Rejection,
}

/// What happened to a pushed frame
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// Stitched onto the canvas. `method` is the estimator that placed it,
    /// `None` for the first frame.
    Accepted {
        frame_index: usize,
        overlap: Option<AcceptedOverlap>,
        method: Option<AlignmentMethod>,
        canvas_length: u32,
    },
    /// Same content as the last accepted frame, or scrolled too little to
    /// add anything; dropped whatever the failure policy
    Duplicate { frame_index: usize, reason: Rejection },
    /// Rejected and dropped, capture continues
    Skipped { frame_index: usize, rejection: Rejection },
    /// Rejected; the session finished with the frames accepted before it
    Finalized {
        frame_index: usize,
        rejection: Rejection,
        output: Box<StitchOutput>,
    },
    /// Rejected; the session aborted
    Aborted { frame_index: usize, rejection: Rejection },
}

impl FrameOutcome {
    pub fn frame_index(&self) -> usize {
        match self {
            FrameOutcome::Accepted { frame_index, .. }
            | FrameOutcome::Duplicate { frame_index, .. }
            | FrameOutcome::Skipped { frame_index, .. }
            | FrameOutcome::Finalized { frame_index, .. }
            | FrameOutcome::Aborted { frame_index, .. } => *frame_index,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, FrameOutcome::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            FrameOutcome::Skipped { rejection, .. }
            | FrameOutcome::Finalized { rejection, .. }
            | FrameOutcome::Aborted { rejection, .. } => Some(rejection),
            _ => None,
        }
    }
}

/// Diagnostics of a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchSummary {
    pub session_id: Uuid,
    pub axis: ScrollAxis,
    pub final_width: u32,
    pub final_height: u32,
    pub frame_count: usize,
    pub rejected_count: usize,
    pub duplicate_count: usize,
    pub overlaps: Vec<AcceptedOverlap>,
    pub rejections: Vec<RejectedFrame>,
    /// Frames dropped as duplicates or stalled scrolls
    pub absorbed: Vec<RejectedFrame>,
    /// Rejection that ended the session early, if any
    pub end_reason: Option<Rejection>,
    pub region: Option<CaptureRegion>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    /// Capture times of the first and last stitched frames
    pub first_capture: Option<DateTime<Utc>>,
    pub last_capture: Option<DateTime<Utc>>,
    pub stage_timings: Vec<PerformanceStats>,
}

/// The stitched image and how it was made
#[derive(Debug, Clone)]
pub struct StitchOutput {
    pub image: RgbaImage,
    pub summary: StitchSummary,
}

/// Drives one long-screenshot capture: filter, align, validate, assemble.
///
/// Frames are processed synchronously in arrival order. Sessions share no
/// state, so a host may run several side by side.
pub struct StitchSession {
    id: Uuid,
    config: StitchConfig,
    state: SessionState,
    region: Option<CaptureRegion>,

    filter: DuplicateFilter,
    estimator: AlignmentEstimator,
    validator: OverlapValidator,
    assembler: CanvasAssembler,

    frames: FrameBuffer,
    overlaps: Vec<AcceptedOverlap>,
    rejections: Vec<RejectedFrame>,
    absorbed: Vec<RejectedFrame>,
    direction: Option<DirectionHint>,
    frame_length: Option<u32>,
    next_index: usize,

    cancel: CancelHandle,
    metrics: Arc<MetricsCollector>,
    started_at: Option<DateTime<Utc>>,
    end_reason: Option<Rejection>,
}

impl StitchSession {
    pub fn new(config: StitchConfig) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;

        Ok(Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            region: None,
            filter: DuplicateFilter::new(config.duplicate.clone(), config.axis),
            estimator: AlignmentEstimator::from_config(&config),
            validator: OverlapValidator::new(config.validation.clone()),
            assembler: CanvasAssembler::new(config.canvas.clone()),
            frames: FrameBuffer::new(),
            overlaps: Vec::new(),
            rejections: Vec::new(),
            absorbed: Vec::new(),
            direction: None,
            frame_length: None,
            next_index: 0,
            cancel: CancelHandle::default(),
            metrics: Arc::new(MetricsCollector::new(true)),
            started_at: None,
            end_reason: None,
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Handle another thread can use to stop the session
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.frames()
    }

    pub fn overlaps(&self) -> &[AcceptedOverlap] {
        &self.overlaps
    }

    /// Canvas extent along the scroll axis
    pub fn canvas_length(&self) -> u32 {
        self.assembler.canvas().height()
    }

    /// Current canvas in output orientation: a live preview while
    /// capturing, the partial result of an aborted session when retained.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let canvas = self.assembler.canvas();
        if canvas.is_empty() {
            return None;
        }
        Some(restore_orientation(canvas.to_image(), self.config.axis))
    }

    pub fn start(&mut self, region: CaptureRegion) -> Result<(), SessionError> {
        self.ensure_state("start", SessionState::Idle)?;
        self.check_cancelled()?;

        self.state = SessionState::Capturing;
        self.region = Some(region);
        self.started_at = Some(Utc::now());

        info!(
            session_id = %self.id,
            axis = ?self.config.axis,
            region = ?region,
            policy = ?self.config.failure_policy,
            "Capture session started"
        );
        Ok(())
    }

    /// Run one captured bitmap through filter, estimator, validator and
    /// assembler.
    pub fn push_frame(&mut self, bitmap: RgbaImage, capture_time: DateTime<Utc>) -> Result<FrameOutcome, SessionError> {
        self.ensure_state("push_frame", SessionState::Capturing)?;
        self.check_cancelled()?;

        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(SessionError::EmptyFrame);
        }

        let axis = self.config.axis;
        let length = scroll_length(&bitmap, axis);
        if let Some(expected) = self.frame_length {
            if length != expected {
                return Err(SessionError::FrameLengthMismatch {
                    expected,
                    actual: length,
                });
            }
        }

        let index = self.next_index;
        self.next_index += 1;
        let frame = Frame::new(index, bitmap, capture_time);

        let span = FrameSpan::new(self.id, index, frame.dimensions());
        let _guard = span.enter();

        let timer = self.timer(&self.filter);
        let luma = scroll_luma(frame.bitmap(), axis);
        let decision = self.filter.filter_luma(self.frames.last().map(|f| &f.luma), &luma);
        timer.stop();

        if decision == FilterDecision::RejectDuplicate {
            return Ok(self.absorb(index, Rejection::DuplicateFrame { frame_index: index }, &span));
        }
        self.check_cancelled()?;

        let verdict = match self.frames.last() {
            None => Ok(None),
            Some(previous) => {
                let pair = (previous.frame.sequence_index(), index);

                let timer = self.timer(&self.estimator);
                let estimate = self.estimator.estimate(&previous.luma, &luma, pair, self.direction);
                timer.stop();

                let timer = self.timer(&self.validator);
                let verdict = match estimate {
                    Some(result) => self
                        .validator
                        .validate(&result, length)
                        .map(|overlap| Some((overlap, result.method))),
                    None => Err(Rejection::LowConfidence {
                        confidence: 0.0,
                        threshold: 0.0,
                    }),
                };
                timer.stop();
                verdict
            }
        };
        self.check_cancelled()?;

        let (overlap, method) = match verdict {
            Ok(Some((overlap, method))) => (Some(overlap), Some(method)),
            Ok(None) => (None, None),
            // the page barely moved: nothing new to add, keep capturing
            Err(rejection @ Rejection::InsufficientAdvance { .. }) => {
                return Ok(self.absorb(index, rejection, &span));
            }
            Err(rejection) => return Ok(self.reject(index, rejection, &span)),
        };

        let timer = self.timer(&self.assembler);
        let appended = {
            let view = scroll_rgba(frame.bitmap(), axis);
            self.assembler.append(&view, overlap.as_ref())
        };
        timer.stop();

        if let Err(rejection) = appended {
            return Ok(self.reject(index, rejection, &span));
        }

        if let Some(overlap) = overlap {
            if self.direction.is_none() {
                self.direction = DirectionHint::from_offset(overlap.offset as i32);
            }
            self.overlaps.push(overlap);
        }
        self.frame_length.get_or_insert(length);
        self.frames.push_with_luma(frame, luma);

        let canvas_length = self.canvas_length();
        info!(
            frame_index = index,
            offset = overlap.map(|o| o.offset),
            method = method.map(|m| m.name()),
            capture_time = %capture_time,
            canvas_length,
            "Frame accepted"
        );
        span.record_outcome("accepted", overlap.map(|o| o.offset as i32));

        Ok(FrameOutcome::Accepted {
            frame_index: index,
            overlap,
            method,
            canvas_length,
        })
    }

    /// End capture and hand out the stitched image.
    pub fn finish(&mut self) -> Result<StitchOutput, SessionError> {
        self.ensure_state("finish", SessionState::Capturing)?;
        self.check_cancelled()?;

        if self.frames.is_empty() {
            self.state = SessionState::Aborted;
            info!(session_id = %self.id, "Session finished without frames");
            return Err(SessionError::NothingCaptured);
        }

        self.state = SessionState::Finished;
        Ok(self.build_output())
    }

    /// Abort the session, discarding progress unless configured to keep it.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::InvalidState {
                operation: "cancel",
                state: self.state,
            });
        }

        self.cancel.cancel();
        self.abort();
        Ok(())
    }

    /// Drop the most recently accepted frame and the rows it added.
    /// Returns its sequence index, or `None` when nothing was accepted.
    pub fn undo_last_frame(&mut self) -> Result<Option<usize>, SessionError> {
        self.ensure_state("undo_last_frame", SessionState::Capturing)?;

        let Some(removed) = self.frames.pop() else {
            return Ok(None);
        };

        let rows = self.assembler.undo_last();
        if !self.frames.is_empty() {
            self.overlaps.pop();
        }
        if self.overlaps.is_empty() {
            self.direction = None;
        }
        if self.frames.is_empty() {
            self.frame_length = None;
        }

        let index = removed.frame.sequence_index();
        info!(
            frame_index = index,
            rows_removed = rows.unwrap_or(0),
            canvas_length = self.canvas_length(),
            "Frame undone"
        );
        Ok(Some(index))
    }

    fn ensure_state(&self, operation: &'static str, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn check_cancelled(&mut self) -> Result<(), SessionError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        if !self.state.is_terminal() {
            self.abort();
        }
        Err(SessionError::Cancelled)
    }

    fn timer(&self, stage: &dyn PipelineStage) -> Timer {
        Timer::start_with_collector(stage.stage_name(), Some(self.id), self.metrics.clone())
    }

    /// Drop a frame that adds nothing to the canvas. The failure policy does
    /// not apply.
    fn absorb(&mut self, index: usize, reason: Rejection, span: &FrameSpan) -> FrameOutcome {
        debug!(frame_index = index, kind = reason.kind(), "Frame absorbed");
        span.record_outcome("duplicate", None);
        self.absorbed.push(RejectedFrame {
            frame_index: index,
            rejection: reason.clone(),
        });
        FrameOutcome::Duplicate {
            frame_index: index,
            reason,
        }
    }

    fn reject(&mut self, index: usize, rejection: Rejection, span: &FrameSpan) -> FrameOutcome {
        warn!(
            frame_index = index,
            kind = rejection.kind(),
            error = %rejection,
            "Frame rejected"
        );
        self.rejections.push(RejectedFrame {
            frame_index: index,
            rejection: rejection.clone(),
        });

        let policy = match (self.config.failure_policy, &rejection) {
            // skipping cannot make the canvas smaller
            (FailurePolicy::Skip, Rejection::CanvasSizeExceeded { .. }) => FailurePolicy::Finalize,
            (FailurePolicy::Finalize, _) if self.frames.is_empty() => FailurePolicy::Abort,
            (policy, _) => policy,
        };

        match policy {
            FailurePolicy::Skip => {
                span.record_outcome("skipped", None);
                FrameOutcome::Skipped {
                    frame_index: index,
                    rejection,
                }
            }
            FailurePolicy::Finalize => {
                span.record_outcome("finalized", None);
                self.end_reason = Some(rejection.clone());
                self.state = SessionState::Finished;
                let output = self.build_output();
                FrameOutcome::Finalized {
                    frame_index: index,
                    rejection,
                    output: Box::new(output),
                }
            }
            FailurePolicy::Abort => {
                span.record_outcome("aborted", None);
                self.end_reason = Some(rejection.clone());
                self.abort();
                FrameOutcome::Aborted {
                    frame_index: index,
                    rejection,
                }
            }
        }
    }

    fn abort(&mut self) {
        self.state = SessionState::Aborted;
        if !self.config.retain_partial_on_abort {
            self.frames.clear();
            self.overlaps.clear();
            self.assembler.clear();
        }

        info!(
            session_id = %self.id,
            reason = self.end_reason.as_ref().map(|r| r.kind()).unwrap_or("cancelled"),
            retained_frames = self.frames.len(),
            "Capture session aborted"
        );
    }

    fn build_output(&mut self) -> StitchOutput {
        let image = restore_orientation(self.assembler.canvas().to_image(), self.config.axis);

        let summary = StitchSummary {
            session_id: self.id,
            axis: self.config.axis,
            final_width: image.width(),
            final_height: image.height(),
            frame_count: self.frames.len(),
            rejected_count: self.rejections.len(),
            duplicate_count: self.absorbed.len(),
            overlaps: self.overlaps.clone(),
            rejections: self.rejections.clone(),
            absorbed: self.absorbed.clone(),
            end_reason: self.end_reason.clone(),
            region: self.region,
            started_at: self.started_at,
            finished_at: Utc::now(),
            first_capture: self.frames.frames().next().map(|f| f.capture_time()),
            last_capture: self.frames.frames().last().map(|f| f.capture_time()),
            stage_timings: self.metrics.all_stats(),
        };

        info!(
            session_id = %self.id,
            width = summary.final_width,
            height = summary.final_height,
            frames = summary.frame_count,
            rejected = summary.rejected_count,
            duplicates = summary.duplicate_count,
            "Capture session finished"
        );

        self.assembler.clear();
        StitchOutput { image, summary }
    }
}
