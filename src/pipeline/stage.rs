use crate::config::{DuplicateConfig, ValidationConfig};
use crate::data::Frame;
use crate::error::Rejection;
use crate::pipeline::{AcceptedOverlap, AlignmentResult, FilterDecision, PipelineStage, ScrollAxis};
use crate::utils::image_conversion::scroll_luma;
use image::GrayImage;

/// Stage that drops frames showing the same content as the previous one
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    config: DuplicateConfig,
    axis: ScrollAxis,
}

impl DuplicateFilter {
    pub fn new(config: DuplicateConfig, axis: ScrollAxis) -> Self {
        Self { config, axis }
    }

    /// Compare a candidate with the last accepted frame. No side effects.
    pub fn filter(&self, previous: Option<&Frame>, candidate: &Frame) -> FilterDecision {
        let Some(previous) = previous else {
            return FilterDecision::Accept;
        };
        if previous.dimensions() != candidate.dimensions() {
            return FilterDecision::Accept;
        }

        let prev_luma = scroll_luma(previous.bitmap(), self.axis);
        let cand_luma = scroll_luma(candidate.bitmap(), self.axis);
        self.filter_luma(Some(&prev_luma), &cand_luma)
    }

    /// Same decision on precomputed scroll-normalised luma views.
    pub fn filter_luma(&self, previous: Option<&GrayImage>, candidate: &GrayImage) -> FilterDecision {
        let Some(previous) = previous else {
            return FilterDecision::Accept;
        };
        if previous.dimensions() != candidate.dimensions() {
            return FilterDecision::Accept;
        }

        let similarity = self.similarity(previous, candidate);
        if similarity < self.config.similarity_threshold {
            return FilterDecision::Accept;
        }

        let row_delta = max_row_profile_delta(previous, candidate);
        tracing::debug!(similarity, row_delta, "Near-identical frame");

        if row_delta <= self.config.row_tolerance {
            FilterDecision::RejectDuplicate
        } else {
            FilterDecision::Accept
        }
    }

    /// `1 - mean_abs_diff / 255` over a strided grid of equally sized images
    pub fn similarity(&self, previous: &GrayImage, candidate: &GrayImage) -> f32 {
        let stride = self.config.sample_stride.max(1) as usize;
        let (width, height) = previous.dimensions();

        let mut total = 0u64;
        let mut count = 0u64;
        for y in (0..height).step_by(stride) {
            for x in (0..width).step_by(stride) {
                let a = previous.get_pixel(x, y)[0];
                let b = candidate.get_pixel(x, y)[0];
                total += a.abs_diff(b) as u64;
                count += 1;
            }
        }

        if count == 0 {
            return 1.0;
        }
        1.0 - (total as f64 / count as f64 / 255.0) as f32
    }
}

impl PipelineStage for DuplicateFilter {
    fn stage_name(&self) -> &'static str {
        "filter"
    }
}

/// Largest difference between the per-row mean luma of two images
fn max_row_profile_delta(previous: &GrayImage, candidate: &GrayImage) -> f32 {
    let width = previous.width() as usize;
    if width == 0 {
        return 0.0;
    }

    previous
        .as_raw()
        .chunks_exact(width)
        .zip(candidate.as_raw().chunks_exact(width))
        .map(|(a, b)| {
            let sum_a: u64 = a.iter().map(|&p| p as u64).sum();
            let sum_b: u64 = b.iter().map(|&p| p as u64).sum();
            sum_a.abs_diff(sum_b) as f32 / width as f32
        })
        .fold(0.0, f32::max)
}

/// Stage that checks an offset estimate against physical constraints
#[derive(Debug, Clone)]
pub struct OverlapValidator {
    config: ValidationConfig,
}

impl OverlapValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, result: &AlignmentResult, frame_height: u32) -> Result<AcceptedOverlap, Rejection> {
        if !result.valid {
            return Err(if result.direction_consistent {
                Rejection::LowConfidence {
                    confidence: result.confidence,
                    threshold: result.min_confidence,
                }
            } else {
                Rejection::ScrollJump {
                    offset: result.offset,
                    frame_length: frame_height,
                }
            });
        }

        let offset = result.offset;
        if offset < 0 {
            return Err(Rejection::ScrollJump {
                offset,
                frame_length: frame_height,
            });
        }
        if offset as i64 >= frame_height as i64 {
            return Err(Rejection::NoOverlap {
                offset,
                frame_length: frame_height,
            });
        }
        if offset == 0 {
            return Err(Rejection::InsufficientAdvance {
                offset,
                overlap_ratio: 1.0,
            });
        }

        let overlap_height = frame_height - offset as u32;
        let overlap_ratio = overlap_height as f32 / frame_height as f32;
        if overlap_ratio < self.config.min_overlap_ratio {
            return Err(Rejection::ScrollJump {
                offset,
                frame_length: frame_height,
            });
        }
        if overlap_ratio > self.config.max_overlap_ratio {
            return Err(Rejection::InsufficientAdvance { offset, overlap_ratio });
        }

        if result.cross_axis_offset.unsigned_abs() > self.config.max_cross_axis_shift {
            return Err(Rejection::CrossAxisShift {
                shift: result.cross_axis_offset,
                limit: self.config.max_cross_axis_shift,
            });
        }

        Ok(AcceptedOverlap {
            frame_index: result.frame_b_index,
            offset: offset as u32,
            overlap_height,
        })
    }
}

impl PipelineStage for OverlapValidator {
    fn stage_name(&self) -> &'static str {
        "validate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AlignmentMethod, DirectionHint};
    use chrono::Utc;
    use image::{Luma, Rgba, RgbaImage};

    /// Thin dashed rules every 20 rows on a white page
    fn ruled_page(width: u32, height: u32, shift: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let ink = (y + shift) % 20 == 2 && (x / 5) % 3 != 0;
            Luma([if ink { 30 } else { 250 }])
        })
    }

    fn result(offset: i32, confidence: f32) -> AlignmentResult {
        AlignmentResult::new(AlignmentMethod::Correlation, 0, 1)
            .with_offset(offset)
            .with_confidence(confidence)
            .judge(0.35, None)
    }

    #[test]
    fn test_identical_frames_are_duplicates() {
        let filter = DuplicateFilter::new(DuplicateConfig::default(), ScrollAxis::Vertical);
        let bitmap = RgbaImage::from_fn(40, 30, |x, y| Rgba([(x * 6) as u8, (y * 8) as u8, 0, 255]));
        let a = Frame::new(0, bitmap.clone(), Utc::now());
        let b = Frame::new(1, bitmap, Utc::now());

        assert_eq!(filter.filter(None, &b), FilterDecision::Accept);
        assert_eq!(filter.filter(Some(&a), &b), FilterDecision::RejectDuplicate);
    }

    #[test]
    fn test_one_pixel_scroll_of_sparse_content_is_kept() {
        let filter = DuplicateFilter::new(DuplicateConfig::default(), ScrollAxis::Vertical);
        let previous = ruled_page(200, 120, 0);
        let candidate = ruled_page(200, 120, 1);

        // the sample grid misses every rule, only the row profile sees the scroll
        assert_eq!(filter.similarity(&previous, &candidate), 1.0);
        assert_eq!(filter.filter_luma(Some(&previous), &candidate), FilterDecision::Accept);
    }

    #[test]
    fn test_different_sizes_are_never_duplicates() {
        let filter = DuplicateFilter::new(DuplicateConfig::default(), ScrollAxis::Vertical);
        let a = GrayImage::from_pixel(10, 10, Luma([200]));
        let b = GrayImage::from_pixel(10, 11, Luma([200]));
        assert_eq!(filter.filter_luma(Some(&a), &b), FilterDecision::Accept);
    }

    #[test]
    fn test_validator_accepts_regular_advance() {
        let validator = OverlapValidator::new(ValidationConfig::default());
        let overlap = validator.validate(&result(800, 0.9), 1000).unwrap();
        assert_eq!(overlap.offset, 800);
        assert_eq!(overlap.overlap_height, 200);
        assert_eq!(overlap.frame_index, 1);
    }

    #[test]
    fn test_validator_rejection_kinds() {
        let validator = OverlapValidator::new(ValidationConfig::default());

        let low = validator.validate(&result(300, 0.1), 1000).unwrap_err();
        assert_eq!(low, Rejection::LowConfidence { confidence: 0.1, threshold: 0.35 });

        let backwards = validator.validate(&result(-200, 0.9), 1000).unwrap_err();
        assert_eq!(backwards.kind(), "scroll_jump");

        let beyond = validator.validate(&result(1000, 0.9), 1000).unwrap_err();
        assert_eq!(beyond.kind(), "no_overlap");

        let still = validator.validate(&result(0, 0.9), 1000).unwrap_err();
        assert_eq!(still.kind(), "insufficient_advance");

        // 2% overlap is below the 5% minimum
        let jump = validator.validate(&result(980, 0.9), 1000).unwrap_err();
        assert_eq!(jump.kind(), "scroll_jump");

        // 99.8% overlap is above the 99.5% maximum
        let creep = validator.validate(&result(2, 0.9), 1000).unwrap_err();
        assert_eq!(creep.kind(), "insufficient_advance");
    }

    #[test]
    fn test_validator_direction_and_cross_axis() {
        let validator = OverlapValidator::new(ValidationConfig::default());

        let reversed = AlignmentResult::new(AlignmentMethod::Correlation, 4, 5)
            .with_offset(-300)
            .with_confidence(0.95)
            .judge(0.35, Some(DirectionHint::Forward));
        assert_eq!(validator.validate(&reversed, 1000).unwrap_err().kind(), "scroll_jump");

        let drifted = result(400, 0.9).with_cross_axis_offset(-5);
        assert_eq!(
            validator.validate(&drifted, 1000).unwrap_err(),
            Rejection::CrossAxisShift { shift: -5, limit: 2 }
        );
    }
}
