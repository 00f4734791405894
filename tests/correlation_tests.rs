mod common;

use common::{create_page, cut_frames, to_luma};
use longshot_stitch::algorithms::correlation::{CostProfile, RowSignatures};
use longshot_stitch::config::CorrelationConfig;
use longshot_stitch::*;

fn aligner() -> CorrelationAligner {
    CorrelationAligner::new(CorrelationConfig::default(), 0)
}

#[test]
fn test_recovers_known_scroll_offsets() {
    let page = create_page(320, 1200, 7);

    for offset in [40u32, 150, 333, 480] {
        let frames = cut_frames(&page, 600, &[0, offset]);
        let result = aligner().align(&to_luma(&frames[0]), &to_luma(&frames[1]), (0, 1), None);

        assert!(result.valid, "offset {} not found: {:?}", offset, result);
        assert!((result.offset - offset as i32).abs() <= 1);
        assert_eq!(result.method, AlignmentMethod::Correlation);
        assert!(result.confidence > 0.9);
    }
}

#[test]
fn test_reverse_scroll_gives_negative_offset() {
    let page = create_page(320, 1200, 11);
    let frames = cut_frames(&page, 600, &[400, 100]);

    let result = aligner().align(&to_luma(&frames[0]), &to_luma(&frames[1]), (0, 1), None);
    assert!(result.valid);
    assert_eq!(result.offset, -300);

    let hinted = aligner().align(
        &to_luma(&frames[0]),
        &to_luma(&frames[1]),
        (0, 1),
        Some(DirectionHint::Forward),
    );
    assert!(!hinted.valid);
    assert!(!hinted.direction_consistent);
}

#[test]
fn test_unrelated_frames_have_low_confidence() {
    let a = to_luma(&create_page(320, 600, 1));
    let b = to_luma(&create_page(320, 600, 2));

    let result = aligner().align(&a, &b, (0, 1), None);
    assert!(!result.valid);
    assert!(result.confidence < CorrelationConfig::default().min_confidence);
}

#[test]
fn test_ignored_trailing_columns_do_not_disturb_alignment() {
    let page = create_page(320, 1000, 5);
    let mut frames = cut_frames(&page, 500, &[0, 120]);

    // a scrollbar thumb that moves differently from the content
    for (i, frame) in frames.iter_mut().enumerate() {
        for y in 0..frame.height() {
            for x in 308..320 {
                let v = if (y / 50 + i as u32) % 2 == 0 { 0 } else { 255 };
                frame.put_pixel(x, y, image::Rgba([v, v, v, 255]));
            }
        }
    }

    let aligner = CorrelationAligner::new(CorrelationConfig::default(), 12);
    let result = aligner.align(&to_luma(&frames[0]), &to_luma(&frames[1]), (0, 1), None);
    assert!(result.valid);
    assert_eq!(result.offset, 120);
}

#[test]
fn test_cost_profile_is_zero_at_true_offset() {
    let page = create_page(200, 800, 3);
    let frames = cut_frames(&page, 400, &[0, 90]);

    let previous = RowSignatures::compute(&to_luma(&frames[0]), 16, 0);
    let candidate = RowSignatures::compute(&to_luma(&frames[1]), 16, 0);
    let profile = CostProfile::evaluate(&previous, &candidate, 16);

    assert_eq!(profile.best().map(|(k, _)| k), Some(90));
    assert_eq!(profile.cost_at(90), Some(0.0));
    assert!(profile.runner_up(90, 2).unwrap_or(0.0) > 0.0);
}
