mod common;

use common::{create_page, cut_frames, to_luma};
use longshot_stitch::config::{FeatureConfig, RansacConfig};
use longshot_stitch::*;

fn aligner() -> FeatureAligner {
    FeatureAligner::new(FeatureConfig::default(), RansacConfig::default(), 0, 32)
}

#[test]
fn test_feature_aligner_recovers_offset() {
    let page = create_page(240, 700, 21);
    let frames = cut_frames(&page, 400, &[0, 120]);

    let result = aligner().align(&to_luma(&frames[0]), &to_luma(&frames[1]), (0, 1), None);

    assert_eq!(result.method, AlignmentMethod::FeatureMatch);
    assert!(result.valid, "feature alignment failed: {:?}", result);
    assert!((result.offset - 120).abs() <= 1);
    assert_eq!(result.cross_axis_offset, 0);
    assert!(result.inliers >= RansacConfig::default().min_inliers);
}

#[test]
fn test_feature_detection_is_deterministic() {
    let image = to_luma(&create_page(240, 400, 8));
    let aligner = aligner();

    let first = aligner.extract_features(&image, 20);
    let second = aligner.extract_features(&image, 20);

    assert!(!first.is_empty());
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!((a.keypoint.x, a.keypoint.y), (b.keypoint.x, b.keypoint.y));
        assert_eq!(a.descriptor, b.descriptor);
    }
}

#[test]
fn test_blank_frames_produce_invalid_result() {
    let blank = image::GrayImage::from_pixel(240, 400, image::Luma([255]));

    let result = aligner().align(&blank, &blank, (4, 5), None);
    assert!(!result.valid);
    assert_eq!(result.inliers, 0);
    assert_eq!((result.frame_a_index, result.frame_b_index), (4, 5));
}

#[test]
fn test_repeated_runs_give_identical_results() {
    let page = create_page(240, 700, 33);
    let frames = cut_frames(&page, 400, &[0, 200]);
    let (a, b) = (to_luma(&frames[0]), to_luma(&frames[1]));

    let first = aligner().align(&a, &b, (0, 1), None);
    let second = aligner().align(&a, &b, (0, 1), None);

    assert_eq!(first.offset, second.offset);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.inliers, second.inliers);
}
