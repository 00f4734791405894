use crate::algorithms::correlation::{best_offset_in, RowSignatures};
use crate::config::{FeatureConfig, RansacConfig};
use crate::logging::AlgorithmSpan;
use crate::pipeline::{AlignmentAlgorithm, AlignmentMethod, AlignmentResult, DirectionHint};
use crate::utils::image_conversion::{
    analysis_width, downsample, equalize_histogram, sample_scale, texture_score,
};
use crate::utils::ransac::{estimate_translation_ransac, PointMatch};
use image::{imageops, GrayImage};
use instant::Instant;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Bresenham circle of radius 3 used by the FAST segment test
const FAST_CIRCLE: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1), (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1), (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// Contiguous circle pixels required by FAST-9
const FAST_ARC: usize = 9;

const SUPPRESSION_RADIUS: f32 = 3.0;

/// Fixed seed for the BRIEF sampling pattern; descriptors from different
/// aligners must stay comparable.
const BRIEF_PATTERN_SEED: u64 = 0x0b21_ef00;

#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub response: f32,
    pub angle: f32,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub keypoint: Keypoint,
    /// 256-bit steered BRIEF descriptor
    pub descriptor: [u8; 32],
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureMatch {
    pub previous_idx: usize,
    pub candidate_idx: usize,
    pub distance: u32,
}

/// ORB-style feature matching with RANSAC translation consensus.
///
/// Works on downsampled frames and refines the scroll offset at full
/// resolution with the row-signature cost.
pub struct FeatureAligner {
    config: FeatureConfig,
    ransac: RansacConfig,
    ignore_trailing: u32,
    refine_bands: u32,
    pattern: Vec<(i8, i8, i8, i8)>,
}

impl FeatureAligner {
    pub fn new(config: FeatureConfig, ransac: RansacConfig, ignore_trailing: u32, refine_bands: u32) -> Self {
        let pattern = brief_pattern(config.descriptor_patch_size);
        Self {
            config,
            ransac,
            ignore_trailing,
            refine_bands,
            pattern,
        }
    }

    pub fn extract_features(&self, image: &GrayImage, fast_threshold: u8) -> Vec<Feature> {
        let corners = self.detect_fast_corners(image, fast_threshold);
        corners
            .into_par_iter()
            .map(|mut keypoint| {
                keypoint.angle = self.compute_keypoint_orientation(image, keypoint.x as u32, keypoint.y as u32);
                let descriptor = self.compute_brief_descriptor(image, &keypoint);
                Feature { keypoint, descriptor }
            })
            .collect()
    }

    fn detect_fast_corners(&self, image: &GrayImage, threshold: u8) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();
        if width < 7 || height < 7 {
            return Vec::new();
        }

        let corners: Vec<Keypoint> = (3..height - 3)
            .into_par_iter()
            .flat_map_iter(move |y| {
                (3..width - 3).filter_map(move |x| {
                    let center = image.get_pixel(x, y)[0];
                    is_fast_corner(image, x, y, center, threshold).then(|| Keypoint {
                        x: x as f32,
                        y: y as f32,
                        response: corner_response(image, x, y),
                        angle: 0.0,
                    })
                })
            })
            .collect();

        self.non_maximum_suppression(corners)
    }

    fn non_maximum_suppression(&self, mut corners: Vec<Keypoint>) -> Vec<Keypoint> {
        corners.sort_by(|a, b| {
            b.response
                .partial_cmp(&a.response)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.y.total_cmp(&b.y))
                .then_with(|| a.x.total_cmp(&b.x))
        });

        let mut selected: Vec<Keypoint> = Vec::new();
        for corner in corners {
            let suppressed = selected.iter().any(|kept| {
                let dx = corner.x - kept.x;
                let dy = corner.y - kept.y;
                (dx * dx + dy * dy).sqrt() < SUPPRESSION_RADIUS
            });

            if !suppressed {
                selected.push(corner);
                if selected.len() >= self.config.max_keypoints {
                    break;
                }
            }
        }

        selected
    }

    /// Intensity-centroid orientation over a disc of the patch radius
    fn compute_keypoint_orientation(&self, image: &GrayImage, x: u32, y: u32) -> f32 {
        let radius = (self.config.descriptor_patch_size / 2) as i32;
        let mut m01 = 0.0f32;
        let mut m10 = 0.0f32;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let px = x as i32 + dx;
                let py = y as i32 + dy;
                if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                    let intensity = image.get_pixel(px as u32, py as u32)[0] as f32;
                    m01 += intensity * dy as f32;
                    m10 += intensity * dx as f32;
                }
            }
        }

        m01.atan2(m10)
    }

    fn compute_brief_descriptor(&self, image: &GrayImage, keypoint: &Keypoint) -> [u8; 32] {
        let mut descriptor = [0u8; 32];
        let x = keypoint.x as i32;
        let y = keypoint.y as i32;
        let (sin_angle, cos_angle) = keypoint.angle.sin_cos();
        let max_x = image.width() as i32 - 1;
        let max_y = image.height() as i32 - 1;

        let sample = |dx: i8, dy: i8| {
            let rx = (dx as f32 * cos_angle - dy as f32 * sin_angle).round() as i32;
            let ry = (dx as f32 * sin_angle + dy as f32 * cos_angle).round() as i32;
            let px = (x + rx).clamp(0, max_x) as u32;
            let py = (y + ry).clamp(0, max_y) as u32;
            image.get_pixel(px, py)[0]
        };

        for (byte_idx, byte_tests) in self.pattern.chunks(8).enumerate() {
            let mut byte_val = 0u8;
            for (bit_idx, &(dx1, dy1, dx2, dy2)) in byte_tests.iter().enumerate() {
                if sample(dx1, dy1) < sample(dx2, dy2) {
                    byte_val |= 1 << bit_idx;
                }
            }
            descriptor[byte_idx] = byte_val;
        }

        descriptor
    }

    /// Brute-force Hamming nearest neighbour with Lowe's ratio test
    pub fn match_features(&self, previous: &[Feature], candidate: &[Feature]) -> (usize, Vec<FeatureMatch>) {
        let nearest: Vec<Option<(usize, u32, u32)>> = previous
            .par_iter()
            .map(|feature| {
                let mut best = u32::MAX;
                let mut second = u32::MAX;
                let mut best_idx = None;

                for (idx, other) in candidate.iter().enumerate() {
                    let distance = hamming_distance(&feature.descriptor, &other.descriptor);
                    if distance < best {
                        second = best;
                        best = distance;
                        best_idx = Some(idx);
                    } else if distance < second {
                        second = distance;
                    }
                }

                best_idx.map(|idx| (idx, best, second))
            })
            .collect();

        let raw = nearest.iter().flatten().count();
        let matches = nearest
            .into_iter()
            .enumerate()
            .filter_map(|(previous_idx, found)| {
                let (candidate_idx, best, second) = found?;
                let distinct = second == u32::MAX || (best as f32) < self.config.ratio_threshold * second as f32;
                (best <= self.config.max_descriptor_distance && distinct).then_some(FeatureMatch {
                    previous_idx,
                    candidate_idx,
                    distance: best,
                })
            })
            .collect();

        (raw, matches)
    }

    fn refine_offset(&self, previous: &GrayImage, candidate: &GrayImage, estimate: i32, radius: u32) -> i32 {
        // both views already exclude the trailing columns
        let columns = previous.width().min(candidate.width());
        let (prev_sig, cand_sig) = rayon::join(
            || RowSignatures::compute_within(previous, columns, self.refine_bands, 0),
            || RowSignatures::compute_within(candidate, columns, self.refine_bands, 0),
        );
        let radius = radius as i32;
        best_offset_in(&prev_sig, &cand_sig, estimate - radius..=estimate + radius)
            .map(|(offset, _)| offset)
            .unwrap_or(estimate)
    }
}

impl AlignmentAlgorithm for FeatureAligner {
    fn name(&self) -> &str {
        "FeatureMatch"
    }

    fn method(&self) -> AlignmentMethod {
        AlignmentMethod::FeatureMatch
    }

    fn min_confidence(&self) -> f32 {
        self.config.min_confidence
    }

    fn align(
        &self,
        previous: &GrayImage,
        candidate: &GrayImage,
        pair: (usize, usize),
        hint: Option<DirectionHint>,
    ) -> AlignmentResult {
        let start = Instant::now();
        let span = AlgorithmSpan::new(self.name(), pair);
        let _guard = span.enter();

        let previous_view = without_trailing(previous, self.ignore_trailing);
        let candidate_view = without_trailing(candidate, self.ignore_trailing);

        let scale = sample_scale(
            previous_view.height(),
            self.config.sample_rate,
            self.config.min_sample_size,
            self.config.max_sample_size,
        );
        let (mut prev_small, mut cand_small) =
            rayon::join(|| downsample(&previous_view, scale), || downsample(&candidate_view, scale));

        let texture = texture_score(&prev_small).min(texture_score(&cand_small));
        let fast_threshold = if texture < self.config.low_texture_threshold {
            tracing::debug!(texture, "Low texture, equalising before detection");
            prev_small = equalize_histogram(&prev_small);
            cand_small = equalize_histogram(&cand_small);
            self.config.low_texture_fast_threshold
        } else {
            self.config.fast_threshold
        };

        let (prev_features, cand_features) = rayon::join(
            || self.extract_features(&prev_small, fast_threshold),
            || self.extract_features(&cand_small, fast_threshold),
        );
        span.record_feature_detection(prev_features.len(), cand_features.len());

        let (raw_matches, matches) = self.match_features(&prev_features, &cand_features);
        span.record_matching(raw_matches, matches.len());

        let points: Vec<PointMatch> = matches
            .iter()
            .map(|m| {
                let a = &prev_features[m.previous_idx].keypoint;
                let b = &cand_features[m.candidate_idx].keypoint;
                PointMatch::new((a.x, a.y), (b.x, b.y))
            })
            .collect();

        let consensus = estimate_translation_ransac(&points, &self.ransac);
        span.record_ransac(consensus.iterations, consensus.inlier_count, consensus.translation);

        let mut result = AlignmentResult::new(AlignmentMethod::FeatureMatch, pair.0, pair.1)
            .with_support(consensus.total_matches, consensus.inlier_count);

        if consensus.inlier_count > 0 {
            // content moving towards the origin is a forward scroll
            let coarse = (-consensus.translation.1 / scale).round() as i32;
            let cross = (consensus.translation.0 / scale).round() as i32;
            let radius = self.config.refine_radius.max((1.0 / scale).ceil() as u32);
            let offset = self.refine_offset(&previous_view, &candidate_view, coarse, radius);

            result = result
                .with_offset(offset)
                .with_cross_axis_offset(cross)
                .with_confidence(consensus.confidence);
        }

        let mut result = result.judge(self.config.min_confidence, hint);
        result.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        span.record_result(result.valid, result.confidence, result.offset);
        result
    }
}

fn without_trailing(image: &GrayImage, ignore_trailing: u32) -> Cow<'_, GrayImage> {
    let width = analysis_width(image.width(), ignore_trailing);
    if width == image.width() {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(imageops::crop_imm(image, 0, 0, width, image.height()).to_image())
    }
}

fn is_fast_corner(image: &GrayImage, x: u32, y: u32, center: u8, threshold: u8) -> bool {
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    let mut bright_run = 0;
    let mut dark_run = 0;

    // walk the circle twice so arcs wrapping past the start are counted
    for i in 0..FAST_CIRCLE.len() * 2 {
        let (dx, dy) = FAST_CIRCLE[i % FAST_CIRCLE.len()];
        let pixel = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0];

        if pixel > bright {
            bright_run += 1;
            dark_run = 0;
        } else if pixel < dark {
            dark_run += 1;
            bright_run = 0;
        } else {
            bright_run = 0;
            dark_run = 0;
        }

        if bright_run >= FAST_ARC || dark_run >= FAST_ARC {
            return true;
        }
    }

    false
}

/// Local standard deviation in a 5x5 window
fn corner_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0.0f32;

    for py in y.saturating_sub(2)..=(y + 2).min(image.height() - 1) {
        for px in x.saturating_sub(2)..=(x + 2).min(image.width() - 1) {
            let intensity = image.get_pixel(px, py)[0] as f32;
            sum += intensity;
            sum_sq += intensity * intensity;
            count += 1.0;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0).sqrt()
}

fn hamming_distance(a: &[u8; 32], b: &[u8; 32]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// 256 point-pair tests inside a square patch, drawn from a fixed seed.
fn brief_pattern(patch_size: u32) -> Vec<(i8, i8, i8, i8)> {
    let half = (patch_size / 2).min(i8::MAX as u32) as i8;
    let mut rng = StdRng::seed_from_u64(BRIEF_PATTERN_SEED);
    (0..256)
        .map(|_| {
            (
                rng.gen_range(-half..=half),
                rng.gen_range(-half..=half),
                rng.gen_range(-half..=half),
                rng.gen_range(-half..=half),
            )
        })
        .collect()
}
