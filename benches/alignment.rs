//! Benchmarks for the overlap estimators
//!
//! Correlation runs on every frame pair; feature matching only as fallback,
//! so the two are measured separately across frame sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma};
use longshot_stitch::config::{CorrelationConfig, FeatureConfig, RansacConfig};
use longshot_stitch::{AlignmentAlgorithm, CorrelationAligner, FeatureAligner};
use std::time::Duration;

/// Pseudo-random blocky page, deterministic per size
fn create_page(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let cell = (x / 9).wrapping_mul(73_856_093) ^ (y / 5).wrapping_mul(19_349_663);
        Luma([(cell.wrapping_mul(2_654_435_761) >> 24) as u8])
    })
}

fn frame_pair(width: u32, height: u32, offset: u32) -> (GrayImage, GrayImage) {
    let page = create_page(width, height + offset);
    let previous = image::imageops::crop_imm(&page, 0, 0, width, height).to_image();
    let candidate = image::imageops::crop_imm(&page, 0, offset, width, height).to_image();
    (previous, candidate)
}

fn benchmark_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    let aligner = CorrelationAligner::new(CorrelationConfig::default(), 0);
    for (width, height) in [(400u32, 600u32), (800, 1200), (1080, 1920)] {
        let pair = frame_pair(width, height, height / 3);

        group.bench_with_input(
            BenchmarkId::new("align", format!("{}x{}", width, height)),
            &pair,
            |b, (previous, candidate)| {
                b.iter(|| aligner.align(black_box(previous), black_box(candidate), (0, 1), None));
            },
        );
    }

    group.finish();
}

fn benchmark_feature_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_match");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    let aligner = FeatureAligner::new(FeatureConfig::default(), RansacConfig::default(), 0, 32);
    for (width, height) in [(400u32, 600u32), (800, 1200)] {
        let pair = frame_pair(width, height, height / 3);

        group.bench_with_input(
            BenchmarkId::new("align", format!("{}x{}", width, height)),
            &pair,
            |b, (previous, candidate)| {
                b.iter(|| aligner.align(black_box(previous), black_box(candidate), (0, 1), None));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_correlation, benchmark_feature_match);
criterion_main!(benches);
