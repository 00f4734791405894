use crate::config::CorrelationConfig;
use crate::logging::AlgorithmSpan;
use crate::pipeline::{AlignmentAlgorithm, AlignmentMethod, AlignmentResult, DirectionHint};
use crate::utils::image_conversion::analysis_width;
use image::GrayImage;
use instant::Instant;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Rows whose signatures differ by at most this many luma levels count as
/// agreeing with the winning offset.
const ROW_AGREEMENT_TOLERANCE: f32 = 2.0;

/// Per-row luma signatures: every row reduced to the means of a fixed number
/// of column bands.
#[derive(Debug, Clone)]
pub struct RowSignatures {
    bands: usize,
    rows: usize,
    data: Vec<f32>,
}

impl RowSignatures {
    /// Reduce `image` to `bands` band means per row, ignoring the trailing
    /// `ignore_trailing` columns.
    pub fn compute(image: &GrayImage, bands: u32, ignore_trailing: u32) -> Self {
        Self::compute_within(image, image.width(), bands, ignore_trailing)
    }

    /// Like [`RowSignatures::compute`], restricted to the leading `columns`
    /// columns so frames of different widths get bands over the same pixels.
    pub fn compute_within(image: &GrayImage, columns: u32, bands: u32, ignore_trailing: u32) -> Self {
        let width = analysis_width(columns.min(image.width()), ignore_trailing) as usize;
        let rows = image.height() as usize;
        let bands = (bands as usize).min(width).max(1);

        if width == 0 || rows == 0 {
            return Self {
                bands,
                rows,
                data: vec![0.0; bands * rows],
            };
        }

        let stride = image.width() as usize;
        let raw = image.as_raw();
        let mut data = vec![0.0f32; bands * rows];

        data.par_chunks_mut(bands)
            .enumerate()
            .for_each(|(y, signature)| {
                let row = &raw[y * stride..y * stride + width];
                for (b, value) in signature.iter_mut().enumerate() {
                    let start = b * width / bands;
                    let end = ((b + 1) * width / bands).max(start + 1);
                    let sum: u32 = row[start..end].iter().map(|&p| p as u32).sum();
                    *value = sum as f32 / (end - start) as f32;
                }
            });

        Self { bands, rows, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.bands..(index + 1) * self.bands]
    }

    fn row_distance(&self, a: usize, other: &RowSignatures, b: usize) -> f32 {
        self.row(a)
            .iter()
            .zip(other.row(b))
            .map(|(x, y)| (x - y).abs())
            .sum::<f32>()
            / self.bands as f32
    }
}

/// Row pairs `(previous_row, candidate_row)` compared at signed offset `k`.
fn shared_rows(previous: usize, candidate: usize, k: i32) -> (usize, usize, usize) {
    if k >= 0 {
        let k = k as usize;
        let count = previous.saturating_sub(k).min(candidate);
        (k, 0, count)
    } else {
        let k = k.unsigned_abs() as usize;
        let count = candidate.saturating_sub(k).min(previous);
        (0, k, count)
    }
}

/// Mean L1 signature distance between `previous[r + k]` and `candidate[r]`
/// over all shared rows. `None` when the frames do not overlap at `k`.
pub fn offset_cost(previous: &RowSignatures, candidate: &RowSignatures, k: i32) -> Option<f32> {
    if previous.bands != candidate.bands {
        return None;
    }

    let (prev_start, cand_start, count) = shared_rows(previous.rows, candidate.rows, k);
    if count == 0 {
        return None;
    }

    let total: f32 = (0..count)
        .map(|r| previous.row_distance(prev_start + r, candidate, cand_start + r))
        .sum();
    Some(total / count as f32)
}

/// Lowest-cost offset inside `range`, ties going to the smaller shift.
pub fn best_offset_in(
    previous: &RowSignatures,
    candidate: &RowSignatures,
    range: std::ops::RangeInclusive<i32>,
) -> Option<(i32, f32)> {
    range
        .filter_map(|k| offset_cost(previous, candidate, k).map(|cost| (k, cost)))
        .min_by(|a, b| compare_candidates(*a, *b))
}

fn compare_candidates(a: (i32, f32), b: (i32, f32)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.abs().cmp(&b.0.abs()))
        .then_with(|| a.0.cmp(&b.0))
}

/// Cost curve over a contiguous range of signed offsets.
#[derive(Debug, Clone)]
pub struct CostProfile {
    first_offset: i32,
    costs: Vec<f32>,
}

impl CostProfile {
    pub fn evaluate(previous: &RowSignatures, candidate: &RowSignatures, min_overlap_rows: u32) -> Self {
        let min_overlap = min_overlap_rows.max(1) as i32;
        let first = -(candidate.rows() as i32 - min_overlap);
        let last = previous.rows() as i32 - min_overlap;

        if last < first {
            return Self {
                first_offset: 0,
                costs: Vec::new(),
            };
        }

        let costs: Vec<f32> = (first..=last)
            .into_par_iter()
            .map(|k| offset_cost(previous, candidate, k).unwrap_or(f32::MAX))
            .collect();

        Self {
            first_offset: first,
            costs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn cost_at(&self, offset: i32) -> Option<f32> {
        let index = offset.checked_sub(self.first_offset)?;
        self.costs.get(usize::try_from(index).ok()?).copied()
    }

    /// Global minimum, ties going to the smaller shift.
    pub fn best(&self) -> Option<(i32, f32)> {
        self.points().min_by(|a, b| compare_candidates(*a, *b))
    }

    /// Best local minimum further than `exclusion_radius` from `best_offset`.
    /// Falls back to the highest cost outside the radius when the curve has
    /// no competing minimum at all.
    pub fn runner_up(&self, best_offset: i32, exclusion_radius: u32) -> Option<f32> {
        let outside = |k: i32| (k - best_offset).unsigned_abs() > exclusion_radius;

        let competing = (0..self.costs.len())
            .filter(|&i| self.is_local_minimum(i))
            .map(|i| (self.first_offset + i as i32, self.costs[i]))
            .filter(|&(k, _)| outside(k))
            .map(|(_, cost)| cost)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        competing.or_else(|| {
            self.points()
                .filter(|&(k, _)| outside(k))
                .map(|(_, cost)| cost)
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        })
    }

    fn is_local_minimum(&self, i: usize) -> bool {
        let cost = self.costs[i];
        let left = i == 0 || cost <= self.costs[i - 1];
        let right = i + 1 == self.costs.len() || cost <= self.costs[i + 1];
        left && right
    }

    fn points(&self) -> impl Iterator<Item = (i32, f32)> + '_ {
        self.costs
            .iter()
            .enumerate()
            .map(move |(i, &cost)| (self.first_offset + i as i32, cost))
    }
}

/// Confidence from the cost curve: how much the best offset stands out from
/// its strongest competitor, scaled by how well the rows actually match.
pub fn correlation_confidence(best_cost: f32, runner_up: Option<f32>) -> f32 {
    let distinctiveness = match runner_up {
        Some(second) if second > 0.0 && second.is_finite() => ((second - best_cost) / second).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let quality = (1.0 - best_cost / 255.0).clamp(0.0, 1.0);
    distinctiveness * quality
}

/// Offset estimation by row-signature correlation over every signed shift.
#[derive(Debug, Clone)]
pub struct CorrelationAligner {
    config: CorrelationConfig,
    ignore_trailing: u32,
}

impl CorrelationAligner {
    pub fn new(config: CorrelationConfig, ignore_trailing: u32) -> Self {
        Self {
            config,
            ignore_trailing,
        }
    }

    pub fn signatures(&self, image: &GrayImage) -> RowSignatures {
        RowSignatures::compute(image, self.config.signature_bands, self.ignore_trailing)
    }

    /// Signatures over the leading `columns` columns only
    pub fn signatures_within(&self, image: &GrayImage, columns: u32) -> RowSignatures {
        RowSignatures::compute_within(image, columns, self.config.signature_bands, self.ignore_trailing)
    }

    /// Align precomputed signatures.
    pub fn align_signatures(
        &self,
        previous: &RowSignatures,
        candidate: &RowSignatures,
        pair: (usize, usize),
        hint: Option<DirectionHint>,
    ) -> AlignmentResult {
        let result = AlignmentResult::new(AlignmentMethod::Correlation, pair.0, pair.1);

        let profile = CostProfile::evaluate(previous, candidate, self.config.min_overlap_rows);
        let Some((offset, best_cost)) = profile.best() else {
            tracing::debug!(
                rows = previous.rows(),
                min_overlap_rows = self.config.min_overlap_rows,
                "Frames too short for correlation"
            );
            return result.judge(self.config.min_confidence, hint);
        };

        let runner_up = profile.runner_up(offset, self.config.exclusion_radius);
        let confidence = correlation_confidence(best_cost, runner_up);

        let (prev_start, cand_start, shared) = shared_rows(previous.rows(), candidate.rows(), offset);
        let agreeing = (0..shared)
            .filter(|&r| previous.row_distance(prev_start + r, candidate, cand_start + r) <= ROW_AGREEMENT_TOLERANCE)
            .count();

        tracing::debug!(
            offset,
            best_cost,
            runner_up = ?runner_up,
            confidence,
            shared_rows = shared,
            "Correlation cost minimum"
        );

        result
            .with_offset(offset)
            .with_confidence(confidence)
            .with_support(shared, agreeing)
            .judge(self.config.min_confidence, hint)
    }
}

impl AlignmentAlgorithm for CorrelationAligner {
    fn name(&self) -> &str {
        "Correlation"
    }

    fn method(&self) -> AlignmentMethod {
        AlignmentMethod::Correlation
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

        let columns = previous.width().min(candidate.width());
        let (prev_sig, cand_sig) = rayon::join(
            || self.signatures_within(previous, columns),
            || self.signatures_within(candidate, columns),
        );
        let mut result = self.align_signatures(&prev_sig, &cand_sig, pair, hint);

        result.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        span.record_result(result.valid, result.confidence, result.offset);
        result
    }
}
