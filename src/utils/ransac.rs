use crate::config::RansacConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A correspondence between a point in the previous frame and one in the
/// candidate frame, both in scroll-normalised `(cross, scroll)` coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMatch {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

impl PointMatch {
    pub fn new(from: (f32, f32), to: (f32, f32)) -> Self {
        Self { from, to }
    }

    fn displacement(&self) -> (f32, f32) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Result of RANSAC estimation
#[derive(Clone, Debug)]
pub struct RansacResult {
    /// Mean displacement `to - from` of the inliers
    pub translation: (f32, f32),
    pub confidence: f32,
    pub inlier_count: usize,
    pub total_matches: usize,
    pub iterations: usize,
}

impl RansacResult {
    fn empty() -> Self {
        Self {
            translation: (0.0, 0.0),
            confidence: 0.0,
            inlier_count: 0,
            total_matches: 0,
            iterations: 0,
        }
    }
}

/// Estimate the dominant pure translation between matched points.
///
/// A single match fully determines a translation, so every hypothesis is one
/// correspondence. When there are no more matches than the iteration budget
/// all of them are tried in order; otherwise hypotheses are drawn from a
/// seeded generator, which keeps repeated runs identical.
pub fn estimate_translation_ransac(matches: &[PointMatch], config: &RansacConfig) -> RansacResult {
    if matches.is_empty() {
        return RansacResult::empty();
    }

    let exhaustive = matches.len() <= config.max_iterations;
    let budget = if exhaustive { matches.len() } else { config.max_iterations };
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best_inliers = 0usize;
    let mut best_hypothesis = (0.0f32, 0.0f32);
    let mut iterations = 0usize;

    for i in 0..budget {
        iterations += 1;
        let sample = if exhaustive {
            i
        } else {
            rng.gen_range(0..matches.len())
        };

        let hypothesis = matches[sample].displacement();
        let inliers = count_inliers(matches, hypothesis, config.inlier_threshold);

        if inliers > best_inliers {
            best_inliers = inliers;
            best_hypothesis = hypothesis;

            if inliers as f32 / matches.len() as f32 >= config.early_exit_ratio {
                break;
            }
        }
    }

    let translation = refine_translation(matches, best_hypothesis, config.inlier_threshold);

    let inlier_ratio = best_inliers as f32 / matches.len() as f32;
    let support = (best_inliers as f32 / config.min_inliers.max(1) as f32).min(1.0);

    RansacResult {
        translation,
        confidence: inlier_ratio * support,
        inlier_count: best_inliers,
        total_matches: matches.len(),
        iterations,
    }
}

fn count_inliers(matches: &[PointMatch], hypothesis: (f32, f32), threshold: f32) -> usize {
    matches
        .iter()
        .filter(|m| is_inlier(m, hypothesis, threshold))
        .count()
}

fn is_inlier(m: &PointMatch, hypothesis: (f32, f32), threshold: f32) -> bool {
    let (dx, dy) = m.displacement();
    let ex = dx - hypothesis.0;
    let ey = dy - hypothesis.1;
    (ex * ex + ey * ey).sqrt() <= threshold
}

/// Average the displacement over the consensus set
fn refine_translation(matches: &[PointMatch], hypothesis: (f32, f32), threshold: f32) -> (f32, f32) {
    let mut sum = (0.0f32, 0.0f32);
    let mut count = 0usize;

    for m in matches.iter().filter(|m| is_inlier(m, hypothesis, threshold)) {
        let (dx, dy) = m.displacement();
        sum.0 += dx;
        sum.1 += dy;
        count += 1;
    }

    if count == 0 {
        hypothesis
    } else {
        (sum.0 / count as f32, sum.1 / count as f32)
    }
}
