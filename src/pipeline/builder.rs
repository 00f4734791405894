use crate::algorithms::{CorrelationAligner, FeatureAligner};
use crate::config::StitchConfig;
use crate::pipeline::{AlignmentAlgorithm, AlignmentMode, AlignmentResult, DirectionHint, PipelineStage};
use image::GrayImage;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Builder for the estimator's fallback chain
#[derive(Default)]
pub struct EstimatorBuilder {
    methods: Vec<Box<dyn AlignmentAlgorithm>>,
}

impl EstimatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a method; methods run in insertion order
    pub fn add_method<A>(mut self, method: A) -> Self
    where
        A: AlignmentAlgorithm + 'static,
    {
        self.methods.push(Box::new(method));
        self
    }

    pub fn build(self) -> AlignmentEstimator {
        AlignmentEstimator {
            methods: self.methods,
        }
    }
}

/// Ordered fallback chain of alignment methods: the first valid result wins.
pub struct AlignmentEstimator {
    methods: Vec<Box<dyn AlignmentAlgorithm>>,
}

impl AlignmentEstimator {
    /// Chain selected by `config.mode`: correlation, then feature matching.
    pub fn from_config(config: &StitchConfig) -> Self {
        let correlation = || CorrelationAligner::new(config.correlation.clone(), config.ignore_trailing_pixels);
        let feature = || {
            FeatureAligner::new(
                config.feature.clone(),
                config.ransac.clone(),
                config.ignore_trailing_pixels,
                config.correlation.signature_bands,
            )
        };

        let builder = EstimatorBuilder::new();
        let builder = match config.mode {
            AlignmentMode::Auto => builder.add_method(correlation()).add_method(feature()),
            AlignmentMode::CorrelationOnly => builder.add_method(correlation()),
            AlignmentMode::FeatureOnly => builder.add_method(feature()),
        };
        builder.build()
    }

    /// Run the chain on two scroll-normalised luma views.
    ///
    /// When no method produces a valid result, the failed attempt with the
    /// highest confidence is returned (earliest method on ties).
    pub fn estimate(
        &self,
        previous: &GrayImage,
        candidate: &GrayImage,
        pair: (usize, usize),
        hint: Option<DirectionHint>,
    ) -> Option<AlignmentResult> {
        let mut best_failure: Option<AlignmentResult> = None;

        for method in &self.methods {
            let result = method.align(previous, candidate, pair, hint);

            debug!(
                method = method.name(),
                offset = result.offset,
                confidence = result.confidence,
                valid = result.valid,
                direction_consistent = result.direction_consistent,
                execution_time_ms = result.execution_time_ms,
                "Alignment attempt"
            );

            if result.valid {
                info!(
                    method = method.name(),
                    offset = result.offset,
                    confidence = result.confidence,
                    "Alignment accepted"
                );
                return Some(result);
            }

            best_failure = match best_failure {
                Some(best) if compare_confidence(&result, &best) != Ordering::Greater => Some(best),
                _ => Some(result),
            };
        }

        best_failure
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }
}

impl PipelineStage for AlignmentEstimator {
    fn stage_name(&self) -> &'static str {
        "align"
    }
}

fn compare_confidence(a: &AlignmentResult, b: &AlignmentResult) -> Ordering {
    a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AlignmentMethod;

    /// Returns a canned result
    struct Fixed {
        method: AlignmentMethod,
        offset: i32,
        confidence: f32,
    }

    impl AlignmentAlgorithm for Fixed {
        fn name(&self) -> &str {
            self.method.name()
        }

        fn method(&self) -> AlignmentMethod {
            self.method
        }

        fn min_confidence(&self) -> f32 {
            0.5
        }

        fn align(
            &self,
            _previous: &GrayImage,
            _candidate: &GrayImage,
            pair: (usize, usize),
            hint: Option<DirectionHint>,
        ) -> AlignmentResult {
            AlignmentResult::new(self.method, pair.0, pair.1)
                .with_offset(self.offset)
                .with_confidence(self.confidence)
                .judge(self.min_confidence(), hint)
        }
    }

    fn fixed(method: AlignmentMethod, offset: i32, confidence: f32) -> Fixed {
        Fixed { method, offset, confidence }
    }

    fn image() -> GrayImage {
        GrayImage::new(4, 4)
    }

    #[test]
    fn test_first_valid_result_wins() {
        let estimator = EstimatorBuilder::new()
            .add_method(fixed(AlignmentMethod::Correlation, 100, 0.9))
            .add_method(fixed(AlignmentMethod::FeatureMatch, 140, 0.95))
            .build();

        let result = estimator.estimate(&image(), &image(), (0, 1), None).unwrap();
        assert_eq!(result.method, AlignmentMethod::Correlation);
        assert_eq!(result.offset, 100);
    }

    #[test]
    fn test_falls_back_to_second_method() {
        let estimator = EstimatorBuilder::new()
            .add_method(fixed(AlignmentMethod::Correlation, 100, 0.2))
            .add_method(fixed(AlignmentMethod::FeatureMatch, 140, 0.8))
            .build();

        let result = estimator.estimate(&image(), &image(), (0, 1), None).unwrap();
        assert_eq!(result.method, AlignmentMethod::FeatureMatch);
        assert!(result.valid);
    }

    #[test]
    fn test_all_failures_return_most_confident_attempt() {
        let estimator = EstimatorBuilder::new()
            .add_method(fixed(AlignmentMethod::Correlation, 100, 0.3))
            .add_method(fixed(AlignmentMethod::FeatureMatch, 140, 0.1))
            .build();

        let result = estimator.estimate(&image(), &image(), (2, 3), None).unwrap();
        assert!(!result.valid);
        assert_eq!(result.method, AlignmentMethod::Correlation);
        assert_eq!((result.frame_a_index, result.frame_b_index), (2, 3));
    }

    #[test]
    fn test_direction_hint_invalidates_reversed_result() {
        let estimator = EstimatorBuilder::new()
            .add_method(fixed(AlignmentMethod::Correlation, -100, 0.9))
            .build();

        let result = estimator
            .estimate(&image(), &image(), (0, 1), Some(DirectionHint::Forward))
            .unwrap();
        assert!(!result.valid);
        assert!(!result.direction_consistent);
    }

    #[test]
    fn test_mode_selects_chain() {
        let mut config = StitchConfig::default();
        assert_eq!(AlignmentEstimator::from_config(&config).method_names(), vec!["Correlation", "FeatureMatch"]);

        config.mode = AlignmentMode::FeatureOnly;
        assert_eq!(AlignmentEstimator::from_config(&config).method_names(), vec!["FeatureMatch"]);

        config.mode = AlignmentMode::CorrelationOnly;
        assert_eq!(AlignmentEstimator::from_config(&config).num_methods(), 1);
    }

    #[test]
    fn test_empty_chain_yields_nothing() {
        let estimator = EstimatorBuilder::new().build();
        assert!(estimator.estimate(&image(), &image(), (0, 1), None).is_none());
    }
}
