use crate::pipeline::{AlignmentMode, FailurePolicy, ScrollAxis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything a stitching session needs, passed explicitly at construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StitchConfig {
    pub axis: ScrollAxis,
    pub mode: AlignmentMode,
    pub failure_policy: FailurePolicy,
    /// Keep frames and canvas of an aborted session around for debugging
    pub retain_partial_on_abort: bool,
    /// Cross-axis pixels excluded from analysis at the trailing edge (scrollbar)
    pub ignore_trailing_pixels: u32,
    pub duplicate: DuplicateConfig,
    pub correlation: CorrelationConfig,
    pub feature: FeatureConfig,
    pub ransac: RansacConfig,
    pub validation: ValidationConfig,
    pub canvas: CanvasConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Similarity (1 - mean abs diff / 255) at or above which frames are duplicates
    pub similarity_threshold: f32,
    /// Largest per-row mean luma difference still considered unchanged
    pub row_tolerance: f32,
    /// Sampling stride of the comparison grid, in pixels
    pub sample_stride: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub min_confidence: f32,
    /// Column bands each row is reduced to
    pub signature_bands: u32,
    /// Fewest shared rows an offset hypothesis may have
    pub min_overlap_rows: u32,
    /// Offsets closer than this to the best are not competing minima
    pub exclusion_radius: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub min_confidence: f32,
    pub fast_threshold: u8,
    /// FAST threshold used on low-texture frames after equalisation
    pub low_texture_fast_threshold: u8,
    /// Laplacian texture score below which frames are equalised
    pub low_texture_threshold: f32,
    pub max_keypoints: usize,
    pub descriptor_patch_size: u32,
    pub ratio_threshold: f32,
    pub max_descriptor_distance: u32,
    pub sample_rate: f32,
    pub min_sample_size: u32,
    pub max_sample_size: u32,
    /// Full-resolution search radius around the upscaled feature estimate
    pub refine_radius: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Pixel distance (in sampled coordinates) for a match to count as inlier
    pub inlier_threshold: f32,
    pub min_inliers: usize,
    /// Stop early once this inlier ratio is reached
    pub early_exit_ratio: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_overlap_ratio: f32,
    pub max_overlap_ratio: f32,
    pub max_cross_axis_shift: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub max_pixels: u64,
    /// Fraction of `max_pixels` at which a warning is logged
    pub warn_ratio: f32,
    /// RGBA fill used when padding narrower frames
    pub background: [u8; 4],
    /// Rows blended across each seam (0 = hard cut)
    pub seam_blend_rows: u32,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.995,
            row_tolerance: 1.0,
            sample_stride: 4,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.35,
            signature_bands: 32,
            min_overlap_rows: 16,
            exclusion_radius: 2,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            fast_threshold: 20,
            low_texture_fast_threshold: 10,
            low_texture_threshold: 0.3,
            max_keypoints: 800,
            descriptor_patch_size: 15,
            ratio_threshold: 0.8,
            max_descriptor_distance: 64,
            sample_rate: 0.5,
            min_sample_size: 300,
            max_sample_size: 800,
            refine_radius: 3,
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            inlier_threshold: 1.5,
            min_inliers: 6,
            early_exit_ratio: 0.95,
            seed: 0x5eed_cafe,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.05,
            max_overlap_ratio: 0.995,
            max_cross_axis_shift: 2,
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            max_pixels: 200_000_000,
            warn_ratio: 0.8,
            background: [255, 255, 255, 255],
            seam_blend_rows: 0,
        }
    }
}

impl StitchConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let unit = |value: f32| (0.0..=1.0).contains(&value);

        if !unit(self.duplicate.similarity_threshold) {
            errors.push("duplicate.similarity_threshold must be within [0, 1]".to_string());
        }
        if self.duplicate.sample_stride == 0 {
            errors.push("duplicate.sample_stride must be positive".to_string());
        }

        if !unit(self.correlation.min_confidence) {
            errors.push("correlation.min_confidence must be within [0, 1]".to_string());
        }
        if self.correlation.signature_bands == 0 {
            errors.push("correlation.signature_bands must be positive".to_string());
        }
        if self.correlation.min_overlap_rows == 0 {
            errors.push("correlation.min_overlap_rows must be positive".to_string());
        }

        if !unit(self.feature.min_confidence) {
            errors.push("feature.min_confidence must be within [0, 1]".to_string());
        }
        if self.feature.sample_rate <= 0.0 || self.feature.sample_rate > 1.0 {
            errors.push("feature.sample_rate must be within (0, 1]".to_string());
        }
        if self.feature.min_sample_size > self.feature.max_sample_size {
            errors.push("feature.min_sample_size must not exceed max_sample_size".to_string());
        }
        if self.feature.descriptor_patch_size < 5 || self.feature.descriptor_patch_size % 2 == 0 {
            errors.push("feature.descriptor_patch_size must be odd and at least 5".to_string());
        }
        if self.feature.ratio_threshold <= 0.0 || self.feature.ratio_threshold > 1.0 {
            errors.push("feature.ratio_threshold must be within (0, 1]".to_string());
        }

        if self.ransac.max_iterations == 0 {
            errors.push("ransac.max_iterations must be positive".to_string());
        }
        if self.ransac.inlier_threshold <= 0.0 {
            errors.push("ransac.inlier_threshold must be positive".to_string());
        }

        let v = &self.validation;
        if !unit(v.min_overlap_ratio) || !unit(v.max_overlap_ratio) {
            errors.push("validation overlap ratios must be within [0, 1]".to_string());
        } else if v.min_overlap_ratio >= v.max_overlap_ratio {
            errors.push("validation.min_overlap_ratio must be below max_overlap_ratio".to_string());
        }

        if self.canvas.max_pixels == 0 {
            errors.push("canvas.max_pixels must be positive".to_string());
        }
        if !unit(self.canvas.warn_ratio) {
            errors.push("canvas.warn_ratio must be within [0, 1]".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&Path>) -> StitchConfig {
    match config_path {
        Some(path) => match StitchConfig::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    for error in errors {
                        tracing::warn!(error = %error, "Configuration validation error");
                    }
                    tracing::warn!("Using default configuration instead");
                    StitchConfig::default()
                } else {
                    config
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                StitchConfig::default()
            }
        },
        None => StitchConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(StitchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = StitchConfig::default();
        config.duplicate.sample_stride = 0;
        config.validation.min_overlap_ratio = 0.9;
        config.validation.max_overlap_ratio = 0.5;
        config.feature.descriptor_patch_size = 8;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stitch.toml");

        let mut config = StitchConfig::default();
        config.axis = ScrollAxis::Horizontal;
        config.failure_policy = FailurePolicy::Finalize;
        config.canvas.seam_blend_rows = 12;
        config.save_to_file(&path, ConfigFormat::Toml).unwrap();

        let loaded = StitchConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.axis, ScrollAxis::Horizontal);
        assert_eq!(loaded.failure_policy, FailurePolicy::Finalize);
        assert_eq!(loaded.canvas.seam_blend_rows, 12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stitch.json");
        fs::write(&path, r#"{ "failure_policy": "skip", "correlation": { "min_confidence": 0.6 } }"#).unwrap();

        let loaded = StitchConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.failure_policy, FailurePolicy::Skip);
        assert_eq!(loaded.correlation.min_confidence, 0.6);
        assert_eq!(loaded.correlation.signature_bands, 32);
        assert_eq!(loaded.axis, ScrollAxis::Vertical);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = load_config_or_default(Some(Path::new("/definitely/not/here.toml")));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }
}
