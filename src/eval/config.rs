//! Analysis configuration.
//!
//! [`AnalysisConfig`] bundles the parameters of every stage of a comparison.
//! It deserializes from JSON with every field optional, so a config file only
//! needs to name what it changes:
//!
//! ```json
//! { "ssim": { "window": 7 }, "parallel": false, "thresholds": { "min_psnr": 35.0 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::artifacts::{ArtifactConfig, ArtifactWeights};
use crate::analysis::histogram::DEFAULT_BINS;
use crate::analysis::noise::NoiseConfig;
use crate::error::{Error, Result};
use crate::metrics::ssim::SsimConfig;

/// Pass/fail limits used by [`assert_quality`](crate::eval::helpers::assert_quality)
/// and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum acceptable PSNR in dB.
    pub min_psnr: f64,
    /// Minimum acceptable SSIM.
    pub min_ssim: f64,
    /// Maximum acceptable artifact score.
    pub max_artifact: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_psnr: 30.0,
            min_ssim: 0.95,
            max_artifact: 0.3,
        }
    }
}

/// Configuration of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// SSIM parameters.
    pub ssim: SsimConfig,
    /// Noise estimator parameters.
    pub noise: NoiseConfig,
    /// Bins per channel for histogram comparison.
    pub histogram_bins: usize,
    /// Relative weights of the artifact score components. The artifact
    /// detector shares `ssim` and `histogram_bins`.
    pub artifact_weights: ArtifactWeights,
    /// Run independent stages concurrently.
    pub parallel: bool,
    /// Keep heat maps in the report.
    pub include_maps: bool,
    /// Pass/fail limits.
    pub thresholds: Thresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ssim: SsimConfig::default(),
            noise: NoiseConfig::default(),
            histogram_bins: DEFAULT_BINS,
            artifact_weights: ArtifactWeights::default(),
            parallel: true,
            include_maps: false,
            thresholds: Thresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Check every sub-configuration.
    pub fn validate(&self) -> Result<()> {
        self.ssim.validate()?;
        self.noise.validate()?;
        self.artifact_weights.validate()?;
        if self.histogram_bins == 0 {
            return Err(Error::Config("histogram_bins must be positive".into()));
        }
        Ok(())
    }

    /// Parameters for a standalone
    /// [`detect_artifacts`](crate::analysis::artifacts::detect_artifacts) run
    /// that matches what [`analyze`](crate::eval::analyze) computes.
    #[must_use]
    pub fn artifact_config(&self) -> ArtifactConfig {
        ArtifactConfig {
            weights: self.artifact_weights,
            ssim: self.ssim.clone(),
            histogram_bins: self.histogram_bins,
        }
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    ssim: Option<SsimConfig>,
    noise: Option<NoiseConfig>,
    histogram_bins: Option<usize>,
    weights: Option<ArtifactWeights>,
    parallel: Option<bool>,
    include_maps: Option<bool>,
    thresholds: Option<Thresholds>,
}

impl AnalysisConfigBuilder {
    /// Set the SSIM parameters.
    #[must_use]
    pub fn ssim(mut self, ssim: SsimConfig) -> Self {
        self.ssim = Some(ssim);
        self
    }

    /// Set the noise estimator parameters.
    #[must_use]
    pub fn noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Set the histogram bin count.
    #[must_use]
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Set the artifact component weights.
    #[must_use]
    pub fn artifact_weights(mut self, weights: ArtifactWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Enable or disable concurrent stages.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Keep heat maps in the report.
    #[must_use]
    pub fn include_maps(mut self, include: bool) -> Self {
        self.include_maps = Some(include);
        self
    }

    /// Set the pass/fail limits.
    #[must_use]
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            ssim: self.ssim.unwrap_or(defaults.ssim),
            noise: self.noise.unwrap_or(defaults.noise),
            histogram_bins: self.histogram_bins.unwrap_or(defaults.histogram_bins),
            artifact_weights: self.weights.unwrap_or(defaults.artifact_weights),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            include_maps: self.include_maps.unwrap_or(defaults.include_maps),
            thresholds: self.thresholds.unwrap_or(defaults.thresholds),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::builder().build().unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.histogram_bins, 256);
        assert_eq!(config.ssim.window, 11);
        assert_eq!(config.noise.window, 3);
        assert!(config.parallel);
        assert!(!config.include_maps);
        assert!((config.thresholds.min_psnr - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_artifact_config_follows_top_level() {
        let ssim = SsimConfig {
            window: 7,
            ..SsimConfig::default()
        };
        let config = AnalysisConfig::builder()
            .ssim(ssim)
            .histogram_bins(64)
            .parallel(false)
            .build()
            .unwrap();
        let artifact = config.artifact_config();
        assert_eq!(artifact.ssim.window, 7);
        assert_eq!(artifact.histogram_bins, 64);
        assert_eq!(artifact.weights, ArtifactWeights::default());
        assert!(!config.parallel);
    }

    #[test]
    fn test_json_artifact_config_follows_top_level() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "ssim": {{ "window": 7 }}, "histogram_bins": 64, "artifact_weights": {{ "blocking": 0.0 }} }}"#
        )
        .unwrap();
        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        let artifact = config.artifact_config();
        assert_eq!(artifact.ssim.window, 7);
        assert_eq!(artifact.histogram_bins, 64);
        assert_eq!(artifact.weights.blocking, 0.0);
        assert!((artifact.weights.edge - 0.30).abs() < f64::EPSILON);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{ "artifact_weights": {{ "edge": -1.0 }} }}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(bad.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(AnalysisConfig::builder().histogram_bins(0).build().is_err());
        assert!(
            AnalysisConfig::builder()
                .noise(NoiseConfig::with_window(4))
                .build()
                .is_err()
        );
        let weights = ArtifactWeights {
            edge: f64::NAN,
            ..ArtifactWeights::default()
        };
        assert!(AnalysisConfig::builder().artifact_weights(weights).build().is_err());
    }

    #[test]
    fn test_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "ssim": {{ "window": 7 }}, "parallel": false, "thresholds": {{ "min_psnr": 35.0 }} }}"#
        )
        .unwrap();
        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.ssim.window, 7);
        assert!((config.ssim.sigma - 1.5).abs() < f64::EPSILON);
        assert!(!config.parallel);
        assert!((config.thresholds.min_psnr - 35.0).abs() < f64::EPSILON);
        assert!((config.thresholds.min_ssim - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.histogram_bins, 256);
    }

    #[test]
    fn test_invalid_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "noise": {{ "window": 2 }} }}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::from_json_file(file.path()),
            Err(Error::Config(_))
        ));
        assert!(AnalysisConfig::from_json_file("/nonexistent/config.json").is_err());
    }
}
