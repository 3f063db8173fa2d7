//! Quality metrics for image comparison.
//!
//! This module provides full-reference quality metrics for comparing a
//! reference buffer with a candidate buffer:
//!
//! - **MSE**: mean squared error over all samples (lower is better)
//! - **PSNR**: Peak Signal-to-Noise Ratio (higher is better)
//! - **SSIM**: Structural Similarity, see [`ssim`] (higher is better, 1 = identical)
//!
//! [`calculate_snr`] is the one single-image measure here: mean over standard
//! deviation of the colour samples, in dB.
//!
//! Every metric that ends up in a report is stored as a [`MetricResult`],
//! whose [`MetricStatus`] tells apart a computed value, a perfect match
//! (PSNR of identical inputs) and a metric that could not be computed.
//!
//! ## Quality Levels
//!
//! | Level | SSIM | Description |
//! |-------|------|-------------|
//! | Imperceptible | >= 0.99 | Visually identical |
//! | Marginal | >= 0.97 | Only A/B comparison reveals |
//! | Subtle | >= 0.93 | Barely noticeable |
//! | Noticeable | >= 0.85 | Visible on inspection |
//! | Degraded | < 0.85 | Clearly visible artifacts |

pub mod ssim;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::Result;
use crate::stats::Moments;

/// Identifies a metric in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Peak signal-to-noise ratio in dB.
    Psnr,
    /// Global SSIM.
    Ssim,
    /// Noise level of the candidate, native scale.
    NoiseLevel,
    /// Symmetric chi-squared histogram distance.
    HistogramDistance,
    /// Combined artifact score in `[0, 1]`.
    ArtifactScore,
    /// Mean squared error, native scale.
    Mse,
    /// Candidate noise level minus reference noise level.
    NoiseDelta,
    /// Correlation of the two gradient maps.
    EdgePreservation,
    /// Candidate Laplacian variance minus reference Laplacian variance.
    SharpnessDelta,
    /// Blockiness of the candidate.
    Blockiness,
    /// Signal-to-noise ratio of the candidate in dB.
    Snr,
    /// Share of the reference's Laplacian variance lost by the candidate.
    Oversmoothing,
}

impl MetricKind {
    /// All kinds, in report order.
    pub const ALL: [MetricKind; 12] = [
        Self::Psnr,
        Self::Ssim,
        Self::NoiseLevel,
        Self::HistogramDistance,
        Self::ArtifactScore,
        Self::Mse,
        Self::NoiseDelta,
        Self::EdgePreservation,
        Self::SharpnessDelta,
        Self::Blockiness,
        Self::Snr,
        Self::Oversmoothing,
    ];

    /// Machine-readable name, as used in JSON and CSV output.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Psnr => "psnr",
            Self::Ssim => "ssim",
            Self::NoiseLevel => "noise_level",
            Self::HistogramDistance => "histogram_distance",
            Self::ArtifactScore => "artifact_score",
            Self::Mse => "mse",
            Self::NoiseDelta => "noise_delta",
            Self::EdgePreservation => "edge_preservation",
            Self::SharpnessDelta => "sharpness_delta",
            Self::Blockiness => "blockiness",
            Self::Snr => "snr",
            Self::Oversmoothing => "oversmoothing",
        }
    }

    /// Whether larger values mean a better candidate.
    ///
    /// Deltas have no preferred direction and report `None`.
    #[must_use]
    pub fn higher_is_better(self) -> Option<bool> {
        match self {
            Self::Psnr | Self::Ssim | Self::EdgePreservation | Self::Snr => Some(true),
            Self::NoiseLevel
            | Self::HistogramDistance
            | Self::ArtifactScore
            | Self::Mse
            | Self::Blockiness
            | Self::Oversmoothing => Some(false),
            Self::NoiseDelta | Self::SharpnessDelta => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a metric value could be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum MetricStatus {
    /// The value was computed.
    Valid,
    /// The inputs are identical, so the metric has no finite value (PSNR).
    PerfectMatch,
    /// The metric could not be computed.
    Unavailable(String),
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::PerfectMatch => write!(f, "perfect_match"),
            Self::Unavailable(reason) => write!(f, "unavailable: {reason}"),
        }
    }
}

/// One metric of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Which metric this is.
    pub kind: MetricKind,
    /// The value. 0.0 unless [`Self::is_valid`].
    pub value: f64,
    /// Whether the value was computed.
    pub status: MetricStatus,
}

impl MetricResult {
    /// A computed value.
    #[must_use]
    pub fn valid(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            status: MetricStatus::Valid,
        }
    }

    /// The inputs are identical.
    #[must_use]
    pub fn perfect_match(kind: MetricKind) -> Self {
        Self {
            kind,
            value: 0.0,
            status: MetricStatus::PerfectMatch,
        }
    }

    /// The metric could not be computed.
    #[must_use]
    pub fn unavailable(kind: MetricKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            value: 0.0,
            status: MetricStatus::Unavailable(reason.into()),
        }
    }

    /// Whether `value` holds a computed number.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == MetricStatus::Valid
    }

    /// The value, if valid.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.is_valid().then_some(self.value)
    }
}

/// Perceptual quality level based on SSIM thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLevel {
    /// SSIM >= 0.99 - Visually identical.
    Imperceptible,
    /// SSIM >= 0.97 - Only A/B comparison reveals difference.
    Marginal,
    /// SSIM >= 0.93 - Barely noticeable.
    Subtle,
    /// SSIM >= 0.85 - Visible on inspection.
    Noticeable,
    /// SSIM < 0.85 - Clearly visible artifacts.
    Degraded,
}

impl QualityLevel {
    /// Determine quality level from an SSIM value.
    #[must_use]
    pub fn from_ssim(ssim: f64) -> Self {
        if ssim >= 0.99 {
            Self::Imperceptible
        } else if ssim >= 0.97 {
            Self::Marginal
        } else if ssim >= 0.93 {
            Self::Subtle
        } else if ssim >= 0.85 {
            Self::Noticeable
        } else {
            Self::Degraded
        }
    }

    /// Get the minimum SSIM value for this level.
    #[must_use]
    pub fn min_ssim(self) -> f64 {
        match self {
            Self::Imperceptible => 0.99,
            Self::Marginal => 0.97,
            Self::Subtle => 0.93,
            Self::Noticeable => 0.85,
            Self::Degraded => f64::NEG_INFINITY,
        }
    }

    /// Get a short code for this level.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Imperceptible => "IMP",
            Self::Marginal => "MAR",
            Self::Subtle => "SUB",
            Self::Noticeable => "NOT",
            Self::Degraded => "DEG",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imperceptible => write!(f, "Imperceptible"),
            Self::Marginal => write!(f, "Marginal"),
            Self::Subtle => write!(f, "Subtle"),
            Self::Noticeable => write!(f, "Noticeable"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

/// Mean squared error over every sample, alpha included, in native scale.
///
/// Fails with a shape error when shape or precision differ.
pub fn calculate_mse(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    reference.ensure_same_shape(candidate)?;
    let sum: f64 = reference
        .samples()
        .iter()
        .zip(candidate.samples())
        .map(|(&r, &c)| {
            let diff = f64::from(r) - f64::from(c);
            diff * diff
        })
        .sum();
    Ok(sum / reference.len() as f64)
}

/// Calculate PSNR between two buffers.
///
/// `PSNR = 10 * log10(MAX^2 / MSE)` with `MAX` = 255 for `U8` and 1.0 for
/// `F32`. Identical buffers yield [`MetricStatus::PerfectMatch`] rather than
/// an infinite value.
pub fn calculate_psnr(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<MetricResult> {
    let mse = calculate_mse(reference, candidate)?;
    if mse == 0.0 {
        return Ok(MetricResult::perfect_match(MetricKind::Psnr));
    }
    let max = f64::from(reference.max_value());
    Ok(MetricResult::valid(
        MetricKind::Psnr,
        10.0 * (max * max / mse).log10(),
    ))
}

/// Signal-to-noise ratio of one buffer: `20 * log10(mean / std_dev)` over
/// the colour samples (alpha excluded).
///
/// `None` when the buffer has no variation (the ratio is infinite) or its
/// mean is zero.
#[must_use]
pub fn calculate_snr(buffer: &PixelBuffer) -> Option<f64> {
    let colors = buffer.layout().color_count();
    let moments: Moments = buffer
        .pixels()
        .flat_map(|px| px[..colors].iter().copied())
        .collect();
    let (mean, std_dev) = (moments.mean(), moments.std_dev());
    (std_dev > 0.0 && mean > 0.0).then(|| 20.0 * (mean / std_dev).log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Precision;

    #[test]
    fn test_quality_level_thresholds() {
        assert_eq!(QualityLevel::from_ssim(1.0), QualityLevel::Imperceptible);
        assert_eq!(QualityLevel::from_ssim(0.99), QualityLevel::Imperceptible);
        assert_eq!(QualityLevel::from_ssim(0.985), QualityLevel::Marginal);
        assert_eq!(QualityLevel::from_ssim(0.95), QualityLevel::Subtle);
        assert_eq!(QualityLevel::from_ssim(0.9), QualityLevel::Noticeable);
        assert_eq!(QualityLevel::from_ssim(0.5), QualityLevel::Degraded);
        assert_eq!(QualityLevel::Subtle.code(), "SUB");
        assert_eq!(QualityLevel::Degraded.to_string(), "Degraded");
    }

    #[test]
    fn test_psnr_identical() {
        let data = PixelBuffer::uniform(100, 100, 3, Precision::U8, 128.0).unwrap();
        let psnr = calculate_psnr(&data, &data).unwrap();
        assert_eq!(psnr.status, MetricStatus::PerfectMatch);
        assert!(!psnr.is_valid());
        assert_eq!(psnr.value(), None);
        assert_eq!(psnr.value, 0.0);
    }

    #[test]
    fn test_psnr_different() {
        let reference = PixelBuffer::uniform(100, 100, 3, Precision::U8, 100.0).unwrap();
        let test = PixelBuffer::uniform(100, 100, 3, Precision::U8, 110.0).unwrap();
        let psnr = calculate_psnr(&reference, &test).unwrap().value().unwrap();
        // 10 * log10(255^2 / 100) ~= 28.13
        assert!(psnr > 28.0);
        assert!(psnr < 29.0);
    }

    #[test]
    fn test_psnr_f32_uses_unit_peak() {
        let reference = PixelBuffer::uniform(10, 10, 1, Precision::F32, 0.5).unwrap();
        let test = PixelBuffer::uniform(10, 10, 1, Precision::F32, 0.6).unwrap();
        let psnr = calculate_psnr(&reference, &test).unwrap().value().unwrap();
        assert!((psnr - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_mse() {
        let a = PixelBuffer::from_u8(vec![0, 0, 0, 0], 2, 2, 1).unwrap();
        let b = PixelBuffer::from_u8(vec![2, 0, 0, 0], 2, 2, 1).unwrap();
        assert!((calculate_mse(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_and_precision_mismatch() {
        let a = PixelBuffer::uniform(10, 10, 3, Precision::U8, 1.0).unwrap();
        let b = PixelBuffer::uniform(10, 9, 3, Precision::U8, 1.0).unwrap();
        let c = PixelBuffer::uniform(10, 10, 1, Precision::U8, 1.0).unwrap();
        let d = PixelBuffer::uniform(10, 10, 3, Precision::F32, 0.0).unwrap();
        for other in [&b, &c, &d] {
            assert!(calculate_psnr(&a, other).unwrap_err().is_shape_error());
            assert!(calculate_mse(&a, other).unwrap_err().is_shape_error());
        }
    }

    #[test]
    fn test_snr() {
        let flat = PixelBuffer::uniform(8, 8, 3, Precision::U8, 90.0).unwrap();
        assert_eq!(calculate_snr(&flat), None);
        let black = PixelBuffer::uniform(8, 8, 1, Precision::U8, 0.0).unwrap();
        assert_eq!(calculate_snr(&black), None);

        // Half 50, half 150: mean 100, std 50, 20 * log10(2).
        let stripes = PixelBuffer::from_fn(8, 8, 1, Precision::U8, |x, _, _| {
            if x < 4 { 50.0 } else { 150.0 }
        })
        .unwrap();
        let snr = calculate_snr(&stripes).unwrap();
        assert!((snr - 20.0 * 2.0_f64.log10()).abs() < 1e-9, "snr {snr}");
    }

    #[test]
    fn test_snr_ignores_alpha() {
        let buf = PixelBuffer::from_fn(4, 4, 4, Precision::U8, |x, _, c| {
            if c == 3 { (x * 60) as f32 } else { 120.0 }
        })
        .unwrap();
        assert_eq!(calculate_snr(&buf), None);
    }

    #[test]
    fn test_metric_kind_names() {
        assert_eq!(MetricKind::HistogramDistance.name(), "histogram_distance");
        assert_eq!(MetricKind::Psnr.higher_is_better(), Some(true));
        assert_eq!(MetricKind::ArtifactScore.higher_is_better(), Some(false));
        assert_eq!(MetricKind::NoiseDelta.higher_is_better(), None);
        let json = serde_json::to_string(&MetricKind::ArtifactScore).unwrap();
        assert_eq!(json, "\"artifact_score\"");
    }

    #[test]
    fn test_metric_result_constructors() {
        let r = MetricResult::valid(MetricKind::Ssim, 0.9);
        assert_eq!(r.value(), Some(0.9));
        let u = MetricResult::unavailable(MetricKind::Ssim, "too small");
        assert!(!u.is_valid());
        assert_eq!(u.status.to_string(), "unavailable: too small");
    }
}
