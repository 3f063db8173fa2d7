//! Combined artifact score.
//!
//! The score is a weighted sum of four components, each in `[0, 1]`:
//!
//! | Component | Definition | Default weight |
//! |-----------|------------|----------------|
//! | edge | `min(1, 20 * mean(max(0, Gc - Gr)))` on normalized gradients | 0.30 |
//! | histogram | histogram distance | 0.20 |
//! | quality | mean of `1 - SSIM` and `clamp((50 - PSNR) / 30, 0, 1)` | 0.30 |
//! | blocking | `min(1, 10 * max(0, blk(c) - blk(r)) / MAX)` | 0.20 |
//!
//! Weights are renormalized to sum to 1, so the score stays in `[0, 1]`.
//! A component that cannot be computed (SSIM or blockiness on a small
//! buffer) contributes 0 and marks the assessment as low confidence.
//!
//! [`oversmoothing`] is reported next to the score but not weighted into it;
//! lost texture already lowers SSIM.

use serde::{Deserialize, Serialize};

use crate::analysis::edges::{GradientMap, laplacian_variance, sobel};
use crate::analysis::histogram::{DEFAULT_BINS, Histogram, histogram_distance};
use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::metrics::ssim::{SsimConfig, calculate_ssim};
use crate::metrics::{MetricResult, MetricStatus, calculate_psnr};

/// Default weight of the edge component.
pub const EDGE_WEIGHT: f64 = 0.30;
/// Default weight of the histogram component.
pub const HISTOGRAM_WEIGHT: f64 = 0.20;
/// Default weight of the quality component.
pub const QUALITY_WEIGHT: f64 = 0.30;
/// Default weight of the blocking component.
pub const BLOCKING_WEIGHT: f64 = 0.20;

/// Gain applied to the mean gradient increase.
pub const EDGE_GAIN: f64 = 20.0;
/// Gain applied to the blockiness increase relative to the sample maximum.
pub const BLOCK_GAIN: f64 = 10.0;
/// PSNR at or above which the PSNR penalty is 0.
pub const PSNR_CEILING: f64 = 50.0;
/// PSNR range over which the penalty grows from 0 to 1.
pub const PSNR_SPAN: f64 = 30.0;

/// Block size probed by [`blockiness`].
pub const BLOCK_SIZE: usize = 8;

/// Relative weights of the artifact components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactWeights {
    /// Weight of the edge component.
    pub edge: f64,
    /// Weight of the histogram component.
    pub histogram: f64,
    /// Weight of the quality component.
    pub quality: f64,
    /// Weight of the blocking component.
    pub blocking: f64,
}

impl Default for ArtifactWeights {
    fn default() -> Self {
        Self {
            edge: EDGE_WEIGHT,
            histogram: HISTOGRAM_WEIGHT,
            quality: QUALITY_WEIGHT,
            blocking: BLOCKING_WEIGHT,
        }
    }
}

impl ArtifactWeights {
    fn as_array(self) -> [f64; 4] {
        [self.edge, self.histogram, self.quality, self.blocking]
    }

    /// Check that every weight is finite and non-negative and that at least
    /// one is positive.
    pub fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!(
                "artifact weights must be finite and non-negative, got {weights:?}"
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Config("artifact weights sum to zero".into()));
        }
        Ok(())
    }

    /// Copy scaled to sum to 1.
    pub fn normalized(&self) -> Result<Self> {
        self.validate()?;
        let sum: f64 = self.as_array().iter().sum();
        Ok(Self {
            edge: self.edge / sum,
            histogram: self.histogram / sum,
            quality: self.quality / sum,
            blocking: self.blocking / sum,
        })
    }
}

/// Parameters of [`detect_artifacts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Component weights.
    pub weights: ArtifactWeights,
    /// SSIM parameters for the quality component.
    pub ssim: SsimConfig,
    /// Histogram bins for the histogram component.
    pub histogram_bins: usize,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            weights: ArtifactWeights::default(),
            ssim: SsimConfig::default(),
            histogram_bins: DEFAULT_BINS,
        }
    }
}

impl ArtifactConfig {
    /// Check weights, SSIM parameters and bin count.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.ssim.validate()?;
        if self.histogram_bins == 0 {
            return Err(Error::Config("histogram_bins must be positive".into()));
        }
        Ok(())
    }
}

/// Component values before weighting. `None` when not computable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtifactComponents {
    /// Edge component.
    pub edge: f64,
    /// Histogram component.
    pub histogram: f64,
    /// Quality component.
    pub quality: Option<f64>,
    /// Blocking component.
    pub blocking: Option<f64>,
}

/// Result of the artifact detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactAssessment {
    /// Weighted score in `[0, 1]`.
    pub score: f64,
    /// Unweighted components.
    pub components: ArtifactComponents,
    /// Normalized weights that produced `score`.
    pub weights: ArtifactWeights,
    /// Set when a component could not be computed.
    pub low_confidence: bool,
    /// Why confidence is low, one entry per missing input.
    pub notes: Vec<String>,
}

//=============================================================================
// Components
//=============================================================================

/// Edge component: amplified mean increase of normalized gradient magnitude.
///
/// Softened edges do not count; new edges (ringing, block borders, noise) do.
pub fn edge_component(reference: &GradientMap, candidate: &GradientMap) -> Result<f64> {
    if reference.width() != candidate.width() || reference.height() != candidate.height() {
        return Err(Error::mismatch(
            format_args!("{}x{}", reference.width(), reference.height()),
            format_args!("{}x{}", candidate.width(), candidate.height()),
        ));
    }
    let r = reference.normalized();
    let c = candidate.normalized();
    let gained: f64 = r
        .buf()
        .iter()
        .zip(c.buf())
        .map(|(&a, &b)| f64::from((b - a).max(0.0)))
        .sum();
    let mean = gained / r.buf().len() as f64;
    Ok((EDGE_GAIN * mean).min(1.0))
}

/// Histogram component: the distance, clamped to `[0, 1]`.
#[must_use]
pub fn histogram_component(distance: f64) -> f64 {
    distance.clamp(0.0, 1.0)
}

/// `1 - SSIM`, clamped to `[0, 1]`.
#[must_use]
pub fn ssim_penalty(ssim: f64) -> f64 {
    (1.0 - ssim).clamp(0.0, 1.0)
}

/// PSNR penalty: 0 at [`PSNR_CEILING`] dB or above, 1 at `PSNR_CEILING -
/// PSNR_SPAN` dB or below. A perfect match has no penalty; an unavailable
/// PSNR yields `None`.
#[must_use]
pub fn psnr_penalty(psnr: &MetricResult) -> Option<f64> {
    match psnr.status {
        MetricStatus::PerfectMatch => Some(0.0),
        MetricStatus::Valid => Some(((PSNR_CEILING - psnr.value) / PSNR_SPAN).clamp(0.0, 1.0)),
        MetricStatus::Unavailable(_) => None,
    }
}

/// Quality component: mean of whichever of the SSIM and PSNR penalties are
/// available.
#[must_use]
pub fn quality_component(ssim: Option<f64>, psnr: &MetricResult) -> Option<f64> {
    let parts: Vec<f64> = ssim.map(ssim_penalty).into_iter().chain(psnr_penalty(psnr)).collect();
    (!parts.is_empty()).then(|| parts.iter().sum::<f64>() / parts.len() as f64)
}

/// Blocking component: amplified blockiness increase relative to the sample
/// maximum. `None` unless both blockiness values are known.
#[must_use]
pub fn blocking_component(
    reference: Option<f64>,
    candidate: Option<f64>,
    max_value: f32,
) -> Option<f64> {
    let (r, c) = (reference?, candidate?);
    Some((BLOCK_GAIN * (c - r).max(0.0) / f64::from(max_value)).min(1.0))
}

/// Blockiness of a buffer's luma: mean absolute difference across 8-pixel
/// block boundaries minus the mean across block interiors, columns and rows
/// summed, floored at 0.
///
/// Boundary pairs are `(7, 8)`, `(15, 16)`, ...; interior pairs are
/// `(3, 4)`, `(11, 12)`, .... Returns `None` below 16x16.
#[must_use]
pub fn blockiness(buffer: &PixelBuffer) -> Option<f64> {
    let (w, h) = (buffer.width(), buffer.height());
    if w < 2 * BLOCK_SIZE || h < 2 * BLOCK_SIZE {
        return None;
    }
    let luma = buffer.to_luma();
    let data = luma.samples();
    let at = |x: usize, y: usize| f64::from(data[y * w + x]);

    let column_mean = |start: usize, limit: usize| {
        let mut sum = 0.0;
        let mut n = 0_usize;
        for x in (start..limit).step_by(BLOCK_SIZE) {
            for y in 0..h {
                sum += (at(x, y) - at(x + 1, y)).abs();
                n += 1;
            }
        }
        sum / n as f64
    };
    let row_mean = |start: usize, limit: usize| {
        let mut sum = 0.0;
        let mut n = 0_usize;
        for y in (start..limit).step_by(BLOCK_SIZE) {
            for x in 0..w {
                sum += (at(x, y) - at(x, y + 1)).abs();
                n += 1;
            }
        }
        sum / n as f64
    };

    let horizontal = column_mean(BLOCK_SIZE - 1, w - 1) - column_mean(3, w - 5);
    let vertical = row_mean(BLOCK_SIZE - 1, h - 1) - row_mean(3, h - 5);
    Some((horizontal + vertical).max(0.0))
}

/// Oversmoothing risk: share of the reference's Laplacian variance that the
/// candidate lost, in `[0, 1]`. 0 when the reference has no texture or the
/// candidate is sharper.
#[must_use]
pub fn oversmoothing(reference_sharpness: f64, candidate_sharpness: f64) -> f64 {
    if reference_sharpness <= 0.0 {
        return 0.0;
    }
    (1.0 - candidate_sharpness / reference_sharpness).clamp(0.0, 1.0)
}

/// [`oversmoothing`] of a pair, computed from their Laplacian variances.
///
/// Fails with a shape error when the buffers differ in shape or precision.
pub fn detect_oversmoothing(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    reference.ensure_same_shape(candidate)?;
    Ok(oversmoothing(
        laplacian_variance(reference)?,
        laplacian_variance(candidate)?,
    ))
}

//=============================================================================
// Assessment
//=============================================================================

/// Already computed pieces of a comparison.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactInputs<'a> {
    /// Gradient map of the reference.
    pub reference_edges: &'a GradientMap,
    /// Gradient map of the candidate.
    pub candidate_edges: &'a GradientMap,
    /// Histogram distance of the pair.
    pub histogram_distance: f64,
    /// Global SSIM, if computable.
    pub ssim: Option<f64>,
    /// PSNR result.
    pub psnr: &'a MetricResult,
    /// Blockiness of the reference, if computable.
    pub reference_blockiness: Option<f64>,
    /// Blockiness of the candidate, if computable.
    pub candidate_blockiness: Option<f64>,
    /// Maximum sample value of the pair's precision.
    pub max_value: f32,
}

/// Combine computed pieces into an assessment.
pub fn assess(inputs: &ArtifactInputs<'_>, weights: &ArtifactWeights) -> Result<ArtifactAssessment> {
    let weights = weights.normalized()?;
    let components = ArtifactComponents {
        edge: edge_component(inputs.reference_edges, inputs.candidate_edges)?,
        histogram: histogram_component(inputs.histogram_distance),
        quality: quality_component(inputs.ssim, inputs.psnr),
        blocking: blocking_component(
            inputs.reference_blockiness,
            inputs.candidate_blockiness,
            inputs.max_value,
        ),
    };

    let mut notes = Vec::new();
    if inputs.ssim.is_none() {
        notes.push("SSIM unavailable; quality component uses PSNR only".to_string());
    }
    if components.quality.is_none() {
        notes.push("quality component unavailable".to_string());
    }
    if components.blocking.is_none() {
        notes.push(format!(
            "blockiness needs at least {0}x{0} pixels",
            2 * BLOCK_SIZE
        ));
    }

    let score = weights.edge * components.edge
        + weights.histogram * components.histogram
        + weights.quality * components.quality.unwrap_or(0.0)
        + weights.blocking * components.blocking.unwrap_or(0.0);

    Ok(ArtifactAssessment {
        score: score.clamp(0.0, 1.0),
        components,
        weights,
        low_confidence: !notes.is_empty(),
        notes,
    })
}

/// Compute every input from scratch and assess the pair.
///
/// Fails with a shape error when the buffers differ in shape or precision,
/// and with a configuration error for unusable weights. Missing SSIM or
/// blockiness lowers confidence instead of failing.
pub fn detect_artifacts(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &ArtifactConfig,
) -> Result<ArtifactAssessment> {
    reference.ensure_same_shape(candidate)?;
    config.validate()?;

    let reference_edges = sobel(reference)?;
    let candidate_edges = sobel(candidate)?;
    let distance = histogram_distance(
        &Histogram::from_buffer(reference, config.histogram_bins)?,
        &Histogram::from_buffer(candidate, config.histogram_bins)?,
    )?;
    let ssim = match calculate_ssim(reference, candidate, &config.ssim) {
        Ok(map) => Some(map.mean()),
        Err(e) if e.is_shape_error() => return Err(e),
        Err(_) => None,
    };
    let psnr = calculate_psnr(reference, candidate)?;

    assess(
        &ArtifactInputs {
            reference_edges: &reference_edges,
            candidate_edges: &candidate_edges,
            histogram_distance: distance,
            ssim,
            psnr: &psnr,
            reference_blockiness: blockiness(reference),
            candidate_blockiness: blockiness(candidate),
            max_value: reference.max_value(),
        },
        &config.weights,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Precision;
    use crate::metrics::MetricKind;

    fn smooth(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, 3, Precision::U8, |x, y, _| {
            (60 + x + y) as f32
        })
        .unwrap()
    }

    /// Flat 8x8 blocks with a different level per block.
    fn blocky(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, 1, Precision::U8, |x, y, _| {
            let block = (x / 8 + y / 8) % 2;
            if block == 0 { 90.0 } else { 140.0 }
        })
        .unwrap()
    }

    #[test]
    fn test_identical_scores_zero() {
        let img = smooth(32, 32);
        let a = detect_artifacts(&img, &img, &ArtifactConfig::default()).unwrap();
        assert_eq!(a.score, 0.0);
        assert!(!a.low_confidence);
        assert!(a.notes.is_empty());
        assert_eq!(a.components.quality, Some(0.0));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ArtifactWeights::default();
        let sum = w.edge + w.histogram + w.quality + w.blocking;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_renormalized() {
        let w = ArtifactWeights {
            edge: 2.0,
            histogram: 0.0,
            quality: 2.0,
            blocking: 0.0,
        };
        let n = w.normalized().unwrap();
        assert!((n.edge - 0.5).abs() < 1e-12);
        assert!((n.quality - 0.5).abs() < 1e-12);

        let zero = ArtifactWeights {
            edge: 0.0,
            histogram: 0.0,
            quality: 0.0,
            blocking: 0.0,
        };
        assert!(matches!(zero.normalized(), Err(Error::Config(_))));
        let negative = ArtifactWeights {
            edge: -1.0,
            ..ArtifactWeights::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_psnr_penalty() {
        let perfect = MetricResult::perfect_match(MetricKind::Psnr);
        assert_eq!(psnr_penalty(&perfect), Some(0.0));
        assert_eq!(psnr_penalty(&MetricResult::valid(MetricKind::Psnr, 60.0)), Some(0.0));
        assert_eq!(psnr_penalty(&MetricResult::valid(MetricKind::Psnr, 35.0)), Some(0.5));
        assert_eq!(psnr_penalty(&MetricResult::valid(MetricKind::Psnr, 10.0)), Some(1.0));
        assert_eq!(psnr_penalty(&MetricResult::unavailable(MetricKind::Psnr, "x")), None);
    }

    #[test]
    fn test_quality_component_uses_available_parts() {
        let psnr = MetricResult::valid(MetricKind::Psnr, 35.0);
        let both = quality_component(Some(0.9), &psnr).unwrap();
        assert!((both - 0.3).abs() < 1e-12);
        assert_eq!(quality_component(None, &psnr), Some(0.5));
        let missing = MetricResult::unavailable(MetricKind::Psnr, "x");
        assert_eq!(quality_component(None, &missing), None);
        assert_eq!(ssim_penalty(1.2), 0.0);
    }

    #[test]
    fn test_blocking_component() {
        assert_eq!(blocking_component(Some(5.0), Some(2.0), 255.0), Some(0.0));
        assert_eq!(blocking_component(Some(0.0), Some(255.0), 255.0), Some(1.0));
        let c = blocking_component(Some(0.0), Some(12.75), 255.0).unwrap();
        assert!((c - 0.5).abs() < 1e-12);
        assert_eq!(blocking_component(None, Some(1.0), 255.0), None);
    }

    #[test]
    fn test_blockiness() {
        assert!(blockiness(&smooth(15, 40)).is_none());
        let flat = PixelBuffer::uniform(32, 32, 1, Precision::U8, 100.0).unwrap();
        assert_eq!(blockiness(&flat), Some(0.0));
        // A linear ramp has the same step everywhere.
        let ramp = blockiness(&smooth(32, 32)).unwrap();
        assert!(ramp.abs() < 1e-6, "ramp blockiness {ramp}");
        let b = blockiness(&blocky(32, 32)).unwrap();
        assert!((b - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversmoothing() {
        assert_eq!(oversmoothing(0.0, 5.0), 0.0);
        assert_eq!(oversmoothing(100.0, 200.0), 0.0);
        assert!((oversmoothing(100.0, 25.0) - 0.75).abs() < 1e-12);
        assert_eq!(oversmoothing(100.0, 0.0), 1.0);

        let textured = blocky(32, 32);
        let flat = PixelBuffer::uniform(32, 32, 1, Precision::U8, 115.0).unwrap();
        assert_eq!(detect_oversmoothing(&textured, &textured).unwrap(), 0.0);
        assert_eq!(detect_oversmoothing(&textured, &flat).unwrap(), 1.0);
        assert_eq!(detect_oversmoothing(&flat, &textured).unwrap(), 0.0);
        let rgb = smooth(32, 32);
        assert!(detect_oversmoothing(&textured, &rgb).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_blocky_candidate_scores_higher() {
        let reference = PixelBuffer::uniform(32, 32, 1, Precision::U8, 115.0).unwrap();
        let a = detect_artifacts(&reference, &blocky(32, 32), &ArtifactConfig::default()).unwrap();
        assert_eq!(a.components.blocking, Some(1.0));
        assert!(a.components.edge > 0.0);
        assert!(a.score > 0.3);
        assert!(a.score <= 1.0);
    }

    #[test]
    fn test_small_buffers_low_confidence() {
        let a = smooth(8, 8);
        let b = a.with_pixel(3, 3, &[0.0, 0.0, 0.0]).unwrap();
        let result = detect_artifacts(&a, &b, &ArtifactConfig::default()).unwrap();
        assert!(result.low_confidence);
        assert_eq!(result.components.blocking, None);
        assert!(result.components.quality.is_some());
        assert_eq!(result.notes.len(), 2);
        assert!((0.0..=1.0).contains(&result.score));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = detect_artifacts(&smooth(20, 20), &smooth(20, 10), &ArtifactConfig::default())
            .unwrap_err();
        assert!(err.is_shape_error());
    }
}
