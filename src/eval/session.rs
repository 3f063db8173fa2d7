//! Comparison session.
//!
//! [`AnalysisSession::compare`] (or the free function [`analyze`]) runs every
//! analysis stage on a reference/candidate pair and assembles an
//! [`AnalysisReport`].
//!
//! Shapes are checked once up front; a mismatch aborts before any metric is
//! computed. Stages then run in a fixed logical order (edges, noise,
//! histogram, quality, artifacts). With `parallel` enabled the first four run
//! concurrently on the rayon pool; the artifact stage always runs last since
//! it consumes their output. A stage that fails for lack of data is recorded
//! as [`MetricStatus::Unavailable`](crate::metrics::MetricStatus::Unavailable)
//! and the report is still produced.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::analysis::artifacts::{ArtifactInputs, assess, blockiness, oversmoothing};
use crate::analysis::edges::{
    DEFAULT_DIFF_THRESHOLD, EdgeComparison, GradientMap, compare_edges, difference_map,
    laplacian_variance, sobel,
};
use crate::analysis::histogram::{HistogramComparison, compare_histograms};
use crate::analysis::noise::{
    NoiseEstimate, VARIANCE_DIFF_THRESHOLD, estimate_gaussian_sigma, estimate_noise,
    local_variance_map, noise_difference_map, noise_heatmap,
};
use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::eval::config::AnalysisConfig;
use crate::eval::report::{AnalysisReport, EdgeSection, NoiseSection, ReportMaps};
use crate::metrics::ssim::{SsimMap, calculate_ssim};
use crate::metrics::{
    MetricKind, MetricResult, QualityLevel, calculate_mse, calculate_psnr, calculate_snr,
};
use crate::stats::mean;

/// Runs comparisons with a fixed configuration.
///
/// # Example
///
/// ```
/// use image_eval::{AnalysisConfig, AnalysisSession, MetricKind, PixelBuffer, Precision};
///
/// let reference = PixelBuffer::uniform(32, 32, 3, Precision::U8, 128.0)?;
/// let candidate = reference.with_pixel(16, 16, &[255.0, 0.0, 0.0])?;
///
/// let session = AnalysisSession::new(AnalysisConfig::default());
/// let report = session.compare(&reference, &candidate)?;
/// assert!(report.value(MetricKind::Psnr).unwrap() > 30.0);
/// # Ok::<(), image_eval::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    config: AnalysisConfig,
}

impl AnalysisSession {
    /// Create a session.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// The session's configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Compare `candidate` against `reference`.
    pub fn compare(&self, reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<AnalysisReport> {
        analyze(reference, candidate, &self.config)
    }
}

/// Compare `candidate` against `reference` with `config`.
///
/// Fails only with a shape error (dimensions, channels or precision differ)
/// or a configuration error. Metrics that cannot be computed on these inputs
/// are reported as unavailable.
#[instrument(
    level = "debug",
    skip_all,
    fields(reference = %reference.shape(), candidate = %candidate.shape())
)]
pub fn analyze(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    reference.ensure_same_shape(candidate)?;
    config.validate()?;
    let started = Instant::now();

    let (edges, noise, histogram, quality) = if config.parallel {
        let ((edges, noise), (histogram, quality)) = rayon::join(
            || {
                rayon::join(
                    || edge_stage(reference, candidate),
                    || noise_stage(reference, candidate, config),
                )
            },
            || {
                rayon::join(
                    || histogram_stage(reference, candidate, config),
                    || quality_stage(reference, candidate, config),
                )
            },
        );
        (edges?, noise?, histogram?, quality?)
    } else {
        (
            edge_stage(reference, candidate)?,
            noise_stage(reference, candidate, config)?,
            histogram_stage(reference, candidate, config)?,
            quality_stage(reference, candidate, config)?,
        )
    };

    let stage_start = Instant::now();
    let ssim_value = quality.ssim.as_ref().ok().map(SsimMap::mean);
    let artifacts = assess(
        &ArtifactInputs {
            reference_edges: &edges.reference,
            candidate_edges: &edges.candidate,
            histogram_distance: histogram.distance,
            ssim: ssim_value,
            psnr: &quality.psnr,
            reference_blockiness: edges.blockiness_reference,
            candidate_blockiness: edges.blockiness_candidate,
            max_value: reference.max_value(),
        },
        &config.artifact_weights,
    )?;
    debug!(
        stage = "artifacts",
        score = artifacts.score,
        elapsed_ms = stage_start.elapsed().as_secs_f64() * 1000.0
    );

    let mut metrics = BTreeMap::new();
    let mut record = |result: MetricResult| {
        if let crate::metrics::MetricStatus::Unavailable(reason) = &result.status {
            warn!(metric = %result.kind, %reason, "metric unavailable");
        }
        metrics.insert(result.kind, result);
    };

    record(quality.psnr.clone());
    record(MetricResult::valid(MetricKind::Mse, quality.mse));
    record(match &quality.ssim {
        Ok(map) => MetricResult::valid(MetricKind::Ssim, map.mean()),
        Err(e) => MetricResult::unavailable(MetricKind::Ssim, e.to_string()),
    });
    record(match &noise.candidate {
        Ok(estimate) => MetricResult::valid(MetricKind::NoiseLevel, estimate.level),
        Err(e) => MetricResult::unavailable(MetricKind::NoiseLevel, e.to_string()),
    });
    record(match (&noise.reference, &noise.candidate) {
        (Ok(r), Ok(c)) => MetricResult::valid(MetricKind::NoiseDelta, c.level - r.level),
        (Err(e), _) | (_, Err(e)) => MetricResult::unavailable(MetricKind::NoiseDelta, e.to_string()),
    });
    record(MetricResult::valid(MetricKind::HistogramDistance, histogram.distance));
    record(match edges.comparison.preservation {
        Some(r) => MetricResult::valid(MetricKind::EdgePreservation, r),
        None => MetricResult::unavailable(MetricKind::EdgePreservation, "gradient map is flat"),
    });
    record(MetricResult::valid(
        MetricKind::SharpnessDelta,
        edges.sharpness_candidate - edges.sharpness_reference,
    ));
    record(match edges.blockiness_candidate {
        Some(b) => MetricResult::valid(MetricKind::Blockiness, b),
        None => MetricResult::unavailable(MetricKind::Blockiness, "needs at least 16x16 pixels"),
    });
    record(MetricResult::valid(MetricKind::ArtifactScore, artifacts.score));
    record(match noise.snr_candidate {
        Some(snr) => MetricResult::valid(MetricKind::Snr, snr),
        None => MetricResult::unavailable(MetricKind::Snr, "candidate has no variation"),
    });
    record(MetricResult::valid(
        MetricKind::Oversmoothing,
        oversmoothing(edges.sharpness_reference, edges.sharpness_candidate),
    ));

    let maps = if config.include_maps {
        let scale = reference.max_value() / 255.0;
        Some(ReportMaps {
            edge_difference: edges.difference,
            ssim: quality.ssim.as_ref().ok().map(SsimMap::to_rgb),
            noise_reference: noise_heatmap(&noise.variance_reference),
            noise_candidate: noise_heatmap(&noise.variance_candidate),
            noise_difference: noise_difference_map(
                &noise.variance_reference,
                &noise.variance_candidate,
                VARIANCE_DIFF_THRESHOLD * scale * scale,
            )?,
        })
    } else {
        None
    };

    debug!(
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "comparison finished"
    );

    Ok(AnalysisReport {
        reference: reference.shape(),
        candidate: candidate.shape(),
        precision: reference.precision(),
        metrics,
        edges: EdgeSection {
            comparison: edges.comparison,
            sharpness_reference: edges.sharpness_reference,
            sharpness_candidate: edges.sharpness_candidate,
        },
        noise: NoiseSection {
            reference: noise.reference.ok(),
            candidate: noise.candidate.ok(),
            gaussian_sigma_reference: noise.sigma_reference,
            gaussian_sigma_candidate: noise.sigma_candidate,
            mean_local_variance_reference: mean_of(&noise.variance_reference),
            mean_local_variance_candidate: mean_of(&noise.variance_candidate),
            snr_reference: noise.snr_reference,
            snr_candidate: noise.snr_candidate,
        },
        histogram,
        artifacts,
        quality_level: ssim_value.map(QualityLevel::from_ssim),
        timestamp: chrono::Utc::now(),
        maps,
    })
}

//=============================================================================
// Stages
//=============================================================================

struct EdgeStage {
    reference: GradientMap,
    candidate: GradientMap,
    comparison: EdgeComparison,
    difference: imgref::ImgVec<rgb::RGB8>,
    sharpness_reference: f64,
    sharpness_candidate: f64,
    blockiness_reference: Option<f64>,
    blockiness_candidate: Option<f64>,
}

struct NoiseStage {
    reference: Result<NoiseEstimate>,
    candidate: Result<NoiseEstimate>,
    sigma_reference: Option<f64>,
    sigma_candidate: Option<f64>,
    variance_reference: imgref::ImgVec<f32>,
    variance_candidate: imgref::ImgVec<f32>,
    snr_reference: Option<f64>,
    snr_candidate: Option<f64>,
}

struct QualityStage {
    mse: f64,
    psnr: MetricResult,
    ssim: Result<SsimMap>,
}

fn edge_stage(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<EdgeStage> {
    let start = Instant::now();
    let r = sobel(reference)?;
    let c = sobel(candidate)?;
    let comparison = compare_edges(&r, &c)?;
    let difference = difference_map(&r, &c, DEFAULT_DIFF_THRESHOLD)?;
    let stage = EdgeStage {
        comparison,
        difference,
        sharpness_reference: laplacian_variance(reference)?,
        sharpness_candidate: laplacian_variance(candidate)?,
        blockiness_reference: blockiness(reference),
        blockiness_candidate: blockiness(candidate),
        reference: r,
        candidate: c,
    };
    debug!(
        stage = "edges",
        density_delta = stage.comparison.density_delta,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(stage)
}

fn noise_stage(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &AnalysisConfig,
) -> Result<NoiseStage> {
    let start = Instant::now();
    let stage = NoiseStage {
        reference: recoverable(estimate_noise(reference, &config.noise))?,
        candidate: recoverable(estimate_noise(candidate, &config.noise))?,
        sigma_reference: estimate_gaussian_sigma(reference).ok(),
        sigma_candidate: estimate_gaussian_sigma(candidate).ok(),
        variance_reference: local_variance_map(reference),
        variance_candidate: local_variance_map(candidate),
        snr_reference: calculate_snr(reference),
        snr_candidate: calculate_snr(candidate),
    };
    debug!(
        stage = "noise",
        available = stage.candidate.is_ok(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(stage)
}

fn histogram_stage(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &AnalysisConfig,
) -> Result<HistogramComparison> {
    let start = Instant::now();
    let comparison = compare_histograms(reference, candidate, config.histogram_bins)?;
    debug!(
        stage = "histogram",
        distance = comparison.distance,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(comparison)
}

fn quality_stage(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &AnalysisConfig,
) -> Result<QualityStage> {
    let start = Instant::now();
    let stage = QualityStage {
        mse: calculate_mse(reference, candidate)?,
        psnr: calculate_psnr(reference, candidate)?,
        ssim: recoverable(calculate_ssim(reference, candidate, &config.ssim))?,
    };
    debug!(
        stage = "quality",
        ssim = stage.ssim.as_ref().ok().map(SsimMap::mean),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(stage)
}

/// Lift a per-metric result so that only shape errors abort the comparison.
fn recoverable<T>(result: Result<T>) -> Result<Result<T>> {
    match result {
        Err(e) if e.is_shape_error() || matches!(e, Error::Config(_)) => Err(e),
        other => Ok(other),
    }
}

fn mean_of(map: &imgref::ImgVec<f32>) -> f64 {
    let values: Vec<f64> = map.buf().iter().map(|&v| f64::from(v)).collect();
    mean(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::noise::NoiseConfig;
    use crate::buffer::Precision;
    use crate::metrics::MetricStatus;

    fn textured(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, 3, Precision::U8, |x, y, c| {
            ((x * 11 + y * 7 + c * 50) % 160) as f32 + 40.0
        })
        .unwrap()
    }

    #[test]
    fn test_identical_pair() {
        let img = textured(40, 40);
        let report = analyze(&img, &img, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.metric(MetricKind::Psnr).unwrap().status, MetricStatus::PerfectMatch);
        assert!((report.value(MetricKind::Ssim).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(report.value(MetricKind::HistogramDistance), Some(0.0));
        assert_eq!(report.value(MetricKind::ArtifactScore), Some(0.0));
        assert_eq!(report.value(MetricKind::NoiseDelta), Some(0.0));
        assert_eq!(report.quality_level(), Some(QualityLevel::Imperceptible));
        assert_eq!(report.metrics.len(), MetricKind::ALL.len());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = textured(48, 40);
        let b = a.with_pixel(20, 20, &[0.0, 255.0, 0.0]).unwrap();
        let par = analyze(&a, &b, &AnalysisConfig::default()).unwrap();
        let config = AnalysisConfig::builder().parallel(false).build().unwrap();
        let seq = analyze(&a, &b, &config).unwrap();
        assert_eq!(par.metrics, seq.metrics);
    }

    #[test]
    fn test_shape_mismatch_aborts() {
        let err = analyze(&textured(20, 20), &textured(20, 21), &AnalysisConfig::default())
            .unwrap_err();
        assert!(err.is_shape_error());
        let gray = PixelBuffer::uniform(20, 20, 1, Precision::U8, 9.0).unwrap();
        assert!(analyze(&textured(20, 20), &gray, &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_small_input_marks_unavailable() {
        let a = textured(8, 8);
        let b = a.with_pixel(1, 1, &[0.0, 0.0, 0.0]).unwrap();
        let config = AnalysisConfig::builder()
            .noise(NoiseConfig::with_window(9))
            .build()
            .unwrap();
        let report = analyze(&a, &b, &config).unwrap();
        assert!(!report.metric(MetricKind::Ssim).unwrap().is_valid());
        assert!(!report.metric(MetricKind::NoiseLevel).unwrap().is_valid());
        assert!(!report.metric(MetricKind::NoiseDelta).unwrap().is_valid());
        assert!(!report.metric(MetricKind::Blockiness).unwrap().is_valid());
        assert!(report.value(MetricKind::Psnr).is_some());
        assert!(report.value(MetricKind::ArtifactScore).is_some());
        assert!(report.artifacts.low_confidence);
        assert!(report.quality_level().is_none());
        assert!(report.noise.candidate.is_none());
    }

    #[test]
    fn test_maps_only_on_request() {
        let a = textured(30, 30);
        let b = a.with_pixel(5, 5, &[255.0, 255.0, 255.0]).unwrap();
        let without = analyze(&a, &b, &AnalysisConfig::default()).unwrap();
        assert!(without.maps.is_none());

        let session = AnalysisSession::new(AnalysisConfig::builder().include_maps(true).build().unwrap());
        let report = session.compare(&a, &b).unwrap();
        let maps = report.maps.unwrap();
        assert_eq!(maps.edge_difference.width(), 30);
        assert_eq!(maps.ssim.unwrap().width(), 20);
        assert_eq!(maps.noise_candidate.height(), 30);
        assert_eq!(maps.noise_difference.width(), 30);
        // The white pixel raises local variance around (5, 5) only.
        assert_eq!(maps.noise_difference.buf()[5 * 30 + 5], rgb::RGB8::new(0, 255, 0));
        assert_eq!(maps.noise_difference.buf()[25 * 30 + 25], rgb::RGB8::new(0, 0, 0));
    }

    #[test]
    fn test_snr_and_oversmoothing_recorded() {
        let a = textured(32, 32);
        let blurred = crate::edit::apply(&a, &crate::edit::Transform::Blur { radius: 2.0 }).unwrap();
        let report = analyze(&a, &blurred, &AnalysisConfig::default()).unwrap();
        let smoothing = report.value(MetricKind::Oversmoothing).unwrap();
        assert!(smoothing > 0.0 && smoothing <= 1.0, "oversmoothing {smoothing}");
        assert!(report.value(MetricKind::Snr).is_some());
        assert!(report.noise.snr_reference.is_some());

        let flat = PixelBuffer::uniform(32, 32, 3, Precision::U8, 80.0).unwrap();
        let report = analyze(&flat, &flat, &AnalysisConfig::default()).unwrap();
        assert!(!report.metric(MetricKind::Snr).unwrap().is_valid());
        assert_eq!(report.value(MetricKind::Oversmoothing), Some(0.0));
    }

    #[test]
    fn test_recoverable_passes_shape_errors() {
        let insufficient: Result<()> = Err(Error::InsufficientData {
            operation: "x",
            required: 3,
            width: 1,
            height: 1,
        });
        assert!(recoverable(insufficient).unwrap().is_err());
        let shape: Result<()> = Err(Error::InvalidShape("bad".into()));
        assert!(recoverable(shape).is_err());
    }
}
