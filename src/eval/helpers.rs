//! Lightweight helpers for common comparison tasks.
//!
//! These helpers provide simple APIs for common use cases:
//! - Compare two buffers with the default configuration
//! - Assert quality thresholds in CI tests
//!
//! # Example
//!
//! ```
//! use image_eval::eval::helpers::{assert_quality, quick_compare};
//! use image_eval::{PixelBuffer, Precision, Thresholds};
//!
//! let reference = PixelBuffer::uniform(64, 64, 3, Precision::U8, 100.0)?;
//! let candidate = reference.with_pixel(3, 3, &[110.0, 100.0, 100.0])?;
//!
//! let report = quick_compare(&reference, &candidate)?;
//! assert_quality(&report, &Thresholds::default())?;
//! # Ok::<(), image_eval::Error>(())
//! ```

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::eval::config::{AnalysisConfig, Thresholds};
use crate::eval::report::AnalysisReport;
use crate::eval::session::analyze;
use crate::metrics::{MetricKind, MetricStatus, QualityLevel};

/// Compare two buffers with the default configuration.
pub fn quick_compare(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<AnalysisReport> {
    analyze(reference, candidate, &AnalysisConfig::default())
}

/// Check a report against pass/fail limits.
///
/// A perfect PSNR match always passes the PSNR limit. Metrics that were
/// unavailable are not checked.
///
/// # Errors
///
/// Returns [`Error::QualityBelowThreshold`] for the first limit that fails,
/// checked in the order PSNR, SSIM, artifact score.
pub fn assert_quality(report: &AnalysisReport, thresholds: &Thresholds) -> Result<()> {
    if let Some(psnr) = report.metric(MetricKind::Psnr) {
        if psnr.status == MetricStatus::Valid && psnr.value < thresholds.min_psnr {
            return Err(Error::QualityBelowThreshold {
                metric: "PSNR".to_string(),
                value: psnr.value,
                threshold: thresholds.min_psnr,
            });
        }
    }

    if let Some(ssim) = report.value(MetricKind::Ssim) {
        if ssim < thresholds.min_ssim {
            return Err(Error::QualityBelowThreshold {
                metric: "SSIM".to_string(),
                value: ssim,
                threshold: thresholds.min_ssim,
            });
        }
    }

    if let Some(score) = report.value(MetricKind::ArtifactScore) {
        if score > thresholds.max_artifact {
            return Err(Error::QualityBelowThreshold {
                metric: "artifact score".to_string(),
                value: score,
                threshold: thresholds.max_artifact,
            });
        }
    }

    Ok(())
}

/// Assert that quality is at the specified level or better.
///
/// # Errors
///
/// Returns [`Error::QualityBelowThreshold`] if SSIM is below the level's
/// minimum, or unavailable.
pub fn assert_quality_level(report: &AnalysisReport, min_level: QualityLevel) -> Result<()> {
    let ssim = report.value(MetricKind::Ssim).unwrap_or(f64::NEG_INFINITY);
    if report.quality_level().is_none_or(|level| level > min_level) {
        return Err(Error::QualityBelowThreshold {
            metric: format!("SSIM ({min_level})"),
            value: ssim,
            threshold: min_level.min_ssim(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Precision;

    fn create_test_image(width: usize, height: usize, offset: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, 3, Precision::U8, |x, y, c| {
            ((x * 3 + y * 5 + c * 40 + offset) % 200) as f32 + 20.0
        })
        .unwrap()
    }

    #[test]
    fn test_assert_quality_pass() {
        let img = create_test_image(64, 64, 0);
        let report = quick_compare(&img, &img).unwrap();
        assert!(assert_quality(&report, &Thresholds::default()).is_ok());
        assert!(assert_quality_level(&report, QualityLevel::Imperceptible).is_ok());
    }

    #[test]
    fn test_assert_quality_fail() {
        let img1 = create_test_image(64, 64, 0);
        let img2 = create_test_image(64, 64, 50);
        let report = quick_compare(&img1, &img2).unwrap();
        let err = assert_quality(&report, &Thresholds::default()).unwrap_err();
        assert!(matches!(err, Error::QualityBelowThreshold { .. }));
        assert!(assert_quality_level(&report, QualityLevel::Imperceptible).is_err());
    }

    #[test]
    fn test_lenient_thresholds() {
        let img1 = create_test_image(64, 64, 0);
        let img2 = create_test_image(64, 64, 50);
        let report = quick_compare(&img1, &img2).unwrap();
        let lenient = Thresholds {
            min_psnr: 0.0,
            min_ssim: -1.0,
            max_artifact: 1.0,
        };
        assert!(assert_quality(&report, &lenient).is_ok());
        assert!(assert_quality_level(&report, QualityLevel::Degraded).is_ok());
    }

    #[test]
    fn test_unavailable_ssim_fails_level() {
        let img = create_test_image(8, 8, 0);
        let report = quick_compare(&img, &img).unwrap();
        assert!(assert_quality(&report, &Thresholds::default()).is_ok());
        assert!(assert_quality_level(&report, QualityLevel::Degraded).is_err());
    }
}
