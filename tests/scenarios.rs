//! End-to-end comparison scenarios.

use image_eval::analysis::edges::sobel;
use image_eval::analysis::noise::{NoiseConfig, estimate_noise};
use image_eval::edit::{EditPipeline, Transform};
use image_eval::{
    AnalysisConfig, ErrorKind, MetricKind, MetricStatus, PixelBuffer, Precision, QualityLevel,
    analyze,
};

fn gray_field(size: usize) -> PixelBuffer {
    PixelBuffer::uniform(size, size, 3, Precision::U8, 128.0).unwrap()
}

fn textured(width: usize, height: usize) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, 3, Precision::U8, |x, y, c| {
        ((x * 7 + y * 13 + c * 31) % 160) as f32 + 40.0
    })
    .unwrap()
}

#[test]
fn single_red_pixel_on_gray() {
    let reference = gray_field(100);
    let candidate = reference.with_pixel(50, 50, &[255.0, 0.0, 0.0]).unwrap();

    let report = analyze(&reference, &candidate, &AnalysisConfig::default()).unwrap();

    let psnr = report.value(MetricKind::Psnr).unwrap();
    assert!(psnr > 30.0, "psnr {psnr}");

    let ssim = report.value(MetricKind::Ssim).unwrap();
    assert!(ssim > 0.9 && ssim < 1.0, "ssim {ssim}");
    assert_eq!(report.quality_level(), Some(QualityLevel::Imperceptible));

    let distance = report.value(MetricKind::HistogramDistance).unwrap();
    assert!(distance > 0.0 && distance < 0.01, "distance {distance}");

    let score = report.value(MetricKind::ArtifactScore).unwrap();
    assert!(score < 0.1, "artifact score {score}");
    assert!(!report.artifacts.low_confidence);

    // The gradient spike sits on the changed pixel's neighbours only.
    let edges = sobel(&candidate).unwrap();
    let (px, py, peak) = edges.peak();
    assert!(peak > 0.0);
    assert!(px.abs_diff(50) <= 1 && py.abs_diff(50) <= 1, "peak at ({px}, {py})");
    assert_eq!(edges.get(10, 10), Some(0.0));
    assert_eq!(edges.get(53, 50), Some(0.0));
}

#[test]
fn mismatched_sizes_fail_with_shape_error() {
    let err = analyze(&gray_field(100), &gray_field(50), &AnalysisConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn mismatched_channels_fail_with_shape_error() {
    let rgb = gray_field(20);
    let gray = PixelBuffer::uniform(20, 20, 1, Precision::U8, 128.0).unwrap();
    assert!(analyze(&rgb, &gray, &AnalysisConfig::default()).unwrap_err().is_shape_error());
}

#[test]
fn tiny_buffers_degrade_gracefully() {
    let reference = textured(4, 4);
    let candidate = reference.with_pixel(1, 1, &[0.0, 0.0, 0.0]).unwrap();
    let config = AnalysisConfig::builder()
        .noise(NoiseConfig::with_window(5))
        .build()
        .unwrap();

    let report = analyze(&reference, &candidate, &config).unwrap();

    for kind in [MetricKind::Ssim, MetricKind::NoiseLevel, MetricKind::NoiseDelta] {
        let result = report.metric(kind).unwrap();
        assert!(
            matches!(result.status, MetricStatus::Unavailable(_)),
            "{kind} should be unavailable"
        );
    }
    for kind in [
        MetricKind::Psnr,
        MetricKind::Mse,
        MetricKind::HistogramDistance,
        MetricKind::SharpnessDelta,
        MetricKind::ArtifactScore,
    ] {
        assert!(report.metric(kind).unwrap().is_valid(), "{kind} should be valid");
    }
    assert!(report.artifacts.low_confidence);
    assert!(!report.artifacts.notes.is_empty());
    assert_eq!(report.quality_level(), None);
}

#[test]
fn identical_inputs() {
    let img = textured(40, 30);
    let report = analyze(&img, &img, &AnalysisConfig::default()).unwrap();

    assert_eq!(report.metric(MetricKind::Psnr).unwrap().status, MetricStatus::PerfectMatch);
    assert!((report.value(MetricKind::Ssim).unwrap() - 1.0).abs() < 1e-6);
    assert_eq!(report.value(MetricKind::HistogramDistance), Some(0.0));
    assert_eq!(report.value(MetricKind::Mse), Some(0.0));
    assert!(report.value(MetricKind::ArtifactScore).unwrap().abs() < 1e-9);
}

#[test]
fn uniform_buffer_has_no_edges_or_noise() {
    let img = gray_field(32);
    let edges = sobel(&img).unwrap();
    assert!(edges.values().iter().all(|&v| v == 0.0));
    assert_eq!(estimate_noise(&img, &NoiseConfig::default()).unwrap().level, 0.0);
}

#[test]
fn noise_window_larger_than_buffer() {
    let img = PixelBuffer::uniform(2, 2, 1, Precision::U8, 10.0).unwrap();
    let err = estimate_noise(&img, &NoiseConfig::with_window(5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
}

#[test]
fn blur_lowers_sharpness() {
    let reference = textured(64, 64);
    let candidate = EditPipeline::new()
        .with(Transform::Blur { radius: 2.0 })
        .apply(&reference)
        .unwrap();

    let report = analyze(&reference, &candidate, &AnalysisConfig::default()).unwrap();
    assert!(report.value(MetricKind::SharpnessDelta).unwrap() < 0.0);
    assert!(report.value(MetricKind::Ssim).unwrap() < 1.0);
}
