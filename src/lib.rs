//! # image-eval
//!
//! Image comparison and quality analysis library.
//!
//! Two [`PixelBuffer`]s go in, one [`AnalysisReport`] comes out. The report
//! carries PSNR, SSIM, edge preservation and sharpness, noise estimates,
//! histogram distance and tone shifts, and a weighted artifact score. Each
//! metric records whether it was computed, matched perfectly, or could not be
//! computed for this input, so a single small image never sinks a whole
//! comparison.
//!
//! ## Quick Start
//!
//! ```
//! use image_eval::{AnalysisConfig, MetricKind, PixelBuffer, Precision, analyze};
//!
//! let reference = PixelBuffer::uniform(100, 100, 3, Precision::U8, 128.0)?;
//! let candidate = reference.with_pixel(50, 50, &[255.0, 0.0, 0.0])?;
//!
//! let report = analyze(&reference, &candidate, &AnalysisConfig::default())?;
//! println!("{}", report.summary_text());
//! assert!(report.value(MetricKind::Ssim).unwrap() > 0.9);
//! # Ok::<(), image_eval::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`buffer`]: the validated pixel container
//! - [`analysis`]: edges, noise, histograms, artifacts
//! - [`metrics`]: MSE, PSNR, SSIM and metric result types
//! - [`eval`]: comparison session, configuration and reports
//! - [`edit`]: editing transforms for producing candidates
//! - [`stats`]: descriptive statistics used by the analyzers
//! - [`decode`]: image file loading and saving (feature `decode`)
//! - [`error`]: error types

pub mod analysis;
pub mod buffer;
#[cfg(feature = "decode")]
pub mod decode;
pub mod edit;
pub mod error;
pub mod eval;
pub mod metrics;
pub mod stats;

// Re-export commonly used types
pub use analysis::{
    ArtifactAssessment, ArtifactWeights, EdgeComparison, GradientMap, Histogram,
    HistogramComparison, NoiseConfig, NoiseEstimate,
};
pub use buffer::{Channels, PixelBuffer, Precision, Shape};
pub use edit::{EditPipeline, Transform};
pub use error::{Error, ErrorKind, Result};
pub use eval::{
    AnalysisConfig, AnalysisConfigBuilder, AnalysisReport, AnalysisSession, Thresholds, analyze,
};
pub use metrics::ssim::{SsimConfig, SsimMap};
pub use metrics::{MetricKind, MetricResult, MetricStatus, QualityLevel};
pub use stats::Summary;
