//! Single-purpose analyzers over [`PixelBuffer`](crate::PixelBuffer)s.
//!
//! - [`edges`]: Sobel gradient maps, edge density, sharpness
//! - [`noise`]: residual-based noise estimation and variance heat maps
//! - [`histogram`]: per-channel histograms, distance, tone statistics
//! - [`artifacts`]: weighted artifact score, blockiness and oversmoothing
//!
//! Every function here is pure: inputs are borrowed and never modified.

pub mod artifacts;
pub mod edges;
pub mod histogram;
pub mod noise;

pub use artifacts::{
    ArtifactAssessment, ArtifactComponents, ArtifactConfig, ArtifactInputs, ArtifactWeights,
    assess, blockiness, detect_artifacts, detect_oversmoothing, oversmoothing,
};
pub use edges::{EdgeComparison, GradientMap, compare_edges, laplacian_variance, sobel};
pub use histogram::{Histogram, HistogramComparison, ToneStats, compare_histograms, histogram_distance};
pub use noise::{
    NoiseConfig, NoiseEstimate, SmoothingFilter, estimate_gaussian_sigma, estimate_noise,
    noise_difference_map,
};
