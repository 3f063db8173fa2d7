//! Descriptive statistics used by the analysis stages.
//!
//! - [`Moments`]: streaming mean/variance accumulator (population statistics,
//!   which is what per-pixel measurements want)
//! - [`Summary`]: descriptive statistics (mean, median, std_dev, percentiles)
//!   used to describe maps such as gradient or SSIM maps
//! - [`mean`], [`pearson`]

use serde::{Deserialize, Serialize};

/// Streaming population mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Moments {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of observations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean, or 0 when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, or 0 when empty.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    /// Population standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl FromIterator<f64> for Moments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut moments = Self::new();
        for v in iter {
            moments.push(v);
        }
        moments
    }
}

impl FromIterator<f32> for Moments {
    fn from_iter<I: IntoIterator<Item = f32>>(iter: I) -> Self {
        iter.into_iter().map(f64::from).collect()
    }
}

/// Descriptive statistics for a set of measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// 5th percentile.
    pub p5: f64,
    /// 95th percentile.
    pub p95: f64,
}

impl Summary {
    /// Compute summary statistics for a slice of values.
    ///
    /// Returns `None` if the slice is empty.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let moments: Moments = sorted.iter().copied().collect();
        let count = sorted.len();

        Some(Self {
            count,
            mean: moments.mean(),
            median: percentile_sorted(&sorted, 0.5),
            std_dev: moments.std_dev(),
            min: sorted[0],
            max: sorted[count - 1],
            p5: percentile_sorted(&sorted, 0.05),
            p95: percentile_sorted(&sorted, 0.95),
        })
    }

    /// Summary of `f32` samples, such as the contents of a map.
    #[must_use]
    pub fn compute_f32(values: &[f32]) -> Option<Self> {
        let widened: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
        Self::compute(&widened)
    }
}

//=============================================================================
// Core Statistical Functions
//=============================================================================

/// Compute arithmetic mean.
///
/// # Example
///
/// ```
/// use image_eval::stats::mean;
///
/// assert!((mean(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 3.0).abs() < 0.001);
/// ```
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson correlation coefficient of two equally long sequences.
///
/// Returns `None` when the lengths differ, the input is empty, or either
/// sequence is constant (zero variance).
#[must_use]
pub fn pearson(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let ma: Moments = a.iter().copied().collect();
    let mb: Moments = b.iter().copied().collect();
    let (sa, sb) = (ma.std_dev(), mb.std_dev());
    if sa == 0.0 || sb == 0.0 {
        return None;
    }
    let cov = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (f64::from(x) - ma.mean()) * (f64::from(y) - mb.mean()))
        .sum::<f64>()
        / a.len() as f64;
    Some((cov / (sa * sb)).clamp(-1.0, 1.0))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let p = p.clamp(0.0, 1.0);
    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}
