//! Per-channel intensity histograms and their comparison.
//!
//! Histograms use uniform quantization of the normalized sample range:
//! a sample `v` (scaled to `[0, 1]`) lands in bin `min(floor(v * bins), bins - 1)`.
//!
//! ## Distance
//!
//! [`histogram_distance`] is a symmetric chi-squared distance on raw counts:
//!
//! ```text
//! d_c = sum_i (a_i - b_i)^2 / (a_i + b_i)   (bins with a_i + b_i > 0)
//!       ---------------------------------
//!                  N_a + N_b
//! d   = mean over channels of d_c
//! ```
//!
//! It is 0 exactly when the histograms are bin-wise identical, 1 when their
//! supports are disjoint, and symmetric in its arguments.

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::stats::Moments;

/// Default number of bins per channel.
pub const DEFAULT_BINS: usize = 256;

/// Fixed-bin histogram, one row of counts per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    bins: usize,
    counts: Vec<Vec<u64>>,
}

impl Histogram {
    /// Histogram every channel of `buffer` (alpha included) into `bins` bins.
    pub fn from_buffer(buffer: &PixelBuffer, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(Error::InvalidShape("histogram needs at least one bin".into()));
        }
        let n = buffer.channels();
        let scale = bins as f32 / buffer.max_value();
        let mut counts = vec![vec![0_u64; bins]; n];
        for pixel in buffer.pixels() {
            for (c, &v) in pixel.iter().enumerate() {
                let bin = ((v * scale) as usize).min(bins - 1);
                counts[c][bin] += 1;
            }
        }
        Ok(Self { bins, counts })
    }

    /// Histogram from precomputed counts. Every channel must have the same
    /// non-zero bin count.
    pub fn from_counts(counts: Vec<Vec<u64>>) -> Result<Self> {
        let bins = counts.first().map_or(0, Vec::len);
        if bins == 0 {
            return Err(Error::InvalidShape("histogram needs at least one channel and bin".into()));
        }
        if counts.iter().any(|c| c.len() != bins) {
            return Err(Error::InvalidShape("histogram channels differ in bin count".into()));
        }
        Ok(Self { bins, counts })
    }

    /// Bins per channel.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.counts.len()
    }

    /// Counts of one channel.
    #[must_use]
    pub fn channel(&self, channel: usize) -> Option<&[u64]> {
        self.counts.get(channel).map(Vec::as_slice)
    }

    /// Sum of the counts of one channel (the pixel count of the source).
    #[must_use]
    pub fn total(&self, channel: usize) -> u64 {
        self.counts.get(channel).map_or(0, |c| c.iter().sum())
    }

    /// Moving-average smoothing of every channel, for plotting.
    ///
    /// The window is truncated at both ends.
    #[must_use]
    pub fn smoothed(&self, window: usize) -> Vec<Vec<f64>> {
        let half = window / 2;
        self.counts
            .iter()
            .map(|counts| {
                (0..self.bins)
                    .map(|i| {
                        let start = i.saturating_sub(half);
                        let end = (i + half + 1).min(self.bins);
                        let slice = &counts[start..end];
                        slice.iter().sum::<u64>() as f64 / slice.len() as f64
                    })
                    .collect()
            })
            .collect()
    }

    /// Shannon entropy in bits, averaged over channels.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        let per_channel = self.counts.iter().map(|counts| {
            let total = counts.iter().sum::<u64>() as f64;
            if total == 0.0 {
                return 0.0;
            }
            counts
                .iter()
                .filter(|&&n| n > 0)
                .map(|&n| {
                    let p = n as f64 / total;
                    -p * p.log2()
                })
                .sum::<f64>()
        });
        per_channel.sum::<f64>() / self.channels() as f64
    }

    fn ensure_comparable(&self, other: &Histogram) -> Result<()> {
        if self.bins != other.bins || self.channels() != other.channels() {
            return Err(Error::mismatch(
                format_args!("{} bins x {} channels", self.bins, self.channels()),
                format_args!("{} bins x {} channels", other.bins, other.channels()),
            ));
        }
        Ok(())
    }
}

/// Symmetric chi-squared distance between two histograms, in `[0, 1]`.
///
/// Fails with a shape error when bin or channel counts differ.
pub fn histogram_distance(a: &Histogram, b: &Histogram) -> Result<f64> {
    a.ensure_comparable(b)?;
    let mut sum = 0.0;
    for (ca, cb) in a.counts.iter().zip(&b.counts) {
        let total = (ca.iter().sum::<u64>() + cb.iter().sum::<u64>()) as f64;
        if total == 0.0 {
            continue;
        }
        let chi: f64 = ca
            .iter()
            .zip(cb)
            .filter(|&(&x, &y)| x + y > 0)
            .map(|(&x, &y)| {
                let d = x as f64 - y as f64;
                d * d / (x + y) as f64
            })
            .sum();
        sum += chi / total;
    }
    Ok(sum / a.channels() as f64)
}

/// Percentage of samples that moved between bins:
/// `sum |a - b| / (N * channels) * 100`.
pub fn histogram_shift_percent(a: &Histogram, b: &Histogram) -> Result<f64> {
    a.ensure_comparable(b)?;
    let moved: u64 = a
        .counts
        .iter()
        .zip(&b.counts)
        .flat_map(|(ca, cb)| ca.iter().zip(cb).map(|(&x, &y)| x.abs_diff(y)))
        .sum();
    let pixels = (0..a.channels())
        .map(|c| a.total(c).max(b.total(c)))
        .max()
        .unwrap_or(0);
    if pixels == 0 {
        return Ok(0.0);
    }
    Ok(moved as f64 / (pixels as f64 * a.channels() as f64) * 100.0)
}

/// Brightness and contrast of a buffer's colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneStats {
    /// Mean colour sample (native scale).
    pub brightness: f64,
    /// Standard deviation of colour samples (native scale).
    pub contrast: f64,
}

impl ToneStats {
    /// Measure `buffer`, ignoring alpha.
    #[must_use]
    pub fn from_buffer(buffer: &PixelBuffer) -> Self {
        let colors = buffer.layout().color_count();
        let m: Moments = buffer
            .pixels()
            .flat_map(|p| p[..colors].iter().copied())
            .collect();
        Self {
            brightness: m.mean(),
            contrast: m.std_dev(),
        }
    }
}

/// Histogram comparison of a reference/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramComparison {
    /// [`histogram_distance`] of the two histograms.
    pub distance: f64,
    /// [`histogram_shift_percent`] of the two histograms.
    pub shift_percent: f64,
    /// Candidate brightness minus reference brightness.
    pub brightness_delta: f64,
    /// Candidate contrast minus reference contrast.
    pub contrast_delta: f64,
    /// Candidate entropy minus reference entropy, in bits.
    pub entropy_delta: f64,
    /// Histogram of the reference.
    pub reference: Histogram,
    /// Histogram of the candidate.
    pub candidate: Histogram,
}

/// Build both histograms and compare them.
pub fn compare_histograms(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    bins: usize,
) -> Result<HistogramComparison> {
    reference.ensure_same_shape(candidate)?;
    let hr = Histogram::from_buffer(reference, bins)?;
    let hc = Histogram::from_buffer(candidate, bins)?;
    let tr = ToneStats::from_buffer(reference);
    let tc = ToneStats::from_buffer(candidate);

    Ok(HistogramComparison {
        distance: histogram_distance(&hr, &hc)?,
        shift_percent: histogram_shift_percent(&hr, &hc)?,
        brightness_delta: tc.brightness - tr.brightness,
        contrast_delta: tc.contrast - tr.contrast,
        entropy_delta: hc.entropy() - hr.entropy(),
        reference: hr,
        candidate: hc,
    })
}
