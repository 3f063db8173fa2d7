//! Gradient-magnitude edge detection.
//!
//! [`sobel`] produces a [`GradientMap`] using the 3x3 Sobel kernels on a luma
//! version of the input. Borders replicate the edge pixels, so a flat image
//! has an all-zero gradient everywhere including its border.
//!
//! Magnitudes are left in the native sample scale. [`GradientMap::normalized`]
//! divides by the largest magnitude the kernels can produce
//! (`4 * sqrt(2) * max_value`), which keeps maps from different images on the
//! same `[0, 1]` scale.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::stats::{Summary, pearson};

/// Normalized magnitude above which a pixel counts as an edge for
/// [`GradientMap::density`].
pub const DEFAULT_EDGE_THRESHOLD: f32 = 0.1;

/// Change in normalized magnitude (on a 0-255 scale) below which the
/// difference map stays black.
pub const DEFAULT_DIFF_THRESHOLD: f32 = 20.0;

/// Per-pixel gradient magnitudes of a buffer.
#[derive(Debug, Clone)]
pub struct GradientMap {
    map: ImgVec<f32>,
    max_value: f32,
}

impl GradientMap {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.map.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.map.height()
    }

    /// Magnitude at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width() && y < self.height()).then(|| self.map.buf()[y * self.width() + x])
    }

    /// Row-major magnitudes.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        self.map.buf()
    }

    /// Borrow as an image.
    #[must_use]
    pub fn as_img(&self) -> ImgRef<'_, f32> {
        self.map.as_ref()
    }

    /// Maximum sample value of the source buffer.
    #[must_use]
    pub fn source_max_value(&self) -> f32 {
        self.max_value
    }

    /// Largest magnitude the Sobel kernels can produce for the source precision.
    #[must_use]
    pub fn theoretical_max(&self) -> f32 {
        4.0 * std::f32::consts::SQRT_2 * self.max_value
    }

    /// Largest magnitude in the map.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values().iter().copied().fold(0.0, f32::max)
    }

    /// Mean magnitude.
    #[must_use]
    pub fn mean(&self) -> f64 {
        let values = self.values();
        values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
    }

    /// Magnitudes divided by [`Self::theoretical_max`], in `[0, 1]`.
    #[must_use]
    pub fn normalized(&self) -> ImgVec<f32> {
        let scale = 1.0 / self.theoretical_max();
        let buf = self
            .values()
            .iter()
            .map(|&v| (v * scale).min(1.0))
            .collect();
        ImgVec::new(buf, self.width(), self.height())
    }

    /// Fraction of pixels whose normalized magnitude exceeds `threshold`.
    #[must_use]
    pub fn density(&self, threshold: f32) -> f64 {
        let limit = threshold * self.theoretical_max();
        let count = self.values().iter().filter(|&&v| v > limit).count();
        count as f64 / self.values().len() as f64
    }

    /// Descriptive statistics of the raw magnitudes.
    #[must_use]
    pub fn summary(&self) -> Option<Summary> {
        Summary::compute_f32(self.values())
    }

    /// Location and value of the strongest magnitude.
    #[must_use]
    pub fn peak(&self) -> (usize, usize, f32) {
        let (idx, value) = self
            .values()
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0_f32), |best, (i, v)| if v > best.1 { (i, v) } else { best });
        (idx % self.width(), idx / self.width(), value)
    }

    fn ensure_same_dims(&self, other: &GradientMap) -> Result<()> {
        if self.width() != other.width() || self.height() != other.height() {
            return Err(Error::mismatch(
                format_args!("{}x{}", self.width(), self.height()),
                format_args!("{}x{}", other.width(), other.height()),
            ));
        }
        Ok(())
    }
}

/// Sobel gradient magnitude of `buffer`.
///
/// Multi-channel input is converted to luma first.
pub fn sobel(buffer: &PixelBuffer) -> Result<GradientMap> {
    if buffer.is_empty() {
        return Err(Error::InvalidShape("edge detection on a zero-area buffer".into()));
    }
    let luma = buffer.to_luma();
    let (w, h) = (luma.width(), luma.height());
    let p = luma.samples();
    let at = |x: usize, y: usize| p[y * w + x];

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let (ym, yp) = (y.saturating_sub(1), (y + 1).min(h - 1));
        for x in 0..w {
            let (xm, xp) = (x.saturating_sub(1), (x + 1).min(w - 1));
            let gx = (at(xp, ym) + 2.0 * at(xp, y) + at(xp, yp))
                - (at(xm, ym) + 2.0 * at(xm, y) + at(xm, yp));
            let gy = (at(xm, yp) + 2.0 * at(x, yp) + at(xp, yp))
                - (at(xm, ym) + 2.0 * at(x, ym) + at(xp, ym));
            out.push((gx * gx + gy * gy).sqrt());
        }
    }

    Ok(GradientMap {
        map: ImgVec::new(out, w, h),
        max_value: buffer.max_value(),
    })
}

/// Sharpness as the variance of the 4-neighbour Laplacian of the luma.
///
/// Lower values mean a softer image.
pub fn laplacian_variance(buffer: &PixelBuffer) -> Result<f64> {
    if buffer.is_empty() {
        return Err(Error::InvalidShape("sharpness on a zero-area buffer".into()));
    }
    let luma = buffer.to_luma();
    let (w, h) = (luma.width(), luma.height());
    let p = luma.samples();
    let at = |x: usize, y: usize| f64::from(p[y * w + x]);

    let mut moments = crate::stats::Moments::new();
    for y in 0..h {
        for x in 0..w {
            let lap = at(x, y.saturating_sub(1))
                + at(x, (y + 1).min(h - 1))
                + at(x.saturating_sub(1), y)
                + at((x + 1).min(w - 1), y)
                - 4.0 * at(x, y);
            moments.push(lap);
        }
    }
    Ok(moments.variance())
}

/// Edge statistics of a reference/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeComparison {
    /// Edge density of the reference.
    pub density_reference: f64,
    /// Edge density of the candidate.
    pub density_candidate: f64,
    /// `density_candidate - density_reference`.
    pub density_delta: f64,
    /// Correlation of the two magnitude maps. `None` when either is flat.
    pub preservation: Option<f64>,
    /// Mean normalized magnitude gained by the candidate (new edges).
    pub new_edge_energy: f64,
    /// Mean normalized magnitude lost by the candidate (softened edges).
    pub lost_edge_energy: f64,
    /// Pixel with the largest absolute change in magnitude: `(x, y, change)`,
    /// change in normalized units.
    pub peak_change: (usize, usize, f32),
}

/// Compare two gradient maps of the same dimensions.
pub fn compare_edges(reference: &GradientMap, candidate: &GradientMap) -> Result<EdgeComparison> {
    reference.ensure_same_dims(candidate)?;

    let density_reference = reference.density(DEFAULT_EDGE_THRESHOLD);
    let density_candidate = candidate.density(DEFAULT_EDGE_THRESHOLD);

    let r = reference.normalized();
    let c = candidate.normalized();
    let n = r.buf().len() as f64;

    let mut gained = 0.0_f64;
    let mut lost = 0.0_f64;
    let mut peak = (0, 0.0_f32);
    for (i, (&a, &b)) in r.buf().iter().zip(c.buf()).enumerate() {
        let d = b - a;
        if d > 0.0 {
            gained += f64::from(d);
        } else {
            lost -= f64::from(d);
        }
        if d.abs() > peak.1.abs() {
            peak = (i, d);
        }
    }

    let w = reference.width();
    Ok(EdgeComparison {
        density_reference,
        density_candidate,
        density_delta: density_candidate - density_reference,
        preservation: pearson(reference.values(), candidate.values()),
        new_edge_energy: gained / n,
        lost_edge_energy: lost / n,
        peak_change: (peak.0 % w, peak.0 / w, peak.1),
    })
}

/// Visualize edge changes: new edges in green, lost edges in red.
///
/// `threshold` is on a 0-255 scale of normalized magnitude.
pub fn difference_map(
    reference: &GradientMap,
    candidate: &GradientMap,
    threshold: f32,
) -> Result<ImgVec<RGB8>> {
    reference.ensure_same_dims(candidate)?;
    let r = reference.normalized();
    let c = candidate.normalized();
    let pixels = r
        .buf()
        .iter()
        .zip(c.buf())
        .map(|(&a, &b)| {
            let diff = (b - a) * 255.0;
            if diff > threshold {
                RGB8::new(0, diff.min(255.0) as u8, 0)
            } else if diff < -threshold {
                RGB8::new((-diff).min(255.0) as u8, 0, 0)
            } else {
                RGB8::new(0, 0, 0)
            }
        })
        .collect();
    Ok(ImgVec::new(pixels, reference.width(), reference.height()))
}
