//! SSIM (Structural Similarity) metric calculation.
//!
//! Computed on luma with a Gaussian-weighted window. Only windows that lie
//! entirely inside the image are evaluated (stride 1), so an image of
//! `w x h` with an 11-pixel window produces a `(w - 10) x (h - 10)` map. The
//! global SSIM is the mean of the map.
//!
//! Local statistics come from separable Gaussian filtering of `x`, `y`,
//! `x^2`, `y^2` and `x*y`; identical inputs go through identical arithmetic
//! and score exactly 1.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::stats::Summary;

/// SSIM parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsimConfig {
    /// Window side length. Odd, at least 3.
    pub window: usize,
    /// Standard deviation of the Gaussian window weights.
    pub sigma: f64,
    /// Luminance stabilizer, `C1 = (k1 * L)^2`.
    pub k1: f64,
    /// Contrast stabilizer, `C2 = (k2 * L)^2`.
    pub k2: f64,
}

impl Default for SsimConfig {
    fn default() -> Self {
        Self {
            window: 11,
            sigma: 1.5,
            k1: 0.01,
            k2: 0.03,
        }
    }
}

impl SsimConfig {
    /// Check that the parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.window < 3 || self.window % 2 == 0 {
            return Err(Error::Config(format!(
                "SSIM window must be odd and at least 3, got {}",
                self.window
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(Error::Config(format!(
                "SSIM sigma must be positive, got {}",
                self.sigma
            )));
        }
        if !(self.k1 > 0.0 && self.k2 > 0.0) {
            return Err(Error::Config("SSIM constants must be positive".into()));
        }
        Ok(())
    }

    fn kernel(&self) -> Vec<f64> {
        let r = (self.window / 2) as f64;
        let weights: Vec<f64> = (0..self.window)
            .map(|i| {
                let d = i as f64 - r;
                (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
            })
            .collect();
        let sum: f64 = weights.iter().sum();
        weights.into_iter().map(|w| w / sum).collect()
    }
}

/// Local SSIM values of a comparison.
#[derive(Debug, Clone)]
pub struct SsimMap {
    map: ImgVec<f32>,
    mean: f64,
}

impl SsimMap {
    /// Global SSIM: the mean of the local values.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Map width (`image width - window + 1`).
    #[must_use]
    pub fn width(&self) -> usize {
        self.map.width()
    }

    /// Map height (`image height - window + 1`).
    #[must_use]
    pub fn height(&self) -> usize {
        self.map.height()
    }

    /// Borrow as an image.
    #[must_use]
    pub fn as_img(&self) -> ImgRef<'_, f32> {
        self.map.as_ref()
    }

    /// Row-major local values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        self.map.buf()
    }

    /// Descriptive statistics of the local values.
    #[must_use]
    pub fn summary(&self) -> Option<Summary> {
        Summary::compute_f32(self.values())
    }

    /// Window with the lowest similarity: `(x, y, ssim)`, with `(x, y)` the
    /// top-left corner of the window in image coordinates.
    #[must_use]
    pub fn worst(&self) -> (usize, usize, f32) {
        let (idx, value) = self
            .values()
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::INFINITY), |best, (i, v)| if v < best.1 { (i, v) } else { best });
        (idx % self.width(), idx / self.width(), value)
    }

    /// Heat map: dissimilar windows in red, similar ones in green.
    #[must_use]
    pub fn to_rgb(&self) -> ImgVec<RGB8> {
        let pixels = self
            .values()
            .iter()
            .map(|&v| {
                let t = v.clamp(0.0, 1.0);
                RGB8::new(((1.0 - t) * 255.0) as u8, (t * 255.0) as u8, 0)
            })
            .collect();
        ImgVec::new(pixels, self.width(), self.height())
    }
}

/// Calculate SSIM between two buffers.
///
/// Colour buffers are converted to luma first; alpha is ignored. Fails with
/// a shape error when shape or precision differ, and with
/// [`Error::InsufficientData`] when either side is smaller than the window.
pub fn calculate_ssim(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    config: &SsimConfig,
) -> Result<SsimMap> {
    reference.ensure_same_shape(candidate)?;
    config.validate()?;

    let (w, h) = (reference.width(), reference.height());
    let win = config.window;
    if w < win || h < win {
        return Err(Error::InsufficientData {
            operation: "SSIM",
            required: win,
            width: w,
            height: h,
        });
    }

    let l = f64::from(reference.max_value());
    let c1 = (config.k1 * l).powi(2);
    let c2 = (config.k2 * l).powi(2);

    let x: Vec<f64> = reference.to_luma().samples().iter().map(|&v| f64::from(v)).collect();
    let y: Vec<f64> = candidate.to_luma().samples().iter().map(|&v| f64::from(v)).collect();
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a * b).collect();

    let kernel = config.kernel();
    let (mw, mh) = (w - win + 1, h - win + 1);
    let mu_x = blur_valid(&x, w, h, &kernel);
    let mu_y = blur_valid(&y, w, h, &kernel);
    let e_xx = blur_valid(&xx, w, h, &kernel);
    let e_yy = blur_valid(&yy, w, h, &kernel);
    let e_xy = blur_valid(&xy, w, h, &kernel);

    let mut sum = 0.0;
    let mut map = Vec::with_capacity(mw * mh);
    for i in 0..mw * mh {
        let (mx, my) = (mu_x[i], mu_y[i]);
        let var_x = e_xx[i] - mx * mx;
        let var_y = e_yy[i] - my * my;
        let cov = e_xy[i] - mx * my;
        let s = ((2.0 * mx * my + c1) * (2.0 * cov + c2))
            / ((mx * mx + my * my + c1) * (var_x + var_y + c2));
        sum += s;
        map.push(s as f32);
    }

    Ok(SsimMap {
        map: ImgVec::new(map, mw, mh),
        mean: sum / (mw * mh) as f64,
    })
}

/// Separable filtering keeping only positions where the kernel fits.
fn blur_valid(data: &[f64], width: usize, height: usize, kernel: &[f64]) -> Vec<f64> {
    let k = kernel.len();
    let out_w = width - k + 1;
    let out_h = height - k + 1;

    let mut horizontal = vec![0.0; out_w * height];
    for y in 0..height {
        let row = &data[y * width..(y + 1) * width];
        for x in 0..out_w {
            horizontal[y * out_w + x] = row[x..x + k].iter().zip(kernel).map(|(v, w)| v * w).sum();
        }
    }

    let mut out = vec![0.0; out_w * out_h];
    for y in 0..out_h {
        for x in 0..out_w {
            out[y * out_w + x] = kernel
                .iter()
                .enumerate()
                .map(|(j, w)| horizontal[(y + j) * out_w + x] * w)
                .sum();
        }
    }
    out
}
