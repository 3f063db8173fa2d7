//! Noise estimation.
//!
//! The primary estimator ([`estimate_noise`]) measures the standard deviation
//! of the high-frequency residual left after subtracting a local smoothing of
//! fixed window size. Only pixels whose whole window lies inside the buffer
//! contribute, so the border never biases the estimate.
//!
//! Two secondary views are provided for display and cross-checking:
//! [`estimate_gaussian_sigma`] (a Laplacian-difference estimate of additive
//! Gaussian noise) and [`local_variance_map`] (3x3 luma variance per pixel).
//! [`noise_difference_map`] contrasts two variance maps.

use imgref::ImgVec;
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::stats::Moments;

/// Local smoothing subtracted from the signal before measuring the residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingFilter {
    /// Box (mean) filter.
    #[default]
    Mean,
    /// Median filter. More robust to edges, slower.
    Median,
}

/// Local variance change, on the 8-bit scale, that
/// [`noise_difference_map`] marks.
pub const VARIANCE_DIFF_THRESHOLD: f32 = 5.0;

/// Configuration for [`estimate_noise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Side length of the square smoothing window. Must be odd and at least 3.
    pub window: usize,
    /// Smoothing filter.
    pub filter: SmoothingFilter,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            window: 3,
            filter: SmoothingFilter::Mean,
        }
    }
}

impl NoiseConfig {
    /// Config with the given window and the default filter.
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Check that the window is odd and at least 3.
    pub fn validate(&self) -> Result<()> {
        if self.window < 3 || self.window % 2 == 0 {
            return Err(Error::Config(format!(
                "noise window must be odd and >= 3, got {}",
                self.window
            )));
        }
        Ok(())
    }
}

/// Noise level of one buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseEstimate {
    /// Standard deviation of the residual over all colour channels, in the
    /// buffer's native sample scale.
    pub level: f64,
    /// The same measure per colour channel.
    pub per_channel: Vec<f64>,
    /// Number of residual samples that contributed.
    pub samples: u64,
}

/// Estimate the noise level of `buffer`.
///
/// Alpha is excluded. Fails with [`Error::InsufficientData`] when the buffer
/// is smaller than the window in either dimension.
pub fn estimate_noise(buffer: &PixelBuffer, config: &NoiseConfig) -> Result<NoiseEstimate> {
    config.validate()?;
    let (w, h) = (buffer.width(), buffer.height());
    let win = config.window;
    if w < win || h < win {
        return Err(Error::InsufficientData {
            operation: "noise estimation",
            required: win,
            width: w,
            height: h,
        });
    }

    let r = win / 2;
    let n = buffer.channels();
    let colors = buffer.layout().color_count();
    let data = buffer.samples();

    let mut total = Moments::new();
    let mut per_channel = vec![Moments::new(); colors];
    let mut window_values = Vec::with_capacity(win * win);

    for c in 0..colors {
        for y in r..h - r {
            for x in r..w - r {
                window_values.clear();
                for wy in y - r..=y + r {
                    let row = wy * w;
                    for wx in x - r..=x + r {
                        window_values.push(data[(row + wx) * n + c]);
                    }
                }
                let smooth = match config.filter {
                    SmoothingFilter::Mean => {
                        window_values.iter().map(|&v| f64::from(v)).sum::<f64>()
                            / window_values.len() as f64
                    }
                    SmoothingFilter::Median => median_in_place(&mut window_values),
                };
                let residual = f64::from(data[(y * w + x) * n + c]) - smooth;
                per_channel[c].push(residual);
                total.push(residual);
            }
        }
    }

    Ok(NoiseEstimate {
        level: total.std_dev(),
        per_channel: per_channel.iter().map(Moments::std_dev).collect(),
        samples: total.count(),
    })
}

fn median_in_place(values: &mut [f32]) -> f64 {
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    f64::from(*median)
}

/// Estimate the standard deviation of additive Gaussian noise on the luma.
///
/// Convolves with `[[1,-2,1],[-2,4,-2],[1,-2,1]]` (replicated border), which
/// cancels smooth structure, and divides the response's standard deviation by
/// the kernel norm (6).
pub fn estimate_gaussian_sigma(buffer: &PixelBuffer) -> Result<f64> {
    let (w, h) = (buffer.width(), buffer.height());
    if w < 3 || h < 3 {
        return Err(Error::InsufficientData {
            operation: "gaussian noise estimation",
            required: 3,
            width: w,
            height: h,
        });
    }
    let luma = buffer.to_luma();
    let p = luma.samples();
    let at = |x: usize, y: usize| f64::from(p[y * w + x]);

    let mut moments = Moments::new();
    for y in 0..h {
        let (ym, yp) = (y.saturating_sub(1), (y + 1).min(h - 1));
        for x in 0..w {
            let (xm, xp) = (x.saturating_sub(1), (x + 1).min(w - 1));
            let response = at(xm, ym) - 2.0 * at(x, ym) + at(xp, ym)
                - 2.0 * at(xm, y)
                + 4.0 * at(x, y)
                - 2.0 * at(xp, y)
                + at(xm, yp)
                - 2.0 * at(x, yp)
                + at(xp, yp);
            moments.push(response);
        }
    }
    Ok(moments.std_dev() / 6.0)
}

/// 3x3 variance of the luma around every pixel (mirrored border).
#[must_use]
pub fn local_variance_map(buffer: &PixelBuffer) -> ImgVec<f32> {
    let luma = buffer.to_luma();
    let (w, h) = (luma.width(), luma.height());
    let p = luma.samples();

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let mut m = Moments::new();
            for dy in -1..=1_isize {
                let yy = mirror(y as isize + dy, h);
                for dx in -1..=1_isize {
                    let xx = mirror(x as isize + dx, w);
                    m.push(f64::from(p[yy * w + xx]));
                }
            }
            out.push(m.variance() as f32);
        }
    }
    ImgVec::new(out, w, h)
}

/// Mirror an index into `0..n` without repeating the edge sample.
fn mirror(i: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let m = if i < 0 {
        -i
    } else if i > last {
        2 * last - i
    } else {
        i
    };
    m.clamp(0, last) as usize
}

/// Render a variance map as a heat map: yellow where variance is high, blue
/// where it is low. The map is min-max normalized first.
#[must_use]
pub fn noise_heatmap(map: &ImgVec<f32>) -> ImgVec<RGB8> {
    let (lo, hi) = map
        .buf()
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    let pixels = map
        .buf()
        .iter()
        .map(|&v| {
            let t = if range > 0.0 { ((v - lo) / range * 255.0) as u8 } else { 0 };
            RGB8::new(t, t, 255 - t)
        })
        .collect();
    ImgVec::new(pixels, map.width(), map.height())
}

/// Mark where local variance changed: green where the candidate's variance
/// exceeds the reference's by more than `threshold`, red where it is lower by
/// more than `threshold`, black elsewhere.
///
/// `threshold` is in the maps' native units; scale
/// [`VARIANCE_DIFF_THRESHOLD`] by `(max_value / 255)^2` for `F32` buffers.
/// Fails with a shape error when the maps differ in size.
pub fn noise_difference_map(
    reference: &ImgVec<f32>,
    candidate: &ImgVec<f32>,
    threshold: f32,
) -> Result<ImgVec<RGB8>> {
    if reference.width() != candidate.width() || reference.height() != candidate.height() {
        return Err(Error::mismatch(
            format_args!("{}x{}", reference.width(), reference.height()),
            format_args!("{}x{}", candidate.width(), candidate.height()),
        ));
    }
    let pixels = reference
        .buf()
        .iter()
        .zip(candidate.buf())
        .map(|(&r, &c)| {
            let diff = c - r;
            if diff > threshold {
                RGB8::new(0, 255, 0)
            } else if diff < -threshold {
                RGB8::new(255, 0, 0)
            } else {
                RGB8::new(0, 0, 0)
            }
        })
        .collect();
    Ok(ImgVec::new(pixels, reference.width(), reference.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Precision;
    use crate::error::ErrorKind;

    /// Deterministic pseudo-random values in `[-amp, amp]`.
    fn jitter(seed: usize, amp: f32) -> f32 {
        let v = (seed.wrapping_mul(2654435761) >> 7) % 1000;
        (v as f32 / 999.0 * 2.0 - 1.0) * amp
    }

    #[test]
    fn test_uniform_has_zero_noise() {
        let buf = PixelBuffer::uniform(16, 16, 3, Precision::U8, 128.0).unwrap();
        let est = estimate_noise(&buf, &NoiseConfig::default()).unwrap();
        assert_eq!(est.level, 0.0);
        assert_eq!(est.per_channel, vec![0.0, 0.0, 0.0]);
        assert_eq!(est.samples, 3 * 14 * 14);
    }

    #[test]
    fn test_too_small_for_window() {
        let buf = PixelBuffer::uniform(2, 2, 1, Precision::U8, 128.0).unwrap();
        let err = estimate_noise(&buf, &NoiseConfig::with_window(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(matches!(
            err,
            Error::InsufficientData { required: 5, width: 2, height: 2, .. }
        ));
    }

    #[test]
    fn test_exact_window_size_is_enough() {
        let buf = PixelBuffer::uniform(5, 5, 1, Precision::U8, 10.0).unwrap();
        let est = estimate_noise(&buf, &NoiseConfig::with_window(5)).unwrap();
        assert_eq!(est.samples, 1);
        assert_eq!(est.level, 0.0);
    }

    #[test]
    fn test_invalid_window() {
        let buf = PixelBuffer::uniform(8, 8, 1, Precision::U8, 0.0).unwrap();
        assert!(estimate_noise(&buf, &NoiseConfig::with_window(4)).is_err());
        assert!(estimate_noise(&buf, &NoiseConfig::with_window(1)).is_err());
    }

    #[test]
    fn test_noisy_exceeds_clean() {
        let clean = PixelBuffer::from_fn(32, 32, 1, Precision::U8, |x, _, _| x as f32 * 4.0).unwrap();
        let noisy = PixelBuffer::from_fn(32, 32, 1, Precision::U8, |x, y, _| {
            (x as f32 * 4.0 + jitter(y * 32 + x, 20.0)).clamp(0.0, 255.0)
        })
        .unwrap();
        for filter in [SmoothingFilter::Mean, SmoothingFilter::Median] {
            let config = NoiseConfig { window: 3, filter };
            let a = estimate_noise(&clean, &config).unwrap().level;
            let b = estimate_noise(&noisy, &config).unwrap().level;
            assert!(a < 1e-3, "{filter:?}: linear ramp should have no residual, got {a}");
            assert!(b > 1.0, "{filter:?}: noisy level {b}");
        }
    }

    #[test]
    fn test_per_channel_breakdown() {
        let buf = PixelBuffer::from_fn(12, 12, 3, Precision::U8, |x, y, c| {
            if c == 2 { 128.0 + jitter(y * 12 + x, 30.0) } else { 128.0 }
        })
        .unwrap();
        let est = estimate_noise(&buf, &NoiseConfig::default()).unwrap();
        assert_eq!(est.per_channel[0], 0.0);
        assert_eq!(est.per_channel[1], 0.0);
        assert!(est.per_channel[2] > 0.0);
        assert!(est.level > 0.0 && est.level < est.per_channel[2]);
    }

    #[test]
    fn test_alpha_ignored() {
        let buf = PixelBuffer::from_fn(8, 8, 4, Precision::U8, |x, _, c| {
            if c == 3 { if x % 2 == 0 { 0.0 } else { 255.0 } } else { 64.0 }
        })
        .unwrap();
        let est = estimate_noise(&buf, &NoiseConfig::default()).unwrap();
        assert_eq!(est.per_channel.len(), 3);
        assert_eq!(est.level, 0.0);
    }

    #[test]
    fn test_gaussian_sigma() {
        let flat = PixelBuffer::uniform(10, 10, 3, Precision::U8, 77.0).unwrap();
        assert_eq!(estimate_gaussian_sigma(&flat).unwrap(), 0.0);

        let tiny = PixelBuffer::uniform(2, 5, 1, Precision::U8, 0.0).unwrap();
        assert_eq!(
            estimate_gaussian_sigma(&tiny).unwrap_err().kind(),
            ErrorKind::InsufficientData
        );

        let noisy = PixelBuffer::from_fn(24, 24, 1, Precision::U8, |x, y, _| {
            128.0 + jitter(y * 24 + x, 25.0)
        })
        .unwrap();
        assert!(estimate_gaussian_sigma(&noisy).unwrap() > 1.0);
    }

    #[test]
    fn test_local_variance_map() {
        let flat = PixelBuffer::uniform(5, 4, 1, Precision::U8, 9.0).unwrap();
        let map = local_variance_map(&flat);
        assert_eq!((map.width(), map.height()), (5, 4));
        assert!(map.buf().iter().all(|&v| v == 0.0));

        let spiked = flat.with_pixel(2, 2, &[200.0]).unwrap();
        let map = local_variance_map(&spiked);
        assert!(map.buf()[2 * 5 + 2] > 0.0);
        assert_eq!(map.buf()[0], 0.0);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(mirror(-1, 5), 1);
        assert_eq!(mirror(5, 5), 3);
        assert_eq!(mirror(2, 5), 2);
        assert_eq!(mirror(-1, 1), 0);
    }

    #[test]
    fn test_noise_heatmap() {
        let map = ImgVec::new(vec![0.0, 5.0, 10.0], 3, 1);
        let heat = noise_heatmap(&map);
        assert_eq!(heat.buf()[0], RGB8::new(0, 0, 255));
        assert_eq!(heat.buf()[2], RGB8::new(255, 255, 0));
    }

    #[test]
    fn test_noise_difference_map() {
        let flat = PixelBuffer::uniform(6, 6, 1, Precision::U8, 100.0).unwrap();
        let noisy = flat.with_pixel(1, 1, &[200.0]).unwrap();
        let spiked = local_variance_map(&noisy);
        let smooth = local_variance_map(&flat);

        let gained = noise_difference_map(&smooth, &spiked, VARIANCE_DIFF_THRESHOLD).unwrap();
        assert_eq!(gained.buf()[6 + 1], RGB8::new(0, 255, 0));
        assert_eq!(gained.buf()[5 * 6 + 5], RGB8::new(0, 0, 0));

        let lost = noise_difference_map(&spiked, &smooth, VARIANCE_DIFF_THRESHOLD).unwrap();
        assert_eq!(lost.buf()[6 + 1], RGB8::new(255, 0, 0));

        let unchanged = noise_difference_map(&spiked, &spiked, VARIANCE_DIFF_THRESHOLD).unwrap();
        assert!(unchanged.buf().iter().all(|&p| p == RGB8::new(0, 0, 0)));

        let other = ImgVec::new(vec![0.0_f32; 4], 2, 2);
        assert!(noise_difference_map(&spiked, &other, 5.0).unwrap_err().is_shape_error());
    }
}
