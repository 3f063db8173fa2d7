//! Neighbourhood filters: blur, sharpen, emboss, vignette.
//!
//! Borders replicate the edge pixels. Sharpen, emboss and vignette leave
//! alpha untouched; blur smooths every channel.

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// 3x3 sharpening kernel, divided by [`SHARPEN_DIVISOR`].
const SHARPEN_KERNEL: [[f32; 3]; 3] = [[-2.0, -2.0, -2.0], [-2.0, 32.0, -2.0], [-2.0, -2.0, -2.0]];
const SHARPEN_DIVISOR: f32 = 16.0;

const EMBOSS_KERNEL: [[f32; 3]; 3] = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];

/// Mid-gray on the 0-255 scale, the emboss offset.
const MID_GRAY: f32 = 128.0;

/// Gaussian blur with standard deviation `radius` pixels.
///
/// A radius of 0 returns a copy.
pub fn blur(buffer: &PixelBuffer, radius: f64) -> Result<PixelBuffer> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(Error::Config(format!(
            "blur radius must be finite and non-negative, got {radius}"
        )));
    }
    if radius == 0.0 {
        return Ok(buffer.clone());
    }
    let kernel = gaussian_kernel(radius);
    let r = kernel.len() / 2;
    let (w, h) = (buffer.width(), buffer.height());
    let n = buffer.channels();
    let src = buffer.samples();

    let mut horizontal = vec![0.0_f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            for c in 0..n {
                let mut acc = 0.0;
                for (k, &weight) in kernel.iter().enumerate() {
                    let sx = (x + k).saturating_sub(r).min(w - 1);
                    acc += weight * src[(y * w + sx) * n + c];
                }
                horizontal[(y * w + x) * n + c] = acc;
            }
        }
    }

    let mut data = vec![0.0_f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            for c in 0..n {
                let mut acc = 0.0;
                for (k, &weight) in kernel.iter().enumerate() {
                    let sy = (y + k).saturating_sub(r).min(h - 1);
                    acc += weight * horizontal[(sy * w + x) * n + c];
                }
                data[(y * w + x) * n + c] = acc;
            }
        }
    }
    Ok(PixelBuffer::from_clamped(w, h, buffer.layout(), buffer.precision(), data))
}

fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let r = (3.0 * sigma).ceil().max(1.0) as usize;
    let weights: Vec<f64> = (0..=2 * r)
        .map(|i| {
            let d = i as f64 - r as f64;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// 3x3 sharpening (centre 32, neighbours -2, divided by 16).
#[must_use]
pub fn sharpen(buffer: &PixelBuffer) -> PixelBuffer {
    convolve3x3(buffer, &SHARPEN_KERNEL, 1.0 / SHARPEN_DIVISOR, 0.0)
}

/// Emboss: difference with the upper-left neighbour, offset to mid-gray.
#[must_use]
pub fn emboss(buffer: &PixelBuffer) -> PixelBuffer {
    let offset = MID_GRAY / 255.0 * buffer.max_value();
    convolve3x3(buffer, &EMBOSS_KERNEL, 1.0, offset)
}

/// Darken towards the corners with a quadratic radial falloff.
///
/// The mask is `max(0, 1 - d^2)`, `d` the distance from the centre
/// normalized per axis, blended as `1 - intensity * (1 - mask)`.
pub fn vignette(buffer: &PixelBuffer, intensity: f64) -> Result<PixelBuffer> {
    if !intensity.is_finite() || !(0.0..=1.0).contains(&intensity) {
        return Err(Error::Config(format!(
            "vignette intensity must be in 0..=1, got {intensity}"
        )));
    }
    let (w, h) = (buffer.width(), buffer.height());
    let colors = buffer.layout().color_count();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);

    let mut data = buffer.samples().to_vec();
    for (i, pixel) in data.chunks_exact_mut(buffer.channels()).enumerate() {
        let nx = ((i % w) as f64 + 0.5 - cx) / cx;
        let ny = ((i / w) as f64 + 0.5 - cy) / cy;
        let mask = (1.0 - (nx * nx + ny * ny)).max(0.0);
        let factor = (1.0 - intensity * (1.0 - mask)) as f32;
        for v in &mut pixel[..colors] {
            *v *= factor;
        }
    }
    Ok(PixelBuffer::from_clamped(w, h, buffer.layout(), buffer.precision(), data))
}

fn convolve3x3(buffer: &PixelBuffer, kernel: &[[f32; 3]; 3], scale: f32, offset: f32) -> PixelBuffer {
    let (w, h) = (buffer.width(), buffer.height());
    let n = buffer.channels();
    let colors = buffer.layout().color_count();
    let src = buffer.samples();

    let mut data = src.to_vec();
    for y in 0..h {
        for x in 0..w {
            for c in 0..colors {
                let mut acc = 0.0;
                for (ky, row) in kernel.iter().enumerate() {
                    let sy = (y + ky).saturating_sub(1).min(h - 1);
                    for (kx, &k) in row.iter().enumerate() {
                        if k == 0.0 {
                            continue;
                        }
                        let sx = (x + kx).saturating_sub(1).min(w - 1);
                        acc += k * src[(sy * w + sx) * n + c];
                    }
                }
                data[(y * w + x) * n + c] = acc * scale + offset;
            }
        }
    }
    PixelBuffer::from_clamped(w, h, buffer.layout(), buffer.precision(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Precision;

    fn step(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, 1, Precision::U8, |x, _, _| {
            if x < width / 2 { 50.0 } else { 200.0 }
        })
        .unwrap()
    }

    #[test]
    fn test_blur_flat_is_unchanged() {
        let img = PixelBuffer::uniform(12, 9, 3, Precision::U8, 77.0).unwrap();
        assert_eq!(blur(&img, 2.0).unwrap(), img);
        assert_eq!(blur(&img, 0.0).unwrap(), img);
        assert!(blur(&img, -1.0).is_err());
    }

    #[test]
    fn test_blur_softens_step() {
        let img = step(20, 4);
        let b = blur(&img, 1.5).unwrap();
        let left = b.sample(9, 0, 0).unwrap();
        let right = b.sample(10, 0, 0).unwrap();
        assert!(left > 50.0 && left < 125.0);
        assert!(right < 200.0 && right > 125.0);
        assert_eq!(b.sample(0, 0, 0), Some(50.0));
    }

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sharpen() {
        let flat = PixelBuffer::uniform(5, 5, 1, Precision::U8, 90.0).unwrap();
        assert_eq!(sharpen(&flat), flat);
        let s = sharpen(&step(10, 3));
        // Overshoot on both sides of the edge.
        assert!(s.sample(4, 1, 0).unwrap() < 50.0);
        assert!(s.sample(5, 1, 0).unwrap() > 200.0);
    }

    #[test]
    fn test_emboss_flat_is_mid_gray() {
        let flat = PixelBuffer::uniform(5, 5, 3, Precision::U8, 90.0).unwrap();
        let e = emboss(&flat);
        assert!(e.samples().iter().all(|&v| v == 128.0));
    }

    #[test]
    fn test_emboss_keeps_alpha() {
        let img = PixelBuffer::uniform(4, 4, 4, Precision::U8, 30.0).unwrap();
        let e = emboss(&img);
        assert_eq!(e.sample(1, 1, 3), Some(30.0));
        assert_eq!(e.sample(1, 1, 0), Some(128.0));
    }

    #[test]
    fn test_vignette() {
        let img = PixelBuffer::uniform(21, 21, 3, Precision::U8, 200.0).unwrap();
        let v = vignette(&img, 1.0).unwrap();
        assert_eq!(v.sample(10, 10, 0), Some(200.0));
        assert_eq!(v.sample(0, 0, 0), Some(0.0));
        assert_eq!(vignette(&img, 0.0).unwrap(), img);
        assert!(vignette(&img, 1.5).is_err());
    }
}
