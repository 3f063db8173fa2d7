//! Per-pixel tone and colour adjustments.
//!
//! Alpha is never modified. Colour-only adjustments (grayscale, sepia,
//! warmth, cool) return gray buffers unchanged.

use super::check_factor;
use crate::buffer::{Channels, LUMA_WEIGHTS, PixelBuffer};
use crate::error::Result;

const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

const WARM_BOOST: f32 = 1.1;
const WARM_CUT: f32 = 0.9;

/// Apply `f` to the colour part of every pixel.
fn map_colors(buffer: &PixelBuffer, mut f: impl FnMut(&mut [f32])) -> PixelBuffer {
    let colors = buffer.layout().color_count();
    let mut data = buffer.samples().to_vec();
    for pixel in data.chunks_exact_mut(buffer.channels()) {
        f(&mut pixel[..colors]);
    }
    PixelBuffer::from_clamped(
        buffer.width(),
        buffer.height(),
        buffer.layout(),
        buffer.precision(),
        data,
    )
}

/// Multiply every colour sample by `factor`.
///
/// Used for both brightness and exposure.
pub fn scale(buffer: &PixelBuffer, factor: f64) -> Result<PixelBuffer> {
    check_factor("brightness", factor)?;
    let f = factor as f32;
    Ok(map_colors(buffer, |px| px.iter_mut().for_each(|v| *v *= f)))
}

/// Stretch colour samples away from (or towards) the mean luma.
pub fn contrast(buffer: &PixelBuffer, factor: f64) -> Result<PixelBuffer> {
    check_factor("contrast", factor)?;
    let luma = buffer.to_luma();
    let mean = luma.samples().iter().map(|&v| f64::from(v)).sum::<f64>() / luma.len() as f64;
    let (mean, f) = (mean as f32, factor as f32);
    Ok(map_colors(buffer, |px| {
        px.iter_mut().for_each(|v| *v = mean + f * (*v - mean));
    }))
}

/// Scale the part of each colour sample above mid-gray.
pub fn highlights(buffer: &PixelBuffer, factor: f64) -> Result<PixelBuffer> {
    check_factor("highlights", factor)?;
    let mid = buffer.max_value() * 128.0 / 255.0;
    let f = factor as f32;
    Ok(map_colors(buffer, |px| {
        for v in px.iter_mut().filter(|v| **v > mid) {
            *v = mid + (*v - mid) * f;
        }
    }))
}

/// Replace each colour sample with the pixel's luma.
#[must_use]
pub fn grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    if buffer.layout() == Channels::Gray {
        return buffer.clone();
    }
    map_colors(buffer, |px| {
        let y = LUMA_WEIGHTS[0] * px[0] + LUMA_WEIGHTS[1] * px[1] + LUMA_WEIGHTS[2] * px[2];
        px.fill(y);
    })
}

#[must_use]
pub fn sepia(buffer: &PixelBuffer) -> PixelBuffer {
    if buffer.layout() == Channels::Gray {
        return buffer.clone();
    }
    map_colors(buffer, |px| {
        let [r, g, b] = [px[0], px[1], px[2]];
        for (out, row) in px.iter_mut().zip(SEPIA) {
            *out = row[0] * r + row[1] * g + row[2] * b;
        }
    })
}

/// Red up 10%, blue down 10%.
#[must_use]
pub fn warmth(buffer: &PixelBuffer) -> PixelBuffer {
    tint(buffer, WARM_BOOST, WARM_CUT)
}

/// Blue up 10%, red down 10%.
#[must_use]
pub fn cool(buffer: &PixelBuffer) -> PixelBuffer {
    tint(buffer, WARM_CUT, WARM_BOOST)
}

fn tint(buffer: &PixelBuffer, red: f32, blue: f32) -> PixelBuffer {
    if buffer.layout() == Channels::Gray {
        return buffer.clone();
    }
    map_colors(buffer, |px| {
        px[0] *= red;
        px[2] *= blue;
    })
}
