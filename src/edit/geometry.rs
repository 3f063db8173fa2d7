//! Canvas-changing transforms: rotate, skew, crop, resize.

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

use super::Axis;

/// Tolerance for treating an angle as a multiple of 90 degrees.
const RIGHT_ANGLE_EPSILON: f64 = 1e-9;

/// Largest skew angle, in degrees.
pub const MAX_SKEW_DEGREES: f64 = 45.0;

/// Rotate counter-clockwise by `degrees`, expanding the canvas to fit.
///
/// Multiples of 90 degrees are exact pixel permutations. Other angles use
/// nearest-neighbour sampling and fill uncovered corners with 0.
pub fn rotate(buffer: &PixelBuffer, degrees: f64) -> Result<PixelBuffer> {
    if !degrees.is_finite() {
        return Err(Error::Config(format!("rotation angle must be finite, got {degrees}")));
    }
    let d = degrees.rem_euclid(360.0);
    let quarter = (d / 90.0).round();
    if (d - quarter * 90.0).abs() < RIGHT_ANGLE_EPSILON {
        return Ok(rotate_quarters(buffer, quarter as u32 % 4));
    }

    let (w, h) = (buffer.width(), buffer.height());
    let n = buffer.channels();
    let theta = d.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (wf, hf) = (w as f64, h as f64);
    let nw = ((wf * cos).abs() + (hf * sin).abs() - RIGHT_ANGLE_EPSILON).ceil().max(1.0) as usize;
    let nh = ((wf * sin).abs() + (hf * cos).abs() - RIGHT_ANGLE_EPSILON).ceil().max(1.0) as usize;
    let (cx, cy) = (wf / 2.0, hf / 2.0);
    let (ncx, ncy) = (nw as f64 / 2.0, nh as f64 / 2.0);

    let mut data = vec![0.0; nw * nh * n];
    for y in 0..nh {
        let dy = y as f64 + 0.5 - ncy;
        for x in 0..nw {
            let dx = x as f64 + 0.5 - ncx;
            let sx = (cx + dx * cos - dy * sin).floor();
            let sy = (cy + dx * sin + dy * cos).floor();
            if sx < 0.0 || sy < 0.0 || sx >= wf || sy >= hf {
                continue;
            }
            if let Some(pixel) = buffer.pixel(sx as usize, sy as usize) {
                let start = (y * nw + x) * n;
                data[start..start + n].copy_from_slice(pixel);
            }
        }
    }
    Ok(PixelBuffer::from_clamped(nw, nh, buffer.layout(), buffer.precision(), data))
}

/// Rotate by `quarters * 90` degrees counter-clockwise.
fn rotate_quarters(buffer: &PixelBuffer, quarters: u32) -> PixelBuffer {
    let (w, h) = (buffer.width(), buffer.height());
    let n = buffer.channels();
    let (nw, nh) = if quarters % 2 == 1 { (h, w) } else { (w, h) };
    let src = buffer.samples();

    let mut data = Vec::with_capacity(src.len());
    for y in 0..nh {
        for x in 0..nw {
            let (sx, sy) = match quarters {
                1 => (w - 1 - y, x),
                2 => (w - 1 - x, h - 1 - y),
                3 => (y, h - 1 - x),
                _ => (x, y),
            };
            let start = (sy * w + sx) * n;
            data.extend_from_slice(&src[start..start + n]);
        }
    }
    PixelBuffer::from_clamped(nw, nh, buffer.layout(), buffer.precision(), data)
}

/// Shear by `degrees` (clamped to +-45) along `axis`.
///
/// The canvas grows by `|extent * tan(angle)|` so nothing is cut off; samples
/// are bilinear and uncovered areas are 0.
pub fn skew(buffer: &PixelBuffer, degrees: f64, axis: Axis) -> Result<PixelBuffer> {
    if !degrees.is_finite() {
        return Err(Error::Config(format!("skew angle must be finite, got {degrees}")));
    }
    let tan = degrees
        .clamp(-MAX_SKEW_DEGREES, MAX_SKEW_DEGREES)
        .to_radians()
        .tan();
    let (w, h) = (buffer.width(), buffer.height());
    let n = buffer.channels();

    let (nw, nh) = match axis {
        Axis::Horizontal => (w + (h as f64 * tan).abs() as usize, h),
        Axis::Vertical => (w, h + (w as f64 * tan).abs() as usize),
    };
    // Shift that keeps every destination coordinate non-negative.
    let offset = |extent: usize| if tan < 0.0 { (extent as f64 - 1.0) * -tan } else { 0.0 };

    let mut data = Vec::with_capacity(nw * nh * n);
    let mut pixel = vec![0.0; n];
    for y in 0..nh {
        for x in 0..nw {
            let (sx, sy) = match axis {
                Axis::Horizontal => (x as f64 - y as f64 * tan - offset(h), y as f64),
                Axis::Vertical => (x as f64, y as f64 - x as f64 * tan - offset(w)),
            };
            bilinear(buffer, sx, sy, Edge::Zero, &mut pixel);
            data.extend_from_slice(&pixel);
        }
    }
    Ok(PixelBuffer::from_clamped(nw, nh, buffer.layout(), buffer.precision(), data))
}

/// Keep the `width x height` rectangle whose top-left corner is `(x, y)`.
///
/// An empty rectangle or one that leaves the buffer is a shape error.
pub fn crop(
    buffer: &PixelBuffer,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Result<PixelBuffer> {
    let fits = |start: usize, len: usize, limit: usize| {
        start.checked_add(len).is_some_and(|end| end <= limit)
    };
    if width == 0 || height == 0 || !fits(x, width, buffer.width()) || !fits(y, height, buffer.height())
    {
        return Err(Error::InvalidShape(format!(
            "crop {width}x{height} at ({x}, {y}) does not fit in {}x{}",
            buffer.width(),
            buffer.height()
        )));
    }
    let n = buffer.channels();
    let stride = buffer.width() * n;
    let src = buffer.samples();
    let mut data = Vec::with_capacity(width * height * n);
    for row in y..y + height {
        let start = row * stride + x * n;
        data.extend_from_slice(&src[start..start + width * n]);
    }
    Ok(PixelBuffer::from_clamped(width, height, buffer.layout(), buffer.precision(), data))
}

/// Bilinear resampling to `width x height`.
pub fn resize(buffer: &PixelBuffer, width: usize, height: usize) -> Result<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidShape(format!("cannot resize to {width}x{height}")));
    }
    let n = buffer.channels();
    let sx_scale = buffer.width() as f64 / width as f64;
    let sy_scale = buffer.height() as f64 / height as f64;

    let mut data = Vec::with_capacity(width * height * n);
    let mut pixel = vec![0.0; n];
    for y in 0..height {
        let sy = (y as f64 + 0.5) * sy_scale - 0.5;
        for x in 0..width {
            let sx = (x as f64 + 0.5) * sx_scale - 0.5;
            bilinear(buffer, sx, sy, Edge::Clamp, &mut pixel);
            data.extend_from_slice(&pixel);
        }
    }
    Ok(PixelBuffer::from_clamped(width, height, buffer.layout(), buffer.precision(), data))
}

/// Scale `buffer` down so neither side exceeds `max_dim`. Smaller buffers are
/// returned unchanged.
pub fn fit_within(buffer: &PixelBuffer, max_dim: usize) -> Result<PixelBuffer> {
    let (w, h) = (buffer.width(), buffer.height());
    let longest = w.max(h);
    if max_dim == 0 || longest <= max_dim {
        return Ok(buffer.clone());
    }
    let scale = max_dim as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as usize).max(1);
    let nh = ((h as f64 * scale).round() as usize).max(1);
    resize(buffer, nw, nh)
}

#[derive(Clone, Copy)]
enum Edge {
    /// Coordinates outside the buffer read the nearest edge pixel.
    Clamp,
    /// Coordinates outside the buffer read 0.
    Zero,
}

/// Bilinear sample at `(fx, fy)`, pixel centres at integer coordinates.
fn bilinear(buffer: &PixelBuffer, fx: f64, fy: f64, edge: Edge, out: &mut [f32]) {
    let (w, h) = (buffer.width() as isize, buffer.height() as isize);
    let (fx, fy) = match edge {
        Edge::Clamp => (fx.clamp(0.0, (w - 1) as f64), fy.clamp(0.0, (h - 1) as f64)),
        Edge::Zero => (fx, fy),
    };
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = (fx - x0) as f32;
    let ty = (fy - y0) as f32;
    let (x0, y0) = (x0 as isize, y0 as isize);

    out.fill(0.0);
    for (dy, wy) in [(0, 1.0 - ty), (1, ty)] {
        for (dx, wx) in [(0, 1.0 - tx), (1, tx)] {
            let weight = wx * wy;
            if weight == 0.0 {
                continue;
            }
            let (mut px, mut py) = (x0 + dx, y0 + dy);
            if let Edge::Clamp = edge {
                px = px.clamp(0, w - 1);
                py = py.clamp(0, h - 1);
            }
            if px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            if let Some(pixel) = buffer.pixel(px as usize, py as usize) {
                for (o, &v) in out.iter_mut().zip(pixel) {
                    *o += weight * v;
                }
            }
        }
    }
}
