//! Normalized in-memory image representation.
//!
//! [`PixelBuffer`] is the single currency of the crate: the edit pipeline
//! produces them, every analysis stage borrows them, and nothing mutates one
//! after construction. Transforms such as [`PixelBuffer::to_luma`] return a
//! new buffer.
//!
//! Samples are stored interleaved and row-major as `f32` in the native scale
//! of the declared [`Precision`]: `0.0..=255.0` for [`Precision::U8`] and
//! `0.0..=1.0` for [`Precision::F32`]. Buffers derived inside the crate (for
//! example luma conversion) may hold fractional values in the `U8` range.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// BT.601 luma weights, the same ones used by common 8-bit grayscale
/// conversion.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Declared sample type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// Fixed 8-bit samples, `0..=255`.
    U8,
    /// Floating-point samples normalized to `[0, 1]`.
    F32,
}

impl Precision {
    /// Maximum representable sample value.
    #[must_use]
    pub fn max_value(self) -> f32 {
        match self {
            Self::U8 => 255.0,
            Self::F32 => 1.0,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::F32 => write!(f, "f32"),
        }
    }
}

/// Channel layout of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channels {
    /// Single luminance channel.
    Gray,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl Channels {
    /// Number of interleaved samples per pixel.
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Layout for a channel count.
    pub fn from_count(count: usize) -> Result<Self> {
        match count {
            1 => Ok(Self::Gray),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            n => Err(Error::InvalidShape(format!(
                "unsupported channel count {n} (expected 1, 3 or 4)"
            ))),
        }
    }

    /// Number of colour (non-alpha) channels.
    #[must_use]
    pub fn color_count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb | Self::Rgba => 3,
        }
    }
}

/// Dimensions of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Samples per pixel.
    pub channels: usize,
}

impl Shape {
    /// Pixel count (`width * height`).
    #[must_use]
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Immutable decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    channels: Channels,
    precision: Precision,
    data: Vec<f32>,
}

impl PixelBuffer {
    /// Build an 8-bit buffer from interleaved row-major samples.
    pub fn from_u8(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Result<Self> {
        let channels = Self::check_shape(data.len(), width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            precision: Precision::U8,
            data: data.into_iter().map(f32::from).collect(),
        })
    }

    /// Build a floating-point buffer from interleaved row-major samples in `[0, 1]`.
    pub fn from_f32(data: Vec<f32>, width: usize, height: usize, channels: usize) -> Result<Self> {
        let channels = Self::check_shape(data.len(), width, height, channels)?;
        check_range(&data, Precision::F32)?;
        Ok(Self {
            width,
            height,
            channels,
            precision: Precision::F32,
            data,
        })
    }

    /// Build a buffer by evaluating `f(x, y, channel)` for every sample.
    ///
    /// Values are in the native scale of `precision`.
    pub fn from_fn(
        width: usize,
        height: usize,
        channels: usize,
        precision: Precision,
        mut f: impl FnMut(usize, usize, usize) -> f32,
    ) -> Result<Self> {
        let len = Self::sample_count(width, height, channels)?;
        let layout = Self::check_shape(len, width, height, channels)?;
        let mut data = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    data.push(f(x, y, c));
                }
            }
        }
        check_range(&data, precision)?;
        Ok(Self {
            width,
            height,
            channels: layout,
            precision,
            data,
        })
    }

    /// A buffer where every sample has the same value.
    pub fn uniform(
        width: usize,
        height: usize,
        channels: usize,
        precision: Precision,
        value: f32,
    ) -> Result<Self> {
        Self::from_fn(width, height, channels, precision, |_, _, _| value)
    }

    /// Buffer built inside the crate from already computed samples.
    ///
    /// Samples are clamped to the domain; `U8` samples are rounded.
    pub(crate) fn from_clamped(
        width: usize,
        height: usize,
        channels: Channels,
        precision: Precision,
        mut data: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(data.len(), width * height * channels.count());
        let max = precision.max_value();
        for v in &mut data {
            let clamped = if v.is_finite() { v.clamp(0.0, max) } else { 0.0 };
            *v = match precision {
                Precision::U8 => clamped.round(),
                Precision::F32 => clamped,
            };
        }
        Self {
            width,
            height,
            channels,
            precision,
            data,
        }
    }

    /// Buffer built inside the crate from samples already known to be in range.
    pub(crate) fn from_parts(
        width: usize,
        height: usize,
        channels: Channels,
        precision: Precision,
        data: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(data.len(), width * height * channels.count());
        Self {
            width,
            height,
            channels,
            precision,
            data,
        }
    }

    fn sample_count(width: usize, height: usize, channels: usize) -> Result<usize> {
        width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| Error::InvalidShape(format!("{width}x{height}x{channels} overflows")))
    }

    fn check_shape(len: usize, width: usize, height: usize, channels: usize) -> Result<Channels> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidShape(format!(
                "zero-area buffer ({width}x{height})"
            )));
        }
        let layout = Channels::from_count(channels)?;
        let expected = Self::sample_count(width, height, channels)?;
        if len != expected {
            return Err(Error::InvalidShape(format!(
                "{width}x{height}x{channels} needs {expected} samples, got {len}"
            )));
        }
        Ok(layout)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples per pixel.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels.count()
    }

    /// Channel layout.
    #[must_use]
    pub fn layout(&self) -> Channels {
        self.channels
    }

    /// Declared sample type.
    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Maximum representable sample value (255 or 1).
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.precision.max_value()
    }

    /// Dimensions of this buffer.
    #[must_use]
    pub fn shape(&self) -> Shape {
        Shape {
            width: self.width,
            height: self.height,
            channels: self.channels.count(),
        }
    }

    /// Total sample count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no samples. Never true for a constructed buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All samples, interleaved and row-major.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Sample at `(x, y)` in `channel`.
    #[must_use]
    pub fn sample(&self, x: usize, y: usize, channel: usize) -> Option<f32> {
        let n = self.channels.count();
        if x >= self.width || y >= self.height || channel >= n {
            return None;
        }
        Some(self.data[(y * self.width + x) * n + channel])
    }

    /// All samples of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let n = self.channels.count();
        let start = (y * self.width + x) * n;
        Some(&self.data[start..start + n])
    }

    /// Iterate over pixels in row-major order.
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.channels.count())
    }

    /// Iterate over one channel in row-major order.
    ///
    /// Returns `None` if `channel` does not exist.
    pub fn channel(&self, channel: usize) -> Option<impl Iterator<Item = f32> + '_> {
        let n = self.channels.count();
        (channel < n).then(|| self.data.iter().skip(channel).step_by(n).copied())
    }

    /// Single-channel luma version of this buffer (BT.601, alpha ignored).
    #[must_use]
    pub fn to_luma(&self) -> PixelBuffer {
        if self.channels == Channels::Gray {
            return self.clone();
        }
        let max = self.max_value();
        let data = self
            .pixels()
            .map(|p| {
                let y = LUMA_WEIGHTS[0] * p[0] + LUMA_WEIGHTS[1] * p[1] + LUMA_WEIGHTS[2] * p[2];
                y.clamp(0.0, max)
            })
            .collect();
        Self::from_parts(self.width, self.height, Channels::Gray, self.precision, data)
    }

    /// Copy of this buffer with one pixel replaced.
    pub fn with_pixel(&self, x: usize, y: usize, values: &[f32]) -> Result<PixelBuffer> {
        let n = self.channels.count();
        if x >= self.width || y >= self.height {
            return Err(Error::InvalidShape(format!(
                "pixel ({x}, {y}) outside {}x{}",
                self.width, self.height
            )));
        }
        if values.len() != n {
            return Err(Error::InvalidShape(format!(
                "pixel needs {n} samples, got {}",
                values.len()
            )));
        }
        check_range(values, self.precision)?;
        let mut data = self.data.clone();
        let start = (y * self.width + x) * n;
        data[start..start + n].copy_from_slice(values);
        Ok(Self::from_parts(self.width, self.height, self.channels, self.precision, data))
    }

    /// Fail with a shape error unless `other` has the same dimensions,
    /// channel count and precision.
    pub fn ensure_same_shape(&self, other: &PixelBuffer) -> Result<()> {
        if self.shape() != other.shape() || self.precision != other.precision {
            return Err(Error::mismatch(
                format_args!("{} {}", self.shape(), self.precision),
                format_args!("{} {}", other.shape(), other.precision),
            ));
        }
        Ok(())
    }

    /// Samples rounded to 8-bit, rescaling floating-point buffers.
    #[must_use]
    pub fn to_u8_vec(&self) -> Vec<u8> {
        let scale = 255.0 / self.max_value();
        self.data
            .iter()
            .map(|&v| (v * scale).round().clamp(0.0, 255.0) as u8)
            .collect()
    }
}

fn check_range(data: &[f32], precision: Precision) -> Result<()> {
    let max = precision.max_value();
    match data
        .iter()
        .position(|v| !v.is_finite() || *v < 0.0 || *v > max)
    {
        Some(index) => Err(Error::SampleOutOfRange {
            index,
            value: data[index],
        }),
        None => Ok(()),
    }
}
