//! Editing transforms that produce candidate images from a reference.
//!
//! Every transform is a pure function from one [`PixelBuffer`] to a new
//! buffer of the same precision; `U8` results are rounded and clamped. The
//! [`Transform`] enum dispatches to [`geometry`], [`filter`] and [`tone`].
//!
//! | Stage | Transforms |
//! |-------|------------|
//! | geometry | rotate, skew, crop, resize |
//! | filter | blur, sharpen, emboss, vignette |
//! | tone | brightness, contrast, exposure, highlights, grayscale, sepia, warmth, cool |
//!
//! [`EditPipeline`] applies geometry first, then filters, then tone,
//! keeping the insertion order within each stage.
//!
//! Transforms parse from short strings, which is how the CLI takes them:
//!
//! ```
//! use image_eval::edit::Transform;
//!
//! let t: Transform = "brightness=1.2".parse()?;
//! assert_eq!(t, Transform::Brightness(1.2));
//! assert_eq!("crop=0,0,50,50".parse::<Transform>()?.to_string(), "crop=0,0,50,50");
//! # Ok::<(), image_eval::Error>(())
//! ```

pub mod filter;
pub mod geometry;
pub mod tone;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Direction of a skew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Rows shift sideways; the canvas widens.
    #[default]
    Horizontal,
    /// Columns shift up or down; the canvas grows taller.
    Vertical,
}

/// Processing stage of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Changes the canvas.
    Geometry,
    /// Neighbourhood filters.
    Filter,
    /// Per-pixel tone and colour.
    Tone,
}

/// One editing operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Counter-clockwise rotation with the canvas expanded to fit.
    Rotate {
        /// Angle in degrees.
        degrees: f64,
    },
    /// Shear, clamped to +-45 degrees.
    Skew {
        /// Angle in degrees.
        degrees: f64,
        /// Direction.
        axis: Axis,
    },
    /// Keep a rectangle.
    Crop {
        /// Left edge.
        x: usize,
        /// Top edge.
        y: usize,
        /// Width.
        width: usize,
        /// Height.
        height: usize,
    },
    /// Bilinear resampling to a new size.
    Resize {
        /// New width.
        width: usize,
        /// New height.
        height: usize,
    },
    /// Gaussian blur.
    Blur {
        /// Standard deviation in pixels.
        radius: f64,
    },
    /// 3x3 sharpening.
    Sharpen,
    /// 3x3 emboss around mid-gray.
    Emboss,
    /// Darken towards the corners.
    Vignette {
        /// 0 leaves the image unchanged, 1 darkens corners to black.
        intensity: f64,
    },
    /// Scale every colour sample.
    Brightness(f64),
    /// Scale distance from the mean luma.
    Contrast(f64),
    /// Scale every colour sample (exposure multiplier).
    Exposure(f64),
    /// Scale the part of each sample above mid-gray.
    Highlights(f64),
    /// Replace colour with luma.
    Grayscale,
    /// Sepia tone matrix.
    Sepia,
    /// Boost red, cut blue.
    Warmth,
    /// Boost blue, cut red.
    Cool,
}

impl Transform {
    /// Stage this transform belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Rotate { .. } | Self::Skew { .. } | Self::Crop { .. } | Self::Resize { .. } => {
                Stage::Geometry
            }
            Self::Blur { .. } | Self::Sharpen | Self::Emboss | Self::Vignette { .. } => Stage::Filter,
            _ => Stage::Tone,
        }
    }

    /// Apply to `buffer`.
    pub fn apply(&self, buffer: &PixelBuffer) -> Result<PixelBuffer> {
        apply(buffer, self)
    }
}

/// Apply one transform to `buffer`.
pub fn apply(buffer: &PixelBuffer, transform: &Transform) -> Result<PixelBuffer> {
    match *transform {
        Transform::Rotate { degrees } => geometry::rotate(buffer, degrees),
        Transform::Skew { degrees, axis } => geometry::skew(buffer, degrees, axis),
        Transform::Crop {
            x,
            y,
            width,
            height,
        } => geometry::crop(buffer, x, y, width, height),
        Transform::Resize { width, height } => geometry::resize(buffer, width, height),
        Transform::Blur { radius } => filter::blur(buffer, radius),
        Transform::Sharpen => Ok(filter::sharpen(buffer)),
        Transform::Emboss => Ok(filter::emboss(buffer)),
        Transform::Vignette { intensity } => filter::vignette(buffer, intensity),
        Transform::Brightness(f) | Transform::Exposure(f) => tone::scale(buffer, f),
        Transform::Contrast(f) => tone::contrast(buffer, f),
        Transform::Highlights(f) => tone::highlights(buffer, f),
        Transform::Grayscale => Ok(tone::grayscale(buffer)),
        Transform::Sepia => Ok(tone::sepia(buffer)),
        Transform::Warmth => Ok(tone::warmth(buffer)),
        Transform::Cool => Ok(tone::cool(buffer)),
    }
}

/// Map a -100..=100 slider position to a multiplicative factor,
/// `2^(v / 100)`: 0 is neutral, +-100 doubles or halves.
#[must_use]
pub fn slider_multiplier(value: f64) -> f64 {
    (value.clamp(-100.0, 100.0) / 100.0).exp2()
}

fn check_factor(name: &str, factor: f64) -> Result<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(Error::Config(format!(
            "{name} factor must be finite and non-negative, got {factor}"
        )));
    }
    Ok(())
}

//=============================================================================
// Text form
//=============================================================================

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotate { degrees } => write!(f, "rotate={degrees}"),
            Self::Skew { degrees, axis } => {
                let a = match axis {
                    Axis::Horizontal => "h",
                    Axis::Vertical => "v",
                };
                write!(f, "skew={degrees},{a}")
            }
            Self::Crop {
                x,
                y,
                width,
                height,
            } => write!(f, "crop={x},{y},{width},{height}"),
            Self::Resize { width, height } => write!(f, "resize={width},{height}"),
            Self::Blur { radius } => write!(f, "blur={radius}"),
            Self::Sharpen => write!(f, "sharpen"),
            Self::Emboss => write!(f, "emboss"),
            Self::Vignette { intensity } => write!(f, "vignette={intensity}"),
            Self::Brightness(v) => write!(f, "brightness={v}"),
            Self::Contrast(v) => write!(f, "contrast={v}"),
            Self::Exposure(v) => write!(f, "exposure={v}"),
            Self::Highlights(v) => write!(f, "highlights={v}"),
            Self::Grayscale => write!(f, "grayscale"),
            Self::Sepia => write!(f, "sepia"),
            Self::Warmth => write!(f, "warmth"),
            Self::Cool => write!(f, "cool"),
        }
    }
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, args) = match s.split_once('=') {
            Some((name, args)) => (name.trim(), Some(args.trim())),
            None => (s, None),
        };
        let bad = |msg: &str| Error::Config(format!("invalid transform '{s}': {msg}"));

        let numbers = |expected: usize| -> Result<Vec<f64>> {
            let args = args.ok_or_else(|| bad("missing arguments"))?;
            let values = args
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| bad(&e.to_string()))?;
            if values.len() != expected {
                return Err(bad(&format!("expected {expected} value(s), got {}", values.len())));
            }
            Ok(values)
        };
        let sizes = |expected: usize| -> Result<Vec<usize>> {
            let args = args.ok_or_else(|| bad("missing arguments"))?;
            let values = args
                .split([',', 'x'])
                .map(|v| v.trim().parse::<usize>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| bad(&e.to_string()))?;
            if values.len() != expected {
                return Err(bad(&format!("expected {expected} value(s), got {}", values.len())));
            }
            Ok(values)
        };
        let one_or = |default: f64| -> Result<f64> {
            match args {
                None => Ok(default),
                Some(_) => Ok(numbers(1)?[0]),
            }
        };

        let transform = match name.to_ascii_lowercase().as_str() {
            "rotate" => Self::Rotate {
                degrees: numbers(1)?[0],
            },
            "skew" => {
                let args = args.ok_or_else(|| bad("missing arguments"))?;
                let (deg, axis) = match args.split_once(',') {
                    Some((deg, axis)) => (deg, axis.trim()),
                    None => (args, "h"),
                };
                let axis = match axis {
                    "h" | "horizontal" => Axis::Horizontal,
                    "v" | "vertical" => Axis::Vertical,
                    other => return Err(bad(&format!("unknown axis '{other}'"))),
                };
                Self::Skew {
                    degrees: deg.trim().parse().map_err(|_| bad("bad angle"))?,
                    axis,
                }
            }
            "crop" => {
                let v = sizes(4)?;
                Self::Crop {
                    x: v[0],
                    y: v[1],
                    width: v[2],
                    height: v[3],
                }
            }
            "resize" => {
                let v = sizes(2)?;
                Self::Resize {
                    width: v[0],
                    height: v[1],
                }
            }
            "blur" => Self::Blur {
                radius: one_or(2.0)?,
            },
            "sharpen" => Self::Sharpen,
            "emboss" => Self::Emboss,
            "vignette" => Self::Vignette {
                intensity: one_or(0.5)?,
            },
            "brightness" => Self::Brightness(numbers(1)?[0]),
            "contrast" => Self::Contrast(numbers(1)?[0]),
            "exposure" => Self::Exposure(numbers(1)?[0]),
            "highlights" => Self::Highlights(numbers(1)?[0]),
            "gray" | "grey" | "grayscale" => Self::Grayscale,
            "sepia" => Self::Sepia,
            "warm" | "warmth" => Self::Warmth,
            "cool" => Self::Cool,
            other => return Err(bad(&format!("unknown operation '{other}'"))),
        };
        Ok(transform)
    }
}

//=============================================================================
// Pipeline
//=============================================================================

/// Ordered list of transforms applied stage by stage.
///
/// # Example
///
/// ```
/// use image_eval::edit::{EditPipeline, Transform};
/// use image_eval::{PixelBuffer, Precision};
///
/// let input = PixelBuffer::uniform(40, 30, 3, Precision::U8, 100.0)?;
/// let output = EditPipeline::new()
///     .with(Transform::Brightness(1.5))
///     .with(Transform::Rotate { degrees: 90.0 })
///     .apply(&input)?;
/// assert_eq!((output.width(), output.height()), (30, 40));
/// assert_eq!(output.sample(0, 0, 0), Some(150.0));
/// # Ok::<(), image_eval::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditPipeline {
    transforms: Vec<Transform>,
}

impl EditPipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform.
    pub fn push(&mut self, transform: Transform) -> &mut Self {
        self.transforms.push(transform);
        self
    }

    /// Builder form of [`Self::push`].
    #[must_use]
    pub fn with(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Transforms in insertion order.
    #[must_use]
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Whether the pipeline has no transforms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transforms in execution order: geometry, filters, tone.
    #[must_use]
    pub fn ordered(&self) -> Vec<&Transform> {
        let mut ordered: Vec<&Transform> = self.transforms.iter().collect();
        ordered.sort_by_key(|t| t.stage());
        ordered
    }

    /// Apply every transform to a copy of `buffer`.
    pub fn apply(&self, buffer: &PixelBuffer) -> Result<PixelBuffer> {
        let mut current = buffer.clone();
        for transform in self.ordered() {
            current = apply(&current, transform)?;
            debug!(%transform, shape = %current.shape(), "applied transform");
        }
        Ok(current)
    }
}

impl FromIterator<Transform> for EditPipeline {
    fn from_iter<I: IntoIterator<Item = Transform>>(iter: I) -> Self {
        Self {
            transforms: iter.into_iter().collect(),
        }
    }
}
