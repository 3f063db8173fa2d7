//! Conversion between image files and [`PixelBuffer`]s.
//!
//! 8-bit gray, RGB and RGBA images keep their layout. Anything else is
//! converted to RGB8 (or RGBA8 when it carries alpha) before it reaches the
//! engine, so every loaded buffer has [`Precision::U8`](crate::Precision::U8).
//!
//! # Example
//!
//! ```no_run
//! use image_eval::decode::{load_buffer, save_rgb_map};
//! use image_eval::analysis::edges::{DEFAULT_DIFF_THRESHOLD, difference_map, sobel};
//!
//! let reference = load_buffer("original.png")?;
//! let candidate = load_buffer("edited.jpg")?;
//! let map = difference_map(&sobel(&reference)?, &sobel(&candidate)?, DEFAULT_DIFF_THRESHOLD)?;
//! save_rgb_map(&map, "edges.png")?;
//! # Ok::<(), image_eval::Error>(())
//! ```

use std::path::Path;

use image::{ColorType, DynamicImage};
use imgref::ImgVec;
use rgb::RGB8;

use crate::buffer::{Channels, PixelBuffer};
use crate::error::{Error, Result};

/// Decode the image at `path`.
pub fn load_buffer(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|e| load_error(path, e))?;
    from_dynamic_image(&img).map_err(|e| load_error(path, e))
}

/// Convert an already decoded image.
pub fn from_dynamic_image(img: &DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    match img {
        DynamicImage::ImageLuma8(gray) => PixelBuffer::from_u8(gray.as_raw().clone(), width, height, 1),
        DynamicImage::ImageRgb8(rgb) => PixelBuffer::from_u8(rgb.as_raw().clone(), width, height, 3),
        DynamicImage::ImageRgba8(rgba) => PixelBuffer::from_u8(rgba.as_raw().clone(), width, height, 4),
        other if other.color().has_alpha() => {
            PixelBuffer::from_u8(other.to_rgba8().into_raw(), width, height, 4)
        }
        other => PixelBuffer::from_u8(other.to_rgb8().into_raw(), width, height, 3),
    }
}

/// Write `buffer` as an 8-bit image; the format follows the file extension.
pub fn save_buffer(buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let color = match buffer.layout() {
        Channels::Gray => ColorType::L8,
        Channels::Rgb => ColorType::Rgb8,
        Channels::Rgba => ColorType::Rgba8,
    };
    let (width, height) = dimensions(path, buffer.width(), buffer.height())?;
    image::save_buffer(path, &buffer.to_u8_vec(), width, height, color)
        .map_err(|e| load_error(path, e))
}

/// Write a heat map (edge difference, SSIM, noise variance) as RGB8.
pub fn save_rgb_map(map: &ImgVec<RGB8>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let (width, height) = dimensions(path, map.width(), map.height())?;
    let data: Vec<u8> = map.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
    image::save_buffer(path, &data, width, height, ColorType::Rgb8).map_err(|e| load_error(path, e))
}

fn dimensions(path: &Path, width: usize, height: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(load_error(path, format!("{width}x{height} is too large to encode"))),
    }
}

fn load_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::ImageLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
