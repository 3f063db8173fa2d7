//! Inspect command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image_eval::analysis::artifacts::blockiness;
use image_eval::analysis::edges::{DEFAULT_EDGE_THRESHOLD, laplacian_variance, sobel};
use image_eval::analysis::histogram::{DEFAULT_BINS, Histogram, ToneStats};
use image_eval::analysis::noise::{NoiseConfig, estimate_gaussian_sigma, estimate_noise};
use image_eval::decode::load_buffer;
use image_eval::metrics::calculate_snr;
use image_eval::{PixelBuffer, Shape};
use serde::Serialize;

/// Single-image statistics. Windowed measures are `None` on tiny images.
#[derive(Debug, Serialize)]
struct ImageStats {
    shape: Shape,
    noise_level: Option<f64>,
    snr: Option<f64>,
    gaussian_sigma: Option<f64>,
    sharpness: Option<f64>,
    brightness: f64,
    contrast: f64,
    entropy: f64,
    blockiness: Option<f64>,
    edge_density: Option<f64>,
}

impl ImageStats {
    fn measure(buffer: &PixelBuffer) -> Result<Self> {
        let tone = ToneStats::from_buffer(buffer);
        let histogram = Histogram::from_buffer(buffer, DEFAULT_BINS)?;
        Ok(Self {
            shape: buffer.shape(),
            noise_level: estimate_noise(buffer, &NoiseConfig::default())
                .ok()
                .map(|n| n.level),
            snr: calculate_snr(buffer),
            gaussian_sigma: estimate_gaussian_sigma(buffer).ok(),
            sharpness: laplacian_variance(buffer).ok(),
            brightness: tone.brightness,
            contrast: tone.contrast,
            entropy: histogram.entropy(),
            blockiness: blockiness(buffer),
            edge_density: sobel(buffer)
                .ok()
                .map(|g| g.density(DEFAULT_EDGE_THRESHOLD)),
        })
    }
}

fn show(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

pub fn run(image: PathBuf, json: bool) -> Result<()> {
    let buffer =
        load_buffer(&image).with_context(|| format!("Failed to load: {}", image.display()))?;
    let stats = ImageStats::measure(&buffer)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} ({})", image.display(), stats.shape);
    println!("{:-<40}", "");
    println!("Noise level:    {}", show(stats.noise_level, 3));
    println!("SNR:            {} dB", show(stats.snr, 2));
    println!("Gaussian sigma: {}", show(stats.gaussian_sigma, 3));
    println!("Sharpness:      {}", show(stats.sharpness, 2));
    println!("Brightness:     {:.2}", stats.brightness);
    println!("Contrast:       {:.2}", stats.contrast);
    println!("Entropy:        {:.3} bits", stats.entropy);
    println!("Blockiness:     {}", show(stats.blockiness, 3));
    println!("Edge density:   {}", show(stats.edge_density, 4));
    Ok(())
}
