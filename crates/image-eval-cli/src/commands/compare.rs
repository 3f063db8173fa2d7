//! Compare command.

use anyhow::{Context, Result, bail};
use image_eval::decode::{load_buffer, save_rgb_map};
use image_eval::edit::geometry::{fit_within, resize};
use image_eval::eval::helpers::assert_quality;
use image_eval::{AnalysisConfig, PixelBuffer, Thresholds, analyze};
use tracing::info;

use crate::CompareArgs;

pub fn run(args: CompareArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    config.include_maps = config.include_maps
        || args.edge_map.is_some()
        || args.ssim_map.is_some()
        || args.noise_map.is_some();
    let thresholds = override_thresholds(config.thresholds, &args);

    let reference = load_buffer(&args.reference)
        .with_context(|| format!("Failed to load reference: {}", args.reference.display()))?;
    let mut candidate = load_buffer(&args.candidate)
        .with_context(|| format!("Failed to load candidate: {}", args.candidate.display()))?;

    if args.resize_candidate
        && (candidate.width(), candidate.height()) != (reference.width(), reference.height())
    {
        info!(
            from = %candidate.shape(),
            to = %reference.shape(),
            "resizing candidate to reference dimensions"
        );
        candidate = resize(&candidate, reference.width(), reference.height())?;
    }

    let (reference, candidate) = match args.max_dim {
        Some(max_dim) => (
            fit_within(&reference, max_dim)?,
            fit_within(&candidate, max_dim)?,
        ),
        None => (reference, candidate),
    };
    check_channels(&reference, &candidate)?;

    let report = analyze(&reference, &candidate, &config).context("Comparison failed")?;

    if !args.quiet {
        print!("{}", report.summary_text());
    }

    if let Some(path) = &args.json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write JSON: {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }
    if let Some(path) = &args.csv {
        report
            .write_csv(path)
            .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
        info!(path = %path.display(), "wrote CSV metrics");
    }

    if let Some(maps) = &report.maps {
        if let Some(path) = &args.edge_map {
            save_rgb_map(&maps.edge_difference, path)?;
            info!(path = %path.display(), "wrote edge difference map");
        }
        if let Some(path) = &args.ssim_map {
            match &maps.ssim {
                Some(map) => {
                    save_rgb_map(map, path)?;
                    info!(path = %path.display(), "wrote SSIM map");
                }
                None => eprintln!("SSIM unavailable, no map written to {}", path.display()),
            }
        }
        if let Some(path) = &args.noise_map {
            save_rgb_map(&maps.noise_difference, path)?;
            info!(path = %path.display(), "wrote noise difference map");
        }
    }

    if args.min_psnr.is_some() || args.min_ssim.is_some() || args.max_artifact.is_some() {
        if let Err(e) = assert_quality(&report, &thresholds) {
            bail!("Quality check failed: {e}");
        }
        if !args.quiet {
            println!("Quality check passed");
        }
    }

    Ok(())
}

fn override_thresholds(base: Thresholds, args: &CompareArgs) -> Thresholds {
    Thresholds {
        min_psnr: args.min_psnr.unwrap_or(base.min_psnr),
        min_ssim: args.min_ssim.unwrap_or(base.min_ssim),
        max_artifact: args.max_artifact.unwrap_or(base.max_artifact),
    }
}

fn check_channels(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<()> {
    if reference.channels() != candidate.channels() {
        bail!(
            "Channel layouts differ ({} vs {}); convert one image so both are gray, RGB or RGBA",
            reference.shape(),
            candidate.shape()
        );
    }
    Ok(())
}
