//! image-eval CLI - image comparison and analysis tool

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use image_eval::Transform;
use tracing_subscriber::EnvFilter;

mod commands;

/// Compare, inspect and edit images.
#[derive(Parser)]
#[command(name = "image-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a candidate image against a reference
    Compare(CompareArgs),

    /// Show single-image statistics
    Inspect {
        /// Image to inspect
        image: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Apply editing transforms to an image
    Edit {
        /// Input image
        input: PathBuf,

        /// Output image (format from extension)
        output: PathBuf,

        /// Transform, e.g. brightness=1.2, rotate=90, crop=0,0,50,50, gray
        #[arg(long = "op", required = true)]
        ops: Vec<Transform>,
    },
}

#[derive(Args)]
pub struct CompareArgs {
    /// Reference image
    reference: PathBuf,

    /// Candidate image
    candidate: PathBuf,

    /// Analysis config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the metric table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Save the edge difference map (PNG)
    #[arg(long)]
    edge_map: Option<PathBuf>,

    /// Save the SSIM map (PNG)
    #[arg(long)]
    ssim_map: Option<PathBuf>,

    /// Save the noise difference map (PNG)
    #[arg(long)]
    noise_map: Option<PathBuf>,

    /// Downscale both images so neither side exceeds this many pixels
    #[arg(long)]
    max_dim: Option<usize>,

    /// Resize the candidate to the reference dimensions when they differ
    #[arg(long)]
    resize_candidate: bool,

    /// Fail if PSNR is below this (dB)
    #[arg(long)]
    min_psnr: Option<f64>,

    /// Fail if SSIM is below this
    #[arg(long)]
    min_ssim: Option<f64>,

    /// Fail if the artifact score is above this
    #[arg(long)]
    max_artifact: Option<f64>,

    /// Only print failures
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Inspect { image, json } => commands::inspect::run(image, json),
        Commands::Edit { input, output, ops } => commands::edit::run(input, output, ops),
    }
}
