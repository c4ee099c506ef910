//! # catprint
//!
//! Command-line front end for GB and MXW01 cat printers.
//!
//! ```bash
//! # List nearby printers
//! catprint scan
//!
//! # Battery and status of the configured (or first) printer
//! catprint status
//!
//! # Print an image, resized to 384 dots
//! catprint print photo.png --dither atkinson --intensity 90
//!
//! # Write the dithered result to a PNG instead of printing
//! catprint print photo.png --preview preview.png
//! ```
//!
//! Defaults come from the environment or a `.env` file; see [`config`].

mod config;
mod validation;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use catprinter::{CatPrinter, PrintOptions, PrintProgress, PrintState};
use image_processor::{DitherMethod, PAPER_WIDTH};

use crate::config::AppConfig;

/// catprint - thermal cat printer utility
#[derive(Parser, Debug)]
#[command(name = "catprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer MAC address, CoreBluetooth UUID or advertised name
    #[arg(long, global = true)]
    address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for nearby printers
    Scan {
        /// Scan duration in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show detected family, status and battery level
    Status,
    /// Print an image file
    Print {
        /// Image to print (any format the image crate reads)
        image: PathBuf,

        /// Darkness in percent (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        intensity: Option<u8>,

        /// threshold, floyd-steinberg, atkinson, halftone or none
        #[arg(long)]
        dither: Option<DitherMethod>,

        /// Gray level below which pixels are inked (threshold dithering)
        #[arg(long)]
        threshold: Option<u8>,

        /// Do not rotate the image 180 degrees
        #[arg(long)]
        no_rotate: bool,

        /// Write the dithered image to this PNG and skip printing
        #[arg(long, value_name = "FILE")]
        preview: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let target = cli.address.unwrap_or_else(|| config.printer_address.clone());

    match cli.command {
        Commands::Scan { timeout } => {
            let timeout = timeout
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.scan_timeout());
            let devices = CatPrinter::scan(timeout).await?;
            if devices.is_empty() {
                println!("No printers found");
            }
            for device in devices {
                println!("{}\t{}", device.id, display_name(&device.name));
            }
        }
        Commands::Status => {
            let mut printer = connect(&config, &target).await?;
            let result = show_status(&printer).await;
            printer.disconnect().await?;
            result?;
        }
        Commands::Print {
            image,
            intensity,
            dither,
            threshold,
            no_rotate,
            preview,
        } => {
            let mut options = config.print_options();
            if let Some(intensity) = intensity {
                options = options.with_intensity(intensity);
            }
            if let Some(dither) = dither {
                options = options.with_dither(dither);
            }
            if let Some(threshold) = threshold {
                options = options.with_threshold(threshold);
            }
            if no_rotate {
                options = options.with_rotate_print(false);
            }

            let raster = load_raster(&image)?;
            match preview {
                Some(path) => {
                    image_processor::preview(&raster, options.dither, options.threshold)
                        .save(&path)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Saved preview to {}", path.display());
                }
                None => print_raster(&config, &target, &raster, &options).await?,
            }
        }
    }

    Ok(())
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(unnamed)" } else { name }
}

async fn connect(config: &AppConfig, target: &str) -> anyhow::Result<CatPrinter> {
    let mut printer = CatPrinter::new().with_scan_timeout(config.scan_timeout());
    let family = printer
        .connect(target)
        .await
        .context("failed to connect to printer")?;
    tracing::info!(family = %family, "Connected");
    Ok(printer)
}

async fn show_status(printer: &CatPrinter) -> anyhow::Result<()> {
    let status = printer.get_status().await?;
    let battery = printer.get_battery_level().await?;
    if let Some(family) = printer.family() {
        println!("Family:      {family}");
    }
    println!("State:       {:?}", status.state);
    println!("Battery:     {battery}%");
    if let Some(temperature) = status.temperature {
        println!("Temperature: {temperature}");
    }
    if let Some(code) = status.error_code {
        println!("Error code:  {code}");
    }
    Ok(())
}

fn load_raster(path: &Path) -> anyhow::Result<image::RgbaImage> {
    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(image_processor::fit_to_width(&img, PAPER_WIDTH))
}

async fn print_raster(
    config: &AppConfig,
    target: &str,
    raster: &image::RgbaImage,
    options: &PrintOptions,
) -> anyhow::Result<()> {
    let mut printer = connect(config, target).await?;

    let mut last_state = PrintState::Idle;
    let result = printer
        .print_image_with_progress(raster, options, |progress: PrintProgress| {
            if progress.state != last_state {
                tracing::info!(state = %progress.state, percent = progress.percent, "Printing");
                last_state = progress.state;
            }
        })
        .await;

    printer.disconnect().await?;
    result?;
    println!("Printed {}x{} image", raster.width(), raster.height());
    Ok(())
}
