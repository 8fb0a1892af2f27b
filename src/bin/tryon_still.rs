use clap::Parser;
use colored::*;
use image::ImageReader;
use rusty_jewels::detector::{FaceMeshDetector, LandmarkDetector};
use rusty_jewels::segmentation::{segment_or_skip, SelfieSegmenter};
use rusty_jewels::{AppConfig, JewelryAsset, JewelryKind, TryOnSession};
use std::path::PathBuf;

/// Runs the try-on pipeline once on a still photo.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input photo
    image: PathBuf,

    /// Earring sprite (PNG with alpha)
    #[arg(long)]
    earring: Option<PathBuf>,

    /// Necklace sprite (PNG with alpha)
    #[arg(long)]
    necklace: Option<PathBuf>,

    /// Where to write the result
    #[arg(short, long, default_value = "tryon.png")]
    output: PathBuf,

    #[arg(long, default_value = rusty_jewels::config::DEFAULT_PATH)]
    config: PathBuf,

    /// Draw anchor markers
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    println!("Loading {:?}", args.image);
    let frame = ImageReader::open(&args.image)?.decode()?.to_rgb8();

    let mut detector = FaceMeshDetector::from_config(&config.models);
    let Some(landmarks) = detector.detect(&frame)? else {
        println!("{}", "No face found.".red());
        return Ok(());
    };
    println!("Found {} landmarks", landmarks.len());

    // Synchronous here; the live app runs this on the mask worker.
    let mask = SelfieSegmenter::from_config(&config.models)
        .and_then(|mut segmenter| segment_or_skip(&mut segmenter, &frame));
    if mask.is_none() {
        println!("{}", "No segmentation mask, occlusion skipped.".yellow());
    }

    let mut session = TryOnSession::from_config(&config);
    session.set_show_debug(args.debug);
    if let Some(path) = &args.earring {
        session.wear(JewelryKind::Earrings, Some(JewelryAsset::load(path)?));
    }
    if let Some(path) = &args.necklace {
        session.wear(JewelryKind::Necklace, Some(JewelryAsset::load(path)?));
    }

    let (output, report) = session.process_frame(&frame, Some(&landmarks), mask.as_ref());
    println!(
        "Face shape: {} | items drawn: {} | occlusion: {:?}",
        report.face_shape.label(),
        report.items_drawn,
        report.occlusion
    );

    output.save(&args.output)?;
    println!("{}", format!("Saved {}", args.output.display()).green());
    Ok(())
}
