use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use clap::Parser;
use colored::*;
use minifb::Key;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod args;
mod camera;
mod output;

use args::Args;
use camera::CameraSource;
use output::WindowOutput;
use rusty_jewels::autotry::{AutoTry, AutoTryEvent};
use rusty_jewels::catalog::CatalogCursor;
use rusty_jewels::config::TuningKnob;
use rusty_jewels::detector::{FaceMeshDetector, LandmarkDetector};
use rusty_jewels::export::CaptureStore;
use rusty_jewels::occlusion::OcclusionOutcome;
use rusty_jewels::segmentation::MaskWorker;
use rusty_jewels::{AppConfig, Catalog, FrameReport, JewelryAsset, JewelryKind, TryOnSession};

const TITLE: &str = "Rusty Jewels";

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "rusty_jewels=info".parse() {
        filter = filter.add_directive(d);
    }
    fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    if args.list {
        return camera::list_cameras();
    }

    // 0. Config
    let config = AppConfig::load(&args.config)?;

    // 1. Camera and window
    let mut camera = CameraSource::new(args.cam_index)?;
    let mut window = WindowOutput::new(TITLE, camera.width() as usize, camera.height() as usize)?;

    // 2. Models. Missing files degrade to "no face" / "no occlusion".
    let mut detector = FaceMeshDetector::from_config(&config.models);
    info!("Active detector: {}", detector.name());
    let mut mask_worker = MaskWorker::from_config(&config.models, &config.segmentation);

    // 3. Session and catalog
    let mut session = TryOnSession::from_config(&config);
    if args.debug {
        session.set_show_debug(true);
    }
    let catalog = Catalog::new(config.catalog.root.clone(), config.catalog.categories.clone());
    let mut cursor = CatalogCursor::default();
    if let Some(name) = &args.category {
        match catalog.categories().iter().position(|c| &c.name == name) {
            Some(index) => {
                cursor.select_category(&catalog, index);
            }
            None => warn!("Unknown category {}", name),
        }
    }
    let store = CaptureStore::new(&config.capture.output_dir)?;

    let mut mirror = args.mirror.unwrap_or(config.ui.mirror_mode);
    let mut auto_try: Option<AutoTry> = None;

    println!("{}", "Controls:".bold());
    println!("  [Left/Right] Item  [1-4] Category  [N] Clear  [S] Snapshot  [T] Try all");
    println!("  [ [ ] ] Ear size  [-/=] Neck offset  [;/'] Neck scale");
    println!("  [,/.] Position smoothing  [9/0] Ear distance smoothing");
    println!("  [D] Debug markers  [M] Mirror  [Esc] Quit");

    'frames: while window.is_open() {
        let mut frame = match camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };
        if mirror {
            image::imageops::flip_horizontal_in_place(&mut frame);
        }
        let now = Instant::now();

        // --- DETECTION ---
        let raw = detector.detect(&frame).unwrap_or_else(|e| {
            warn!("Landmark detection failed: {}", e);
            None
        });

        // --- SEGMENTATION (async, newest mask wins) ---
        mask_worker.poll();
        mask_worker.request(now, &frame);

        // --- COMPOSITE ---
        let (output, report) = session.process_frame(&frame, raw.as_ref(), mask_worker.latest());

        // --- TRY ALL ---
        match auto_try.as_mut().and_then(|run| run.tick(now)) {
            Some(AutoTryEvent::Select(i)) => wear(&mut session, cursor.select_item(&catalog, i)),
            Some(AutoTryEvent::Capture(i)) => {
                let shot = session.snapshot(&frame, mask_worker.latest());
                if shot.is_none() {
                    info!("No face for look {}, skipped", i + 1);
                }
                if let Some(run) = auto_try.as_mut() {
                    run.record(shot);
                }
            }
            Some(AutoTryEvent::Finished) => finish_try_all(auto_try.take(), &store),
            None => {}
        }

        // --- INPUT ---
        for key in window.keys_pressed() {
            match key {
                Key::Escape => break 'frames,
                Key::Right => wear(&mut session, cursor.step(&catalog, 1)),
                Key::Left => wear(&mut session, cursor.step(&catalog, -1)),
                Key::Key1 | Key::Key2 | Key::Key3 | Key::Key4 => {
                    let index = match key {
                        Key::Key1 => 0,
                        Key::Key2 => 1,
                        Key::Key3 => 2,
                        _ => 3,
                    };
                    finish_try_all(auto_try.take(), &store);
                    if let Some(category) = cursor.select_category(&catalog, index) {
                        println!("Category: {}", category.name.cyan());
                        session.clear_slots();
                    }
                }
                Key::N => session.clear_slots(),
                Key::S => match session.snapshot(&frame, mask_worker.latest()) {
                    Some(shot) => {
                        if let Err(e) = store.save_snapshot(&shot, Local::now()) {
                            warn!("Failed to save snapshot: {}", e);
                        }
                    }
                    None => println!("{}", "No face in view, snapshot skipped".yellow()),
                },
                Key::T => {
                    if auto_try.is_some() {
                        finish_try_all(auto_try.take(), &store);
                    } else if let Some(category) = cursor.category(&catalog) {
                        auto_try = AutoTry::from_config(category.count, &config.capture, now);
                    } else {
                        println!("{}", "Choose a category first".yellow());
                    }
                }
                Key::LeftBracket => nudge(&mut session, TuningKnob::EarSize, -1),
                Key::RightBracket => nudge(&mut session, TuningKnob::EarSize, 1),
                Key::Minus => nudge(&mut session, TuningKnob::NeckOffset, -1),
                Key::Equal => nudge(&mut session, TuningKnob::NeckOffset, 1),
                Key::Semicolon => nudge(&mut session, TuningKnob::NeckScale, -1),
                Key::Apostrophe => nudge(&mut session, TuningKnob::NeckScale, 1),
                Key::Comma => nudge(&mut session, TuningKnob::PositionSmoothing, -1),
                Key::Period => nudge(&mut session, TuningKnob::PositionSmoothing, 1),
                Key::Key9 => nudge(&mut session, TuningKnob::EarDistanceSmoothing, -1),
                Key::Key0 => nudge(&mut session, TuningKnob::EarDistanceSmoothing, 1),
                Key::D => session.set_show_debug(!session.show_debug()),
                Key::M => mirror = !mirror,
                _ => {}
            }
        }

        // --- WINDOW UPDATE ---
        window.set_title(&status_line(&catalog, &cursor, &report, auto_try.is_some()));
        window.show(&output)?;
    }

    finish_try_all(auto_try.take(), &store);
    Ok(())
}

/// Loads the selected item into its slot. A failed load keeps the previous item.
fn wear(session: &mut TryOnSession, selection: Option<(JewelryKind, PathBuf)>) {
    let Some((kind, path)) = selection else {
        return;
    };
    match JewelryAsset::load(&path) {
        Ok(asset) => session.wear(kind, Some(asset)),
        Err(e) => warn!("Could not load {}: {}", path.display(), e),
    }
}

fn nudge(session: &mut TryOnSession, knob: TuningKnob, steps: i32) {
    let tuning = session.tuning().nudged(knob, steps);
    session.set_tuning(tuning);
    println!("{}: {:.2}", knob.label(), session.tuning().value(knob));
}

fn finish_try_all(run: Option<AutoTry>, store: &CaptureStore) {
    let Some(mut run) = run else {
        return;
    };
    run.stop();
    match store.save_looks(&run.into_captures(), Local::now()) {
        Ok(Some(dir)) => println!("{}", format!("Looks saved to {}", dir.display()).green()),
        Ok(None) => println!("No looks captured"),
        Err(e) => warn!("Failed to save looks: {}", e),
    }
}

fn status_line(catalog: &Catalog, cursor: &CatalogCursor, report: &FrameReport, trying_all: bool) -> String {
    let category = match (cursor.category(catalog), cursor.item()) {
        (Some(c), Some(i)) => format!("{} {}/{}", c.name, i + 1, c.count),
        (Some(c), None) => c.name.clone(),
        _ => "no category".to_string(),
    };
    let face = if report.face_tracked {
        report.face_shape.label()
    } else {
        "no face"
    };
    let occlusion = match report.occlusion {
        OcclusionOutcome::Applied { .. } => "occlusion on",
        OcclusionOutcome::Skipped(_) => "occlusion off",
    };
    let mut line = format!("{} | {} | {} | {}", TITLE, category, face, occlusion);
    if trying_all {
        line.push_str(" | trying all");
    }
    line
}
