//! Writes snapshots and try-all runs to the capture directory.

use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Serialize)]
struct LooksManifest {
    created: String,
    looks: Vec<String>,
}

pub struct CaptureStore {
    dir: PathBuf,
}

impl CaptureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `jewelry-<unix millis>.png`
    pub fn save_snapshot(&self, image: &RgbImage, at: DateTime<Local>) -> Result<PathBuf> {
        let path = self.dir.join(format!("jewelry-{}.png", at.timestamp_millis()));
        image.save(&path)?;
        info!("Saved snapshot to {}", path.display());
        Ok(path)
    }

    /// `looks-<timestamp>/look_<n>.png` numbered from 1, plus a `looks.json`
    /// manifest. Nothing is written for an empty run.
    pub fn save_looks(&self, looks: &[RgbImage], at: DateTime<Local>) -> Result<Option<PathBuf>> {
        if looks.is_empty() {
            return Ok(None);
        }
        let run_dir = self.dir.join(format!("looks-{}", at.format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&run_dir)?;

        let mut names = Vec::with_capacity(looks.len());
        for (i, look) in looks.iter().enumerate() {
            let name = format!("look_{}.png", i + 1);
            look.save(run_dir.join(&name))?;
            names.push(name);
        }

        let manifest = LooksManifest {
            created: at.to_rfc3339(),
            looks: names,
        };
        serde_json::to_writer_pretty(File::create(run_dir.join("looks.json"))?, &manifest)?;

        info!("Saved {} looks to {}", looks.len(), run_dir.display());
        Ok(Some(run_dir))
    }
}
