//! Jewelry assets, the per-kind selection slots, and the on-disk catalog.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};

/// Items in a category that does not say otherwise.
pub const DEFAULT_CATEGORY_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JewelryKind {
    Earrings,
    Necklace,
}

impl JewelryKind {
    /// Categories whose name mentions earrings hold earrings; everything
    /// else is worn at the neck.
    pub fn for_category(name: &str) -> Self {
        if name.contains("earrings") {
            JewelryKind::Earrings
        } else {
            JewelryKind::Necklace
        }
    }
}

/// A decoded jewelry sprite. The core only looks at its dimensions.
#[derive(Debug, Clone)]
pub struct JewelryAsset {
    name: String,
    image: RgbaImage,
}

impl JewelryAsset {
    pub fn from_image(name: impl Into<String>, image: RgbaImage) -> Result<Self> {
        let name = name.into();
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidAsset(format!("{} has zero size", name)));
        }
        Ok(Self { name, image })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        let asset = Self::from_image(path.display().to_string(), image)?;
        info!("Loaded {} ({}x{})", asset.name, asset.width(), asset.height());
        Ok(asset)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Height over width.
    pub fn aspect(&self) -> f32 {
        self.image.height() as f32 / self.image.width() as f32
    }
}

/// What is currently being worn, one optional asset per kind.
#[derive(Debug, Clone, Default)]
pub struct JewelrySlots {
    earrings: Option<JewelryAsset>,
    necklace: Option<JewelryAsset>,
}

impl JewelrySlots {
    pub fn get(&self, kind: JewelryKind) -> Option<&JewelryAsset> {
        match kind {
            JewelryKind::Earrings => self.earrings.as_ref(),
            JewelryKind::Necklace => self.necklace.as_ref(),
        }
    }

    pub fn set(&mut self, kind: JewelryKind, asset: Option<JewelryAsset>) {
        match kind {
            JewelryKind::Earrings => self.earrings = asset,
            JewelryKind::Necklace => self.necklace = asset,
        }
    }

    pub fn clear(&mut self) {
        self.earrings = None;
        self.necklace = None;
    }

    pub fn is_empty(&self) -> bool {
        self.earrings.is_none() && self.necklace.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default = "default_category_len")]
    pub count: usize,
}

fn default_category_len() -> usize {
    DEFAULT_CATEGORY_LEN
}

impl CategoryConfig {
    pub fn new(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            count,
        }
    }

    pub fn kind(&self) -> JewelryKind {
        JewelryKind::for_category(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    categories: Vec<CategoryConfig>,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>, categories: Vec<CategoryConfig>) -> Self {
        Self {
            root: root.into(),
            categories,
        }
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// `<root>/<name>/<name><i>.png` for every item, numbered from 1.
    pub fn items(&self, category: &CategoryConfig) -> Vec<PathBuf> {
        (1..=category.count)
            .map(|i| {
                self.root
                    .join(&category.name)
                    .join(format!("{}{}.png", category.name, i))
            })
            .collect()
    }
}

/// Which category and item the user is currently browsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCursor {
    category: Option<usize>,
    item: Option<usize>,
}

impl CatalogCursor {
    /// Switches category. No item is selected afterwards.
    pub fn select_category<'a>(&mut self, catalog: &'a Catalog, index: usize) -> Option<&'a CategoryConfig> {
        let category = catalog.categories().get(index)?;
        self.category = Some(index);
        self.item = None;
        Some(category)
    }

    pub fn category<'a>(&self, catalog: &'a Catalog) -> Option<&'a CategoryConfig> {
        catalog.categories().get(self.category?)
    }

    pub fn item(&self) -> Option<usize> {
        self.item
    }

    /// Points at item `index` of the current category.
    pub fn select_item(&mut self, catalog: &Catalog, index: usize) -> Option<(JewelryKind, PathBuf)> {
        let category = self.category(catalog)?;
        let path = catalog.items(category).into_iter().nth(index)?;
        self.item = Some(index);
        Some((category.kind(), path))
    }

    /// Moves `delta` items, wrapping at both ends. With nothing selected yet,
    /// forward starts at the first item and backward at the last.
    pub fn step(&mut self, catalog: &Catalog, delta: isize) -> Option<(JewelryKind, PathBuf)> {
        let len = self.category(catalog)?.count as isize;
        if len == 0 {
            return None;
        }
        let next = match self.item {
            Some(i) => (i as isize + delta).rem_euclid(len),
            None if delta >= 0 => 0,
            None => len - 1,
        };
        self.select_item(catalog, next as usize)
    }
}
