//! Packing engine seam
//!
//! The pipeline hands a [`PackRequest`] to a [`PackEngine`] and gets back a
//! composed sheet with per-image placements. The built-in [`ShelfPacker`]
//! covers the normal case; tests and embedders can substitute their own
//! engine through the trait.

use image::{GenericImage, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// Where one image landed on its sheet, in sheet pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One input image for a packing job.
#[derive(Debug, Clone)]
pub struct PackSource {
    /// Project path; doubles as the placement key in the output
    pub path: String,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

/// A packing job: images plus spacing.
#[derive(Debug, Clone)]
pub struct PackRequest {
    pub sources: Vec<PackSource>,
    pub padding: u32,
}

/// A composed sheet.
#[derive(Debug, Clone)]
pub struct PackOutput {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded sheet
    pub image: Vec<u8>,
    /// Placement per source path
    pub placements: HashMap<String, Placement>,
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("packing request contains no images")]
    EmptyRequest,
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode sprite sheet: {0}")]
    Encode(#[from] image::ImageError),
}

/// Anything that can turn a set of images into a placed sheet.
pub trait PackEngine: Send + Sync {
    fn pack(&self, request: &PackRequest) -> Result<PackOutput, PackError>;
}

/// Shelf packer: images sorted by height land left to right in rows capped
/// at `max_row_width`. Simple, deterministic, and tight enough for icon
/// sheets.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    pub max_row_width: u32,
}

impl Default for ShelfPacker {
    fn default() -> Self {
        Self { max_row_width: 1024 }
    }
}

impl ShelfPacker {
    pub fn new(max_row_width: u32) -> Self {
        Self { max_row_width: max_row_width.max(1) }
    }
}

struct Shelf {
    y: u32,
    height: u32,
    used: u32,
}

impl PackEngine for ShelfPacker {
    fn pack(&self, request: &PackRequest) -> Result<PackOutput, PackError> {
        if request.sources.is_empty() {
            return Err(PackError::EmptyRequest);
        }
        let padding = request.padding;

        let mut decoded: Vec<(&str, RgbaImage)> = Vec::with_capacity(request.sources.len());
        for source in &request.sources {
            let img = image::load_from_memory(&source.data)
                .map_err(|e| PackError::Decode { path: source.path.clone(), source: e })?
                .to_rgba8();
            decoded.push((source.path.as_str(), img));
        }

        // Tallest first; ties broken by path for determinism.
        let mut order: Vec<usize> = (0..decoded.len()).collect();
        order.sort_by(|&a, &b| {
            decoded[b]
                .1
                .height()
                .cmp(&decoded[a].1.height())
                .then_with(|| decoded[a].0.cmp(decoded[b].0))
        });

        let mut shelves: Vec<Shelf> = Vec::new();
        let mut placements: HashMap<String, Placement> = HashMap::new();
        let mut sheet_width = 0u32;
        let mut next_y = 0u32;

        for &idx in &order {
            let (path, img) = &decoded[idx];
            let (w, h) = (img.width(), img.height());
            let padded_w = w + padding;
            let padded_h = h + padding;

            let slot = shelves
                .iter_mut()
                .find(|s| padded_h <= s.height && s.used + padded_w <= self.max_row_width);
            let (x, y) = match slot {
                Some(shelf) => {
                    let x = shelf.used;
                    shelf.used += padded_w;
                    sheet_width = sheet_width.max(shelf.used);
                    (x, shelf.y)
                }
                None => {
                    // Oversized images still get a shelf of their own.
                    let y = next_y;
                    shelves.push(Shelf { y, height: padded_h, used: padded_w });
                    next_y += padded_h;
                    sheet_width = sheet_width.max(padded_w);
                    (0, y)
                }
            };
            placements.insert(path.to_string(), Placement { x, y, width: w, height: h });
        }

        // Trailing padding never counts toward the sheet dimensions.
        let width = sheet_width.saturating_sub(padding).max(1);
        let height = next_y.saturating_sub(padding).max(1);

        let mut sheet = RgbaImage::new(width, height);
        for (path, img) in &decoded {
            let placement = placements[*path];
            sheet
                .copy_from(img, placement.x, placement.y)
                .map_err(PackError::Encode)?;
        }

        let mut buf = Vec::new();
        sheet.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

        Ok(PackOutput { width, height, image: buf, placements })
    }
}
