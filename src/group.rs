//! Sprite job grouping
//!
//! Partitions the registry into one packing job per target sheet. The target
//! path already encodes the density tier (`@Nx` suffix), so grouping by
//! target alone keeps densities apart.

use crate::config::SpriteConfig;
use crate::registry::ImageRegistry;
use std::collections::BTreeMap;

/// One unit of packing work: all images destined for a single sheet.
#[derive(Debug, Clone)]
pub struct SpriteJob {
    /// Project path of the sheet to produce
    pub target: String,
    pub dpr: u32,
    /// Registry indices of the member images, in registration order
    pub entries: Vec<usize>,
    /// Padding between images, already adjusted for density and scale
    pub padding: u32,
}

/// Padding in sheet pixels. High-density sheets space images out
/// proportionally; 1x sheets compensate for a global downscale so the gap
/// holds after the stylesheet divides positions back down.
pub fn adjusted_padding(padding: u32, scale: f64, dpr: u32) -> u32 {
    if dpr == 1 {
        (padding as f64 / scale).round() as u32
    } else {
        padding * dpr
    }
}

/// Group every pack-requested image into per-target jobs, in deterministic
/// target order.
pub fn group_sprite_jobs(registry: &ImageRegistry, config: &SpriteConfig) -> Vec<SpriteJob> {
    let mut jobs: BTreeMap<String, SpriteJob> = BTreeMap::new();

    for (idx, entry) in registry.iter() {
        if !entry.pack_requested {
            continue;
        }
        jobs.entry(entry.sprite_target.clone())
            .or_insert_with(|| SpriteJob {
                target: entry.sprite_target.clone(),
                dpr: entry.dpr,
                entries: Vec::new(),
                padding: adjusted_padding(config.padding, config.effective_scale(), entry.dpr),
            })
            .entries
            .push(idx);
    }

    jobs.into_values().collect()
}
