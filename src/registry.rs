//! Cross-stylesheet image registry
//!
//! Deduplicates sprite references across all stylesheets in a pass. One image
//! gets one registry entry and therefore one placement, no matter how many
//! files refer to it, provided every reference agrees on the directives.

use crate::engine::Placement;
use crate::extract::ResolvedReference;
use std::collections::HashMap;

/// One registered image and the directives attached to it.
#[derive(Debug, Clone)]
pub struct ImageReference {
    /// Project path of the image file
    pub path: String,
    /// Stylesheet that first registered the image
    pub referrer: String,
    pub sprite_target: String,
    pub dpr: u32,
    pub pack_requested: bool,
    pub legacy_fix_requested: bool,
    /// Filled in by the packing stage
    pub placement: Option<Placement>,
}

impl ImageReference {
    pub fn from_resolved(resolved: ResolvedReference, referrer: &str) -> Self {
        Self {
            path: resolved.path,
            referrer: referrer.to_string(),
            sprite_target: resolved.sprite_target,
            dpr: resolved.dpr,
            pack_requested: resolved.pack_requested,
            legacy_fix_requested: resolved.legacy_fix_requested,
            placement: None,
        }
    }

    /// The directive tuple two references must agree on to coexist.
    fn directive(&self) -> (&str, u32, bool, bool) {
        (
            self.sprite_target.as_str(),
            self.dpr,
            self.pack_requested,
            self.legacy_fix_requested,
        )
    }
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First sighting of this image
    New(usize),
    /// Same image, same directives; entry index returned
    Existing(usize),
    /// Same image, differing directives; the earlier entry stands
    Conflict(usize),
}

/// All registered images, keyed by image path, in registration order.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    entries: Vec<ImageReference>,
    by_path: HashMap<String, usize>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reference: ImageReference) -> Registration {
        match self.by_path.get(&reference.path) {
            Some(&idx) => {
                if self.entries[idx].directive() == reference.directive() {
                    Registration::Existing(idx)
                } else {
                    Registration::Conflict(idx)
                }
            }
            None => {
                let idx = self.entries.len();
                self.by_path.insert(reference.path.clone(), idx);
                self.entries.push(reference);
                Registration::New(idx)
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&ImageReference> {
        self.by_path.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn entry(&self, idx: usize) -> &ImageReference {
        &self.entries[idx]
    }

    pub fn entry_mut(&mut self, idx: usize) -> &mut ImageReference {
        &mut self.entries[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ImageReference)> {
        self.entries.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
