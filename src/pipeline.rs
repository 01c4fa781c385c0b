//! Sprite pass orchestration
//!
//! Ties the stages together: select stylesheets, extract and register
//! references, group and pack jobs, rewrite stylesheets, resolve fixup
//! markers. All collaborators arrive through [`SpritePass`] construction;
//! nothing here reaches for process-global state, so two passes with
//! different configurations can run side by side.

use crate::config::SpriteConfig;
use crate::engine::{PackEngine, ShelfPacker};
use crate::extract::extract_stylesheet;
use crate::fileset::{FileEntry, FileSet};
use crate::fixup::{resolve_fixup_markers, MarkerRule};
use crate::group::group_sprite_jobs;
use crate::pack::pack_sprite_jobs;
use crate::registry::{ImageReference, ImageRegistry, Registration};
use crate::report::{BuildLog, SpriteError};
use crate::rewrite::{CssRewriter, FixSelectorMap};
use crate::stylesheet::Stylesheet;
use std::sync::Arc;

/// One generated sheet, as reported to the caller.
#[derive(Debug, Clone)]
pub struct SheetSummary {
    pub path: String,
    pub images: usize,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

/// What a pass did.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub sheets: Vec<SheetSummary>,
    pub stylesheets_rewritten: usize,
    pub errors: usize,
}

/// A configured sprite pass.
pub struct SpritePass {
    config: SpriteConfig,
    engine: Arc<dyn PackEngine>,
    marker: MarkerRule,
}

struct SheetState {
    path: String,
    ast: Stylesheet,
}

impl SpritePass {
    /// A pass with the built-in shelf packer and default fixup marker.
    pub fn new(config: SpriteConfig) -> Self {
        let engine: Arc<dyn PackEngine> = Arc::new(ShelfPacker::new(config.max_sheet_width));
        Self { config, engine, marker: MarkerRule::png_fix_default() }
    }

    /// Substitute a different packing engine.
    pub fn with_engine(mut self, engine: Arc<dyn PackEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Substitute a different fixup marker syntax.
    pub fn with_marker(mut self, marker: MarkerRule) -> Self {
        self.marker = marker;
        self
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    /// Run the pass over a file set, mutating it in place.
    pub fn run(&self, files: &mut FileSet, log: &mut BuildLog) -> PassSummary {
        let patterns = self.config.file_patterns();
        let stylesheet_paths: Vec<String> = files
            .paths()
            .into_iter()
            .filter(|p| patterns.iter().any(|pat| pat.matches(p)))
            .collect();

        // Stage 1: parse stylesheets, extract candidates, register images.
        let mut registry = ImageRegistry::new();
        let mut sheets_in_play: Vec<SheetState> = Vec::new();
        for path in stylesheet_paths {
            let Some(entry) = files.get(&path) else { continue };
            let Some(text) = entry.text() else {
                log.error(&SpriteError::StylesheetParse {
                    path: path.clone(),
                    message: "not valid UTF-8".to_string(),
                });
                continue;
            };
            let ast = match Stylesheet::parse(text) {
                Ok(ast) => ast,
                Err(e) => {
                    log.error(&SpriteError::StylesheetParse {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let references = extract_stylesheet(text, &path, files, &self.config, log);
            if references.is_empty() {
                continue;
            }
            for reference in references {
                let image_path = reference.path.clone();
                if let Registration::Conflict(_) =
                    registry.register(ImageReference::from_resolved(reference, &path))
                {
                    log.error(&SpriteError::CrossFileConflict {
                        path: image_path,
                        referrer: path.clone(),
                    });
                }
            }
            sheets_in_play.push(SheetState { path, ast });
        }

        // Stage 2: pack.
        let jobs = group_sprite_jobs(&registry, &self.config);
        let packed = pack_sprite_jobs(
            &jobs,
            &mut registry,
            files,
            &self.engine,
            self.config.pack_timeout(),
            log,
        );

        let mut summary = PassSummary::default();
        for sheet in &packed {
            log.info(format!(
                "generated sprite sheet {} with {} images, {}x{}, {} bytes",
                sheet.path,
                sheet.placements.len(),
                sheet.width,
                sheet.height,
                sheet.size_bytes
            ));
            summary.sheets.push(SheetSummary {
                path: sheet.path.clone(),
                images: sheet.placements.len(),
                width: sheet.width,
                height: sheet.height,
                size_bytes: sheet.size_bytes,
            });
            files.add(FileEntry::added(sheet.path.clone(), sheet.image.clone()));
        }

        // Stage 3: rewrite stylesheets against the packed sheets.
        let mut fix_map = FixSelectorMap::new();
        let mut updates: Vec<(String, String)> = Vec::new();
        {
            let rewriter = CssRewriter::new(files, &self.config, &registry, &packed);
            for state in &mut sheets_in_play {
                let changed =
                    rewriter.rewrite_stylesheet(&mut state.ast, &state.path, &mut fix_map, log);
                if changed {
                    updates.push((state.path.clone(), state.ast.to_css()));
                }
            }
        }
        summary.stylesheets_rewritten = updates.len();
        for (path, text) in updates {
            if let Some(entry) = files.get_mut(&path) {
                entry.set_text(text);
            }
        }

        // Stage 4: resolve legacy fixup markers everywhere else.
        resolve_fixup_markers(files, &self.marker, &fix_map, &self.config.exclude);

        summary.errors = log.error_count();
        summary
    }
}
