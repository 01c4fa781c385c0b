//! Stylesheet rewriting
//!
//! Walks the parsed rule tree and retargets sprite-eligible declarations at
//! their packed sheet: the `url()` is swapped for a relative reference to the
//! sheet, a `background-position` pins the placement, and on high-density
//! sheets a `background-size` scales the sheet back to CSS pixels. A rule
//! must pass validation first; a rejected rule is reported and left
//! byte-identical.
//!
//! Rules already visited are tracked in a side-table keyed by [`RuleId`], so
//! a rule reachable twice (or a tree processed twice) is never rewritten
//! twice.

use crate::config::SpriteConfig;
use crate::extract::{css_url_regex, resolve_reference, Resolution};
use crate::fileset::FileSet;
use crate::pack::PackedSprite;
use crate::path;
use crate::registry::ImageRegistry;
use crate::report::{BuildLog, SpriteError};
use crate::stylesheet::{Declaration, Rule, RuleId, Stylesheet};
use std::collections::{HashMap, HashSet};

/// Selectors collected per fixed-up image, feeding the legacy fixup stage.
#[derive(Debug, Default)]
pub struct FixSelectorMap {
    by_image: HashMap<String, Vec<String>>,
}

impl FixSelectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the selectors of a rule that styles `image_path`.
    pub fn record(&mut self, image_path: &str, selectors: &[String]) {
        let entry = self.by_image.entry(image_path.to_string()).or_default();
        for selector in selectors {
            if !entry.contains(selector) {
                entry.push(selector.clone());
            }
        }
    }

    pub fn selectors_for(&self, image_path: &str) -> &[String] {
        self.by_image.get(image_path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_image.is_empty()
    }
}

/// One sprite-eligible declaration found in a rule.
struct EligibleDecl<'a> {
    decl_idx: usize,
    image_path: String,
    sheet: &'a PackedSprite,
}

fn is_background_family(property: &str) -> bool {
    property.eq_ignore_ascii_case("background") || property.eq_ignore_ascii_case("background-image")
}

/// `-Npx` position component; zero stays a bare `0`.
fn position_value(sheet_px: u32, dpr: u32) -> String {
    let css_px = (sheet_px as f64 / dpr as f64).round() as i64;
    if css_px == 0 {
        "0".to_string()
    } else {
        format!("-{}px", css_px)
    }
}

fn scaled_px(sheet_px: u32, dpr: u32) -> i64 {
    (sheet_px as f64 / dpr as f64).round() as i64
}

/// Rewrites stylesheets against the packed sheets of one pass.
pub struct CssRewriter<'a> {
    files: &'a FileSet,
    config: &'a SpriteConfig,
    registry: &'a ImageRegistry,
    sheets: HashMap<&'a str, &'a PackedSprite>,
}

impl<'a> CssRewriter<'a> {
    pub fn new(
        files: &'a FileSet,
        config: &'a SpriteConfig,
        registry: &'a ImageRegistry,
        sheets: &'a [PackedSprite],
    ) -> Self {
        Self {
            files,
            config,
            registry,
            sheets: sheets.iter().map(|s| (s.path.as_str(), s)).collect(),
        }
    }

    /// Rewrite every eligible rule in one stylesheet. Returns whether
    /// anything changed.
    pub fn rewrite_stylesheet(
        &self,
        sheet: &mut Stylesheet,
        stylesheet_path: &str,
        fix_map: &mut FixSelectorMap,
        log: &mut BuildLog,
    ) -> bool {
        let mut seen: HashSet<RuleId> = HashSet::new();
        let mut changed = false;
        for rule in &mut sheet.rules {
            changed |= self.rewrite_rule(rule, stylesheet_path, &mut seen, fix_map, log);
        }
        changed
    }

    fn rewrite_rule(
        &self,
        rule: &mut Rule,
        stylesheet_path: &str,
        seen: &mut HashSet<RuleId>,
        fix_map: &mut FixSelectorMap,
        log: &mut BuildLog,
    ) -> bool {
        let mut changed = false;
        if seen.insert(rule.id) {
            changed |= self.rewrite_declarations(rule, stylesheet_path, fix_map, log);
        }
        for nested in &mut rule.rules {
            changed |= self.rewrite_rule(nested, stylesheet_path, seen, fix_map, log);
        }
        changed
    }

    fn rewrite_declarations(
        &self,
        rule: &mut Rule,
        stylesheet_path: &str,
        fix_map: &mut FixSelectorMap,
        log: &mut BuildLog,
    ) -> bool {
        let eligible = self.collect_eligible(rule, stylesheet_path);
        if eligible.is_empty() {
            return false;
        }
        if !self.validate_rule(rule, &eligible, stylesheet_path, log) {
            return false;
        }

        // Record selectors for every image the rule styles; the fixup stage
        // consults this map for the paths its markers name.
        let selectors = rule.selectors();
        for decl in &eligible {
            fix_map.record(&decl.image_path, &selectors);
        }

        // Stale position/size declarations from a previous hand-written
        // layout would fight the ones we insert.
        let removed: Vec<usize> = rule
            .declarations
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.property.eq_ignore_ascii_case("background-position")
                    || d.property.eq_ignore_ascii_case("background-size")
            })
            .map(|(i, _)| i)
            .collect();
        for &idx in removed.iter().rev() {
            rule.declarations.remove(idx);
        }
        let shift = |idx: usize| idx - removed.iter().filter(|&&r| r < idx).count();

        // Insert from the back so earlier indices stay valid.
        let mut ordered = eligible;
        ordered.sort_by_key(|d| d.decl_idx);
        for decl in ordered.iter().rev() {
            let idx = shift(decl.decl_idx);
            let entry = match self.registry.get(&decl.image_path) {
                Some(entry) => entry,
                None => continue,
            };
            let placement = match entry.placement {
                Some(p) => p,
                None => continue,
            };
            let sheet = decl.sheet;

            // 1x images under a global downscale behave like high-density
            // ones: the sheet is larger than its CSS size.
            let dpr = if entry.dpr != 1 {
                entry.dpr
            } else {
                ((1.0 / self.config.effective_scale()).round() as u32).max(1)
            };

            let relative = path::relative_reference(&sheet.path, stylesheet_path);
            let replacement = format!("url({})", relative);
            let value = &rule.declarations[idx].value;
            let new_value = css_url_regex()
                .replace(value, regex::NoExpand(&replacement))
                .into_owned();
            rule.declarations[idx].value = new_value;

            if dpr != 1 {
                rule.declarations.insert(
                    idx + 1,
                    Declaration::new(
                        "background-size",
                        format!("{}px {}px", scaled_px(sheet.width, dpr), scaled_px(sheet.height, dpr)),
                    ),
                );
            }
            rule.declarations.insert(
                idx + 1,
                Declaration::new(
                    "background-position",
                    format!(
                        "{} {}",
                        position_value(placement.x, dpr),
                        position_value(placement.y, dpr)
                    ),
                ),
            );
        }
        true
    }

    /// Find declarations whose url resolves to a packed, placed image.
    fn collect_eligible(&self, rule: &Rule, stylesheet_path: &str) -> Vec<EligibleDecl<'a>> {
        let mut out = Vec::new();
        for (decl_idx, decl) in rule.declarations.iter().enumerate() {
            let Some(caps) = css_url_regex().captures(&decl.value) else { continue };
            let url = &caps[1];
            let resolved =
                match resolve_reference(url, stylesheet_path, self.files, self.config) {
                    Resolution::Resolved(r) => r,
                    _ => continue,
                };
            if !resolved.pack_requested {
                continue;
            }
            let Some(entry) = self.registry.get(&resolved.path) else { continue };
            if entry.placement.is_none() {
                continue;
            }
            let Some(&sheet) = self.sheets.get(entry.sprite_target.as_str()) else { continue };
            out.push(EligibleDecl { decl_idx, image_path: resolved.path, sheet });
        }
        out
    }

    /// The three rejection rules. Any failure reports and vetoes the whole
    /// rule.
    fn validate_rule(
        &self,
        rule: &Rule,
        eligible: &[EligibleDecl<'_>],
        stylesheet_path: &str,
        log: &mut BuildLog,
    ) -> bool {
        let selector = rule.selectors().join(", ");

        // Eligible urls may only sit on background / background-image.
        for decl in eligible {
            let property = &rule.declarations[decl.decl_idx].property;
            if !is_background_family(property) {
                log.error(&SpriteError::DisallowedProperty {
                    file: stylesheet_path.to_string(),
                    property: property.clone(),
                });
                return false;
            }
        }

        // The rule's background declarations must reference at most one
        // image between them.
        let mut url_count = 0;
        for decl in &rule.declarations {
            if is_background_family(&decl.property) {
                url_count += css_url_regex().captures_iter(&decl.value).count();
            }
        }
        if url_count > 1 {
            log.error(&SpriteError::MultipleBackground {
                file: stylesheet_path.to_string(),
                selector,
            });
            return false;
        }

        // Tiled backgrounds cannot come from a sprite sheet. The last
        // repeat-bearing declaration wins, matching the cascade.
        let mut tiled = false;
        for decl in &rule.declarations {
            let is_repeat_carrier = decl.property.eq_ignore_ascii_case("background")
                || decl.property.eq_ignore_ascii_case("background-repeat");
            if !is_repeat_carrier {
                continue;
            }
            let has_repeat = decl
                .value
                .split(|c: char| c.is_whitespace() || c == ',')
                .any(|word| matches!(word, "repeat" | "repeat-x" | "repeat-y"));
            if decl.property.eq_ignore_ascii_case("background-repeat") || has_repeat {
                tiled = has_repeat;
            }
        }
        if tiled {
            log.error(&SpriteError::TiledBackground {
                file: stylesheet_path.to_string(),
                selector,
            });
            return false;
        }

        true
    }
}
