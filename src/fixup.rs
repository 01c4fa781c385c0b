//! Legacy PNG fixup marker resolution
//!
//! Scripts that apply alpha-transparency workarounds for old IE carry
//! placeholder markers naming the images they fix, e.g.
//! `fixPng('${img/a.png,img/b.png}')`. After rewriting, this stage replaces
//! each marker with the union of CSS selectors that ended up styling those
//! images. A marker whose images collected no selectors disappears along
//! with its line, so the shipped script holds no dead calls.
//!
//! The marker syntax and its rendering are pluggable through [`MarkerRule`];
//! the default matches the `'${...}'` form.

use crate::fileset::FileSet;
use crate::rewrite::FixSelectorMap;
use regex::{Captures, Regex};

/// How to find markers and how to render their replacement.
pub struct MarkerRule {
    pattern: Regex,
    render: Box<dyn Fn(&[String]) -> String + Send + Sync>,
}

impl MarkerRule {
    /// A custom marker. The pattern's first capture group must hold the
    /// comma-separated image list; `render` receives the selector union.
    pub fn new(
        pattern: Regex,
        render: impl Fn(&[String]) -> String + Send + Sync + 'static,
    ) -> Self {
        Self { pattern, render: Box::new(render) }
    }

    /// The historical `'${img/a.png,img/b.png}'` marker, rendered as a
    /// quoted selector list.
    pub fn png_fix_default() -> Self {
        Self::new(
            Regex::new(r"'\$\{([^}']*)\}'").unwrap(),
            |selectors| format!("'{}'", selectors.join(",")),
        )
    }

    /// Resolve every marker in one text file. Returns `None` when the text
    /// holds no markers.
    pub fn resolve_text(&self, text: &str, map: &FixSelectorMap) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }

        let mut out = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            if !self.pattern.is_match(line) {
                out.push_str(line);
                continue;
            }

            let mut any_selectors = false;
            let replaced = self.pattern.replace_all(line, |caps: &Captures<'_>| {
                let mut selectors: Vec<String> = Vec::new();
                for image in caps[1].split(',') {
                    let image = image.trim();
                    if image.is_empty() {
                        continue;
                    }
                    for selector in map.selectors_for(image) {
                        if !selectors.contains(selector) {
                            selectors.push(selector.clone());
                        }
                    }
                }
                if selectors.is_empty() {
                    String::new()
                } else {
                    any_selectors = true;
                    (self.render)(&selectors)
                }
            });

            // Every marker on the line came up empty: drop the line.
            if any_selectors {
                out.push_str(&replaced);
            }
        }
        Some(out)
    }
}

/// Resolve fixup markers across the whole file set.
///
/// Pipeline-generated entries, excluded prefixes, and binary files are
/// skipped. Files whose text actually changes are marked mutated.
pub fn resolve_fixup_markers(
    files: &mut FileSet,
    rule: &MarkerRule,
    map: &FixSelectorMap,
    exclude: &[String],
) {
    let mut updates: Vec<(String, String)> = Vec::new();
    for entry in files.iter() {
        if entry.added {
            continue;
        }
        if exclude.iter().any(|prefix| entry.path.starts_with(prefix.as_str())) {
            continue;
        }
        let Some(text) = entry.text() else { continue };
        if let Some(resolved) = rule.resolve_text(text, map) {
            if resolved != text {
                updates.push((entry.path.clone(), resolved));
            }
        }
    }
    for (path, text) in updates {
        if let Some(entry) = files.get_mut(&path) {
            entry.set_text(text);
        }
    }
}
