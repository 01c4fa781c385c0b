//! Sprite reference extraction
//!
//! Scans stylesheet text for `url()` references carrying the sprite query
//! parameter, resolves them against the project file set, and reads the
//! directives off the query string. Extraction works on the raw text rather
//! than the parsed tree so a stylesheet that later fails rule validation
//! still contributes its conflict diagnostics.

use crate::config::SpriteConfig;
use crate::fileset::FileSet;
use crate::path;
use crate::report::{BuildLog, SpriteError};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Matches a CSS `url(...)` and captures the bare reference, quotes stripped.
pub fn css_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\s*\(\s*['"]?\s*([^\s'"()]*)\s*['"]?\s*\)"#).unwrap()
    })
}

/// Matches the `@Nx` density suffix in an image file name, e.g. `icon@2x.png`.
pub fn dpr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\d)x\.\w+$").unwrap())
}

/// A fully resolved sprite reference: which image, which target sheet, and
/// what the query string asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    /// Project path of the referenced image
    pub path: String,
    /// Project path of the sprite sheet this image belongs to
    pub sprite_target: String,
    /// Device pixel ratio taken from the `@Nx` file-name suffix
    pub dpr: u32,
    /// Whether the sprite parameter was present
    pub pack_requested: bool,
    /// Whether the legacy PNG fixup applies to this image
    pub legacy_fix_requested: bool,
}

/// Outcome of resolving one `url()` value.
#[derive(Debug)]
pub enum Resolution {
    Resolved(ResolvedReference),
    /// Local-looking reference that matches no known file
    NotFound { path: String },
    /// Remote, data, or fragment-only reference; not our concern
    Skip,
}

/// Resolve one raw `url()` value found in `stylesheet_path`.
pub fn resolve_reference(
    url: &str,
    stylesheet_path: &str,
    files: &FileSet,
    config: &SpriteConfig,
) -> Resolution {
    if !path::is_local_url(url) {
        return Resolution::Skip;
    }

    let url = match url.split_once('#') {
        Some((head, _)) => head,
        None => url,
    };
    let (raw_path, query) = match url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (url, None),
    };
    if raw_path.is_empty() {
        return Resolution::Skip;
    }

    // Leading slash means project-root relative; anything else is relative
    // to the stylesheet's directory.
    let image_path = match raw_path.strip_prefix('/') {
        Some(rooted) => path::normalize(rooted),
        None => path::join(path::dir_name(stylesheet_path), raw_path),
    };
    if !files.contains(&image_path) {
        return Resolution::NotFound { path: image_path };
    }

    // First occurrence of a parameter wins.
    let mut params: HashMap<&str, &str> = HashMap::new();
    if let Some(query) = query {
        for pair in query.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            params.entry(key).or_insert(value);
        }
    }

    let sprite_value = params.get(config.sprite_param_name.as_str()).copied();
    let pack_requested = sprite_value.is_some();

    let dpr = dpr_regex()
        .captures(&image_path)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|&d| d > 0)
        .unwrap_or(1);

    let mut sprite_target = match sprite_value {
        Some(name) if !name.is_empty() => path::join(&config.output_dir, name),
        _ => {
            if config.group_by_css_file {
                path::strip_extension(stylesheet_path).to_string()
            } else {
                path::join(&config.output_dir, "all")
            }
        }
    };
    if dpr != 1 {
        sprite_target.push_str(&format!("@{}x", dpr));
    }
    sprite_target.push_str(".png");

    let legacy_fix_requested = match params.get(config.ie6_param_name.as_str()) {
        Some(&value) => !matches!(value, "" | "0" | "false"),
        None => config.fix_ie6_png,
    };

    Resolution::Resolved(ResolvedReference {
        path: image_path,
        sprite_target,
        dpr,
        pack_requested,
        legacy_fix_requested,
    })
}

/// Extract every sprite candidate from one stylesheet's text.
///
/// Within a single file, an image referenced twice must carry identical
/// directives; a mismatch is reported and the first occurrence wins. Only
/// references requesting packing or the legacy fixup are returned, in
/// first-seen order.
pub fn extract_stylesheet(
    text: &str,
    stylesheet_path: &str,
    files: &FileSet,
    config: &SpriteConfig,
    log: &mut BuildLog,
) -> Vec<ResolvedReference> {
    let mut seen: HashMap<String, ResolvedReference> = HashMap::new();
    let mut out = Vec::new();

    for caps in css_url_regex().captures_iter(text) {
        let url = &caps[1];
        match resolve_reference(url, stylesheet_path, files, config) {
            Resolution::Resolved(reference) => {
                if let Some(previous) = seen.get(&reference.path) {
                    if *previous != reference {
                        log.error(&SpriteError::Conflict {
                            path: reference.path.clone(),
                            referrer: stylesheet_path.to_string(),
                        });
                    }
                    continue;
                }
                seen.insert(reference.path.clone(), reference.clone());
                if reference.pack_requested || reference.legacy_fix_requested {
                    out.push(reference);
                }
            }
            Resolution::NotFound { path } => {
                log.error(&SpriteError::Resolution {
                    path,
                    referrer: stylesheet_path.to_string(),
                });
            }
            Resolution::Skip => {}
        }
    }

    out
}
