//! End-to-end tests for the sprite pass over in-memory file sets.

use autosprite::config::SpriteConfig;
use autosprite::engine::{
    PackEngine, PackError, PackOutput, PackRequest, Placement, ShelfPacker,
};
use autosprite::fileset::{FileEntry, FileSet};
use autosprite::pipeline::SpritePass;
use autosprite::report::{BuildLog, ErrorKind};
use image::RgbaImage;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

fn css_entry(path: &str, text: &str) -> FileEntry {
    FileEntry::new(path, text.as_bytes().to_vec())
}

/// Engine placing images in a vertical strip with fixed dimensions, so
/// positions in the rewritten CSS are predictable.
struct StripEngine;

impl PackEngine for StripEngine {
    fn pack(&self, request: &PackRequest) -> Result<PackOutput, PackError> {
        let mut placements = HashMap::new();
        let mut sources: Vec<&str> = request.sources.iter().map(|s| s.path.as_str()).collect();
        sources.sort();
        let mut y = 0;
        for path in sources {
            placements.insert(path.to_string(), Placement { x: 0, y, width: 16, height: 16 });
            y += 16 + request.padding;
        }
        Ok(PackOutput {
            width: 16,
            height: y.saturating_sub(request.padding),
            image: png_bytes(1, 1, [0, 0, 0, 255]),
            placements,
        })
    }
}

fn strip_pass(config: SpriteConfig) -> SpritePass {
    SpritePass::new(config).with_engine(Arc::new(StripEngine))
}

#[test]
fn test_offset_rewrite_with_real_packer() {
    // Two 1x images on one sheet; the second lands at a negative offset.
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry(
        "main.css",
        ".a { background: url(img/a.png?_sprite) no-repeat; }\n.b { background: url(img/b.png?_sprite) no-repeat; }",
    ));

    let pass = SpritePass::new(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(summary.errors, 0);
    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].path, "main.png");
    assert_eq!(summary.sheets[0].images, 2);

    let css = files.get("main.css").unwrap().text().unwrap().to_string();
    assert!(css.contains("url(main.png)"));
    // ShelfPacker: same height, ordered by path; a at x=0, b at x=18
    assert!(css.contains("background-position: 0 0"), "css: {}", css);
    assert!(css.contains("background-position: -18px 0"), "css: {}", css);
    assert!(!css.contains("background-size"), "css: {}", css);
    assert!(!css.contains("_sprite"), "css: {}", css);

    // The generated sheet decodes to the declared dimensions
    let sheet = files.get("main.png").unwrap();
    let decoded = image::load_from_memory(&sheet.data).unwrap();
    assert_eq!(decoded.width(), summary.sheets[0].width);
    assert_eq!(decoded.height(), summary.sheets[0].height);
}

#[test]
fn test_density_rewrite_inserts_background_size() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a@2x.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b@2x.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry(
        "main.css",
        ".a { background: url(img/a@2x.png?_sprite) no-repeat; }\n.b { background: url(img/b@2x.png?_sprite) no-repeat; }",
    ));

    let pass = SpritePass::new(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(summary.errors, 0);
    assert_eq!(summary.sheets[0].path, "main@2x.png");

    // Padding 2 at dpr 2 becomes 4 sheet pixels: b sits at x=20
    let css = files.get("main.css").unwrap().text().unwrap();
    assert!(css.contains("url(main@2x.png)"), "css: {}", css);
    assert!(css.contains("background-position: -10px 0"), "css: {}", css);
    // Sheet is 36x16 at 2x: CSS size 18px 8px
    assert!(css.contains("background-size: 18px 8px"), "css: {}", css);
}

#[test]
fn test_cross_file_dedup_single_placement() {
    // The same image referenced from two stylesheets into one named sheet
    // is packed once.
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry("one.css", ".a { background: url(img/a.png?_sprite=shared); }"));
    files.add(css_entry("two.css", ".b { background: url(img/a.png?_sprite=shared); }"));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(summary.errors, 0);
    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].path, "src/sprite/shared.png");
    assert_eq!(summary.sheets[0].images, 1);
    assert_eq!(summary.stylesheets_rewritten, 2);

    // Both stylesheets point at the same sheet with the same position
    for path in ["one.css", "two.css"] {
        let css = files.get(path).unwrap().text().unwrap();
        assert!(css.contains("url(src/sprite/shared.png)"), "{}: {}", path, css);
        assert!(css.contains("background-position: 0 0"), "{}: {}", path, css);
    }
}

#[test]
fn test_cross_file_conflict_reported_first_wins() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry("one.css", ".a { background: url(img/a.png?_sprite=first); }"));
    files.add(css_entry("two.css", ".b { background: url(img/a.png?_sprite=second); }"));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(log.count_kind(ErrorKind::Conflict), 1);
    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].path, "src/sprite/first.png");
}

#[test]
fn test_multiple_background_rule_left_byte_identical() {
    let css = ".a { background-image: url(img/a.png?_sprite); background: url(img/b.png?_sprite); }";
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry("main.css", css));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(log.count_kind(ErrorKind::RuleValidation), 1);
    assert_eq!(summary.stylesheets_rewritten, 0);
    // The file is not rewritten at all, not even reserialized
    let entry = files.get("main.css").unwrap();
    assert!(!entry.mutated);
    assert_eq!(entry.text(), Some(css));
}

#[test]
fn test_tiled_background_rejected() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry("main.css", ".a { background: url(img/a.png?_sprite) repeat-x; }"));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    pass.run(&mut files, &mut log);

    assert_eq!(log.count_kind(ErrorKind::RuleValidation), 1);
    assert!(!files.get("main.css").unwrap().mutated);
}

#[test]
fn test_missing_image_reported_pass_continues() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry(
        "main.css",
        ".a { background: url(img/a.png?_sprite); }\n.b { background: url(img/missing.png?_sprite); }",
    ));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(log.count_kind(ErrorKind::Resolution), 1);
    // The resolvable reference still gets its sheet
    assert_eq!(summary.sheets.len(), 1);
    assert!(files.get("main.css").unwrap().mutated);
}

#[test]
fn test_second_pass_is_a_no_op() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry("main.css", ".a { background: url(img/a.png?_sprite) no-repeat; }"));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    pass.run(&mut files, &mut log);
    let first = files.get("main.css").unwrap().text().unwrap().to_string();

    // Rebuild the set the way a fresh invocation would see it
    let mut second_files = FileSet::new();
    second_files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    second_files.add(css_entry("main.css", &first));
    let sheet = files.get("main.png").unwrap();
    second_files.add(FileEntry::new("main.png", sheet.data.clone()));

    let mut second_log = BuildLog::new();
    let summary = pass.run(&mut second_files, &mut second_log);

    assert_eq!(summary.sheets.len(), 0);
    assert_eq!(summary.stylesheets_rewritten, 0);
    assert_eq!(second_log.error_count(), 0);
    assert_eq!(second_files.get("main.css").unwrap().text().unwrap(), first);
}

#[test]
fn test_catch_all_grouping() {
    let mut config = SpriteConfig::default();
    config.group_by_css_file = false;

    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry("one.css", ".a { background: url(img/a.png?_sprite); }"));
    files.add(css_entry("two.css", ".b { background: url(img/b.png?_sprite); }"));

    let pass = strip_pass(config);
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].path, "src/sprite/all.png");
    assert_eq!(summary.sheets[0].images, 2);
}

#[test]
fn test_fixup_markers_resolved_and_pruned() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry(
        "main.css",
        ".icon-a { background: url(img/a.png?_sprite&_ie6); }\n.icon-b { background: url(img/b.png?_sprite); }",
    ));
    files.add(FileEntry::new(
        "fix.js",
        b"fixPng('${img/a.png,img/b.png}');\nfixPng('${img/unused.png}');\nkeep();\n".to_vec(),
    ));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    pass.run(&mut files, &mut log);

    // Sprited images resolve to their selectors; a marker naming only an
    // untouched image loses its line.
    let js = files.get("fix.js").unwrap().text().unwrap();
    assert_eq!(js, "fixPng('.icon-a,.icon-b');\nkeep();\n");
}

#[test]
fn test_fixup_skips_excluded_paths() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry("main.css", ".a { background: url(img/a.png?_sprite&_ie6); }"));
    files.add(FileEntry::new("dep/fix.js", b"fixPng('${img/a.png}');\n".to_vec()));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    pass.run(&mut files, &mut log);

    let excluded = files.get("dep/fix.js").unwrap();
    assert!(!excluded.mutated);
}

#[test]
fn test_packing_failure_isolated() {
    // One job carries a corrupt image; the other sheet still lands.
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/bad.png", vec![1, 2, 3]));
    files.add(FileEntry::new("img/good.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry("one.css", ".a { background: url(img/bad.png?_sprite); }"));
    files.add(css_entry("two.css", ".b { background: url(img/good.png?_sprite); }"));

    let pass = SpritePass::new(SpriteConfig::default()).with_engine(Arc::new(ShelfPacker::default()));
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(log.count_kind(ErrorKind::Packing), 1);
    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].path, "two.png");
    assert!(!files.get("one.css").unwrap().mutated);
    assert!(files.get("two.css").unwrap().mutated);
}

#[test]
fn test_nested_media_rule_rewritten_once() {
    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(css_entry(
        "main.css",
        "@media screen {\n  .icon { background: url(img/a.png?_sprite) no-repeat; }\n}",
    ));

    let pass = strip_pass(SpriteConfig::default());
    let mut log = BuildLog::new();
    let summary = pass.run(&mut files, &mut log);

    assert_eq!(summary.errors, 0);
    let css = files.get("main.css").unwrap().text().unwrap();
    assert_eq!(css.matches("background-position").count(), 1);
    assert!(css.contains("@media screen"), "css: {}", css);
}

#[test]
fn test_scale_applies_to_1x_sheets() {
    let mut config = SpriteConfig::default();
    config.scale = 0.5;

    let mut files = FileSet::new();
    files.add(FileEntry::new("img/a.png", png_bytes(16, 16, [255, 0, 0, 255])));
    files.add(FileEntry::new("img/b.png", png_bytes(16, 16, [0, 255, 0, 255])));
    files.add(css_entry(
        "main.css",
        ".a { background: url(img/a.png?_sprite); }\n.b { background: url(img/b.png?_sprite); }",
    ));

    let pass = strip_pass(config);
    let mut log = BuildLog::new();
    pass.run(&mut files, &mut log);

    // Padding 2 at scale 0.5 spreads to 4 sheet pixels; positions and sheet
    // size divide back down by 2 in CSS pixels.
    let css = files.get("main.css").unwrap().text().unwrap();
    assert!(css.contains("background-position: 0 -10px"), "css: {}", css);
    assert!(css.contains("background-size: 8px 18px"), "css: {}", css);
}
