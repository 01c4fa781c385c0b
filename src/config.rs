//! Configuration schema and loader for the sprite pass
//!
//! Options mirror the processor's historical defaults: stylesheets selected
//! by glob, a `_sprite` query parameter to opt images in, per-density targets
//! and an output directory for named sheets.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Sprite pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SpriteConfig {
    /// Glob patterns selecting the entry stylesheets
    pub files: Vec<String>,
    /// Pixel padding between packed images (adjusted per job by dpr/scale)
    pub padding: u32,
    /// Query parameter marking an image for sprite consolidation; its value,
    /// if any, names the target sheet inside `output_dir`
    pub sprite_param_name: String,
    /// Query parameter forcing or suppressing the legacy PNG fixup
    pub ie6_param_name: String,
    /// Scale applied to 1x images (high-density `@Nx` images keep their own)
    pub scale: f64,
    /// Directory for named and catch-all sprite sheets
    pub output_dir: String,
    /// One sheet per stylesheet (true) or one catch-all sheet (false)
    pub group_by_css_file: bool,
    /// Default legacy fixup intent when the query parameter is absent
    pub fix_ie6_png: bool,
    /// Path prefixes the fixup scan never touches
    pub exclude: Vec<String>,
    /// Row width cap for the built-in shelf packer
    pub max_sheet_width: u32,
    /// Optional deadline for the packing join barrier, in milliseconds.
    /// Unset means the pass waits indefinitely.
    pub pack_timeout_ms: Option<u64>,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            files: default_files(),
            padding: default_padding(),
            sprite_param_name: default_sprite_param(),
            ie6_param_name: default_ie6_param(),
            scale: default_scale(),
            output_dir: default_output_dir(),
            group_by_css_file: true,
            fix_ie6_png: false,
            exclude: default_exclude(),
            max_sheet_width: default_max_sheet_width(),
            pack_timeout_ms: None,
        }
    }
}

fn default_files() -> Vec<String> {
    vec!["*.css".to_string()]
}

fn default_padding() -> u32 {
    2
}

fn default_sprite_param() -> String {
    "_sprite".to_string()
}

fn default_ie6_param() -> String {
    "_ie6".to_string()
}

fn default_scale() -> f64 {
    1.0
}

fn default_output_dir() -> String {
    "src/sprite".to_string()
}

fn default_exclude() -> Vec<String> {
    vec!["dep/".to_string(), "node_modules/".to_string()]
}

fn default_max_sheet_width() -> u32 {
    1024
}

impl SpriteConfig {
    /// Scale guarded against zero and negative values.
    pub fn effective_scale(&self) -> f64 {
        if self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }

    /// Join-barrier deadline as a `Duration`, if configured.
    pub fn pack_timeout(&self) -> Option<Duration> {
        self.pack_timeout_ms.map(Duration::from_millis)
    }

    /// Compiled stylesheet selection patterns. Invalid patterns were already
    /// rejected by the loader; anything unparseable here is skipped.
    pub fn file_patterns(&self) -> Vec<glob::Pattern> {
        self.files.iter().filter_map(|p| glob::Pattern::new(p).ok()).collect()
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SpriteConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.files {
            glob::Pattern::new(pattern)
                .map_err(|e| ConfigError::BadPattern { pattern: pattern.clone(), message: e.to_string() })?;
        }
        if self.sprite_param_name.is_empty() {
            return Err(ConfigError::Invalid("sprite_param_name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Error loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid file pattern {pattern}: {message}")]
    BadPattern { pattern: String, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Load a configuration from a TOML file on disk.
pub fn load_config(path: &Path) -> Result<SpriteConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    SpriteConfig::from_toml_str(&text)
}
