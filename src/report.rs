//! Build log and error taxonomy
//!
//! Every failure the pipeline can hit is non-fatal: it is reported here and
//! recovered locally (a dropped reference, a skipped rule, an omitted sheet).
//! Nothing is thrown past the pipeline boundary. The log doubles as the
//! observability channel: one info line per packed sheet, one error line per
//! failure, and an optional JSONL dump for tooling.

use serde::Serialize;
use thiserror::Error;

/// Coarse error category, used for counting and for the JSONL report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    Conflict,
    RuleValidation,
    Packing,
    StylesheetParse,
}

/// Everything that can go wrong during a sprite pass.
#[derive(Debug, Error)]
pub enum SpriteError {
    /// A url() referenced an image absent from the known source files.
    #[error("the image file {path} referred in file {referrer} is not found")]
    Resolution { path: String, referrer: String },

    /// The same image appeared twice in one stylesheet with differing
    /// sprite directives.
    #[error("the same image {path} in file {referrer} with different sprite information is not allowed")]
    Conflict { path: String, referrer: String },

    /// The same image carries differing sprite directives across stylesheets.
    #[error("the image {path} in file {referrer} has different sprite information in another file")]
    CrossFileConflict { path: String, referrer: String },

    /// A rule's background declarations collectively reference more than one
    /// image.
    #[error("multiple background image urls are not allowed in file {file}: selector {selector}")]
    MultipleBackground { file: String, selector: String },

    /// A sprite-eligible url() sits on a property outside the background
    /// family.
    #[error("the style property {property} may not carry a sprite url in file {file}")]
    DisallowedProperty { file: String, property: String },

    /// The rule tiles its background; sprites must not be tiled.
    #[error("background repeat value in selector {selector} of file {file} is not allowed for sprites")]
    TiledBackground { file: String, selector: String },

    /// The external packing engine failed (or never reported) for a job.
    #[error("generating sprite sheet {target} failed: {message}")]
    Packing { target: String, message: String },

    /// A stylesheet could not be parsed; the file is left untouched.
    #[error("error parsing stylesheet {path}: {message}")]
    StylesheetParse { path: String, message: String },
}

impl SpriteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpriteError::Resolution { .. } => ErrorKind::Resolution,
            SpriteError::Conflict { .. } | SpriteError::CrossFileConflict { .. } => {
                ErrorKind::Conflict
            }
            SpriteError::MultipleBackground { .. }
            | SpriteError::DisallowedProperty { .. }
            | SpriteError::TiledBackground { .. } => ErrorKind::RuleValidation,
            SpriteError::Packing { .. } => ErrorKind::Packing,
            SpriteError::StylesheetParse { .. } => ErrorKind::StylesheetParse,
        }
    }
}

/// Log line severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// One collected log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// Collects log lines for the duration of a pass.
///
/// With `echo` enabled, lines are also printed as they arrive (info to
/// stdout, errors to stderr), which is what the CLI uses in verbose mode.
#[derive(Debug, Default)]
pub struct BuildLog {
    entries: Vec<LogEntry>,
    echo: bool,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable echoing lines to the terminal as they arrive.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.echo {
            println!("{}", message);
        }
        self.entries.push(LogEntry { level: Level::Info, kind: None, message });
    }

    pub fn error(&mut self, err: &SpriteError) {
        let message = err.to_string();
        if self.echo {
            eprintln!("error: {}", message);
        }
        self.entries.push(LogEntry { level: Level::Error, kind: Some(err.kind()), message });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.level == Level::Error).count()
    }

    /// Number of collected errors of a given kind.
    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.entries.iter().filter(|e| e.kind == Some(kind)).count()
    }

    /// Serialize the collected lines as JSONL, one entry per line.
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            if let Ok(line) = serde_json::to_string(entry) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}
