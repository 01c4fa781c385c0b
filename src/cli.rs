//! Command-line interface implementation

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{load_config, SpriteConfig};
use crate::fileset::{FileEntry, FileSet};
use crate::pipeline::SpritePass;
use crate::report::BuildLog;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// Config file picked up from the project root when `--config` is absent.
const DEFAULT_CONFIG_NAME: &str = "autosprite.toml";

/// Consolidate CSS background images into sprite sheets
#[derive(Parser)]
#[command(name = "autosprite")]
#[command(about = "Consolidate CSS background images into sprite sheets")]
#[command(version)]
pub struct Cli {
    /// Project root directory to process
    root: PathBuf,

    /// Configuration file (TOML). Defaults to <root>/autosprite.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print log lines as they are produced
    #[arg(short, long)]
    verbose: bool,

    /// Write a JSONL report of the pass to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Run the pass but write nothing back to disk
    #[arg(long)]
    dry_run: bool,
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let mut files = match load_file_set(&cli.root) {
        Ok(files) => files,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let pass = SpritePass::new(config);
    let mut log = BuildLog::new().with_echo(cli.verbose);
    let summary = pass.run(&mut files, &mut log);

    if let Some(report_path) = &cli.report {
        if let Err(e) = std::fs::write(report_path, log.to_jsonl()) {
            eprintln!("Error: cannot write report '{}': {}", report_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    if !cli.dry_run {
        if let Err(message) = write_back(&cli.root, &files) {
            eprintln!("Error: {}", message);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    println!(
        "{} sheet(s) generated, {} stylesheet(s) rewritten, {} error(s)",
        summary.sheets.len(),
        summary.stylesheets_rewritten,
        summary.errors
    );

    if summary.errors > 0 {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

fn resolve_config(cli: &Cli) -> Result<SpriteConfig, String> {
    if let Some(path) = &cli.config {
        return load_config(path)
            .map_err(|e| format!("cannot load config '{}': {}", path.display(), e));
    }
    let default_path = cli.root.join(DEFAULT_CONFIG_NAME);
    if default_path.is_file() {
        return load_config(&default_path)
            .map_err(|e| format!("cannot load config '{}': {}", default_path.display(), e));
    }
    Ok(SpriteConfig::default())
}

/// Load every regular file under `root` into a file set, keyed by
/// forward-slash relative path. Hidden files and directories are skipped.
fn load_file_set(root: &Path) -> Result<FileSet, String> {
    if !root.is_dir() {
        return Err(format!("'{}' is not a directory", root.display()));
    }
    let pattern = format!("{}/**/*", root.display());
    let walker = glob::glob(&pattern).map_err(|e| format!("cannot scan '{}': {}", root.display(), e))?;

    let mut files = FileSet::new();
    for entry in walker.flatten() {
        if !entry.is_file() {
            continue;
        }
        let relative = match entry.strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let relative_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if relative_str.split('/').any(|part| part.starts_with('.')) {
            continue;
        }
        let data = std::fs::read(&entry)
            .map_err(|e| format!("cannot read '{}': {}", entry.display(), e))?;
        files.add(FileEntry::new(relative_str, data));
    }
    Ok(files)
}

/// Write mutated and generated entries back under `root`.
fn write_back(root: &Path, files: &FileSet) -> Result<(), String> {
    for entry in files.iter() {
        if !entry.mutated && !entry.added {
            continue;
        }
        let target = root.join(&entry.output_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create '{}': {}", parent.display(), e))?;
        }
        std::fs::write(&target, &entry.data)
            .map_err(|e| format!("cannot write '{}': {}", target.display(), e))?;
    }
    Ok(())
}
