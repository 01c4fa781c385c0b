//! autosprite - Command-line tool for consolidating CSS background images
//! into sprite sheets

use std::process::ExitCode;

use autosprite::cli;

fn main() -> ExitCode {
    cli::run()
}
