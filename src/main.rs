//! Codetick CLI entry point.

use clap::Parser;
use codetick::cli::{self, Cli, UNKNOWN_ERROR};

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli::run(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("unhandled error: {:#}", e);
            eprintln!("Error: {:#}", e);
            UNKNOWN_ERROR
        }
    };

    std::process::exit(exit_code);
}
