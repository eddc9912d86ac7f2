//! Hablar CLI
//!
//! # Usage
//!
//! ```bash
//! # Train the demo model from config
//! hablar train config.yaml
//!
//! # Train on a specific device
//! hablar train config.yaml --device cuda:0
//!
//! # Validate config
//! hablar validate config.yaml
//! ```

use clap::Parser;
use hablar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
