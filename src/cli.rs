//! CLI command handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use crate::config::TrainerConfig;
use crate::model::{demo_batches, demo_model, Device};
use crate::trainer::Trainer;
use crate::Result;

/// Multi-task self-supervised speech representation training
#[derive(Parser)]
#[command(name = "hablar", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train the demo linear model from a YAML configuration
    Train {
        /// Path to the training configuration
        config: PathBuf,
        /// Execution device (cpu, cuda, cuda:N)
        #[arg(long, default_value = "cpu")]
        device: String,
        /// Number of synthetic demo batches in the training source
        #[arg(long, default_value_t = 64)]
        num_batches: usize,
    },
    /// Load and validate a configuration, reporting the first problem
    Validate {
        /// Path to the training configuration
        config: PathBuf,
    },
}

/// Dispatch a parsed command line
pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train { config, device, num_batches } => {
            let cfg = TrainerConfig::from_yaml(config)?;
            let device: Device = device.parse()?;
            let dim = cfg.batch_size;

            let mut trainer = Trainer::new(demo_model(dim), cfg, None)?;
            info!("policy: {}", trainer.backprop_mode());

            let batches = demo_batches(dim, num_batches);
            let valid = demo_batches(dim, num_batches.div_ceil(4).max(1));
            trainer.train(
                move || batches.clone().into_iter(),
                move || valid.clone().into_iter(),
                device,
            )?;
            info!("training complete at global step {}", trainer.global_step());
            Ok(())
        }
        Command::Validate { config } => {
            let cfg = TrainerConfig::from_yaml(config)?;
            println!(
                "config ok: {} epochs x {} bpe, mode {:?}",
                cfg.epochs, cfg.bpe, cfg.backprop
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_subcommand_args() {
        let cli = Cli::parse_from(["hablar", "train", "cfg.yaml", "--device", "cuda:1"]);
        match cli.command {
            Command::Train { config, device, num_batches } => {
                assert_eq!(config, PathBuf::from("cfg.yaml"));
                assert_eq!(device, "cuda:1");
                assert_eq!(num_batches, 64);
            }
            Command::Validate { .. } => panic!("parsed wrong subcommand"),
        }
    }

    #[test]
    fn test_validate_rejects_missing_config() {
        let cli = Cli::parse_from(["hablar", "validate", "/nonexistent/cfg.yaml"]);
        assert!(run_command(cli).is_err());
    }
}
