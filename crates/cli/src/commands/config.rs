//! Config Commands

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use swiftcheck_harness::HarnessConfig;

use crate::output::{print_document, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            HarnessConfig::default()
                .save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            print_success(&format!("Wrote default configuration to {}", path.display()));
        }

        ConfigCommands::Show => {
            let config = HarnessConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            match format {
                OutputFormat::Table => print!("{}", toml::to_string_pretty(&config)?),
                _ => print_document(&config, format),
            }
        }
    }

    Ok(())
}
