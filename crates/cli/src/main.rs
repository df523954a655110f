//! swiftcheck CLI - Main Entry Point
//!
//! Runs the transliteration corpus against the live page and manages the
//! corpus and harness configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, corpus, run};

/// swiftcheck - conformance harness for the SwiftTranslator Singlish to Sinhala UI
#[derive(Parser)]
#[command(name = "swiftcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file
    #[arg(long, env = "SWIFTCHECK_CONFIG", default_value = "swiftcheck.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the corpus against the live target
    Run(run::RunArgs),

    /// Inspect the test corpus
    #[command(subcommand)]
    Corpus(corpus::CorpusCommands),

    /// Manage the harness configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Run(args) => {
            let passed = run::execute(args, &cli.config, cli.format).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Corpus(cmd) => corpus::execute(cmd, cli.format)?,
        Commands::Config(cmd) => config::execute(cmd, &cli.config, cli.format)?,
        Commands::Version => {
            println!("swiftcheck v{}", env!("CARGO_PKG_VERSION"));
            println!("Conformance harness for the SwiftTranslator Singlish to Sinhala UI");
        }
    }

    Ok(())
}
