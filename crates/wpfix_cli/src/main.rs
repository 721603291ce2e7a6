//! wpfix CLI - runs the built-in conformance suite against the reference site
//! or a live install.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "wpfix")]
#[command(about = "Fixture-isolated integration tests for content and identity sites", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run conformance cases
    Run {
        /// Config file (defaults apply when missing)
        #[arg(short, long, default_value = wpfix_core::CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Only run cases whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Test a live site at this URL instead of the in-memory one
        #[arg(long)]
        site_url: Option<String>,
    },
    /// List available cases
    List {
        /// Only list cases whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Write a default config file
    Init {
        /// Where to write the config
        #[arg(default_value = wpfix_core::CONFIG_FILE_NAME)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Respects RUST_LOG (e.g., RUST_LOG=wpfix_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            filter,
            format,
            site_url,
        } => commands::run::run(&config, filter.as_deref(), format, site_url),
        Commands::List { filter } => commands::list::run(filter.as_deref()),
        Commands::Init { path, force } => commands::init::run(&path, force),
    }
}
