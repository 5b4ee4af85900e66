//! Command-line interface for chunkfactor
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Factor, split and write output groups
//! - `inspect`: Show which owner each module was assigned to

mod build;
mod inspect;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{BuildCommand, BuildOptions};
pub use inspect::InspectCommand;

/// Split a bundler's module graph into per-entry and common chunks
#[derive(Parser, Debug)]
#[command(name = "chunkfactor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file; defaults to ./chunkfactor.toml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Factor the module graph and write the output groups
    Build(BuildCommand),

    /// Print the owner of every module without writing anything
    Inspect(InspectCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(self.config.as_deref()).await,
            Commands::Inspect(cmd) => cmd.execute(self.config.as_deref()),
        }
    }
}

/// Print the chunkfactor banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "chunkfactor".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
