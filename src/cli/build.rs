//! Build command implementation

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::bundler::Bundler;
use crate::config::{Config, LabelStrategy, OutputFormat};
use crate::factor::Granularity;
use crate::utils::{format_duration, format_size};

/// Factor the module graph and write the output groups
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Module records (JSON array or NDJSON), overrides input.modules
    #[arg(short, long)]
    pub modules: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Subgroup size ceiling in bytes
    #[arg(short, long)]
    pub size_limit: Option<usize>,

    /// Write factored groups without splitting them by size
    #[arg(long)]
    pub no_split: bool,

    /// Put every module into one group instead of factoring by entry
    #[arg(long)]
    pub no_factor: bool,

    /// Label of the single group written with --no-factor
    #[arg(long)]
    pub primary_label: Option<String>,

    /// Own external packages per module or per package
    #[arg(long, value_enum)]
    pub granularity: Option<Granularity>,

    /// How entry groups are labelled
    #[arg(long, value_enum)]
    pub label: Option<LabelStrategy>,

    /// Output file format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: Option<&Path>) -> Result<()> {
        let start = Instant::now();

        let config = Config::resolve(config_path)?;
        info!("Using configuration rooted at {}", config.root.display());

        eprintln!("{} Building chunks...", "→".blue());

        let bundler = Bundler::new(config, self.into())?;
        let result = bundler.build().await?;

        eprintln!(
            "\n{} Wrote {} group(s) in {}\n",
            "✓".green().bold(),
            result.outputs.len(),
            format_duration(start.elapsed())
        );

        // Print group summary
        for output in &result.outputs {
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                output.output_path.display().to_string().cyan(),
                format_size(output.size).dimmed(),
                format!("({} modules)", output.modules).dimmed()
            );
        }

        eprintln!();

        Ok(())
    }
}

/// Build options derived from command arguments
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub modules: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub size_limit: Option<usize>,
    pub no_split: bool,
    pub no_factor: bool,
    pub primary_label: Option<String>,
    pub granularity: Option<Granularity>,
    pub label: Option<LabelStrategy>,
    pub format: Option<OutputFormat>,
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            modules: cmd.modules.clone(),
            outdir: cmd.outdir.clone(),
            size_limit: cmd.size_limit,
            no_split: cmd.no_split,
            no_factor: cmd.no_factor,
            primary_label: cmd.primary_label.clone(),
            granularity: cmd.granularity,
            label: cmd.label,
            format: cmd.format,
        }
    }
}
