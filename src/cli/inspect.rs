//! Inspect command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::factor::{factor, Granularity};
use crate::graph::{load_records, ModuleGraph};

/// Print the owner of every module without writing anything
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Module records (JSON array or NDJSON), overrides input.modules
    #[arg(short, long)]
    pub modules: Option<PathBuf>,

    /// Own external packages per module or per package
    #[arg(long, value_enum)]
    pub granularity: Option<Granularity>,

    /// Print the module -> owner mapping as JSON
    #[arg(long)]
    pub json: bool,
}

impl InspectCommand {
    pub fn execute(&self, config_path: Option<&Path>) -> Result<()> {
        let config = Config::resolve(config_path)?;
        info!("Using configuration rooted at {}", config.root.display());

        let modules_path = self
            .modules
            .clone()
            .unwrap_or_else(|| config.modules_path());
        let graph = ModuleGraph::from_records(load_records(&modules_path)?)
            .with_context(|| format!("Invalid module graph in {}", modules_path.display()))?;
        let granularity = self.granularity.unwrap_or(config.factor.granularity);

        let ownership = factor(&graph.entry_ids(), &graph, granularity)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ownership)?);
            return Ok(());
        }

        for owner in ownership.owners() {
            let modules: Vec<String> = ownership
                .modules_owned_by(owner)
                .into_iter()
                .map(ToString::to_string)
                .collect();
            println!("{}: {}", owner.to_string().bold(), modules.join(", "));
        }

        eprintln!(
            "\n{} {} module(s), {} shared\n",
            "✓".green().bold(),
            ownership.len(),
            ownership.common_modules().len()
        );

        Ok(())
    }
}
