//! Configuration handling for chunkfactor
//!
//! Parses and manages chunkfactor.toml configuration files.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::factor::FactorOptions;

pub use schema::*;

/// Config file looked up in the working directory when none is named
pub const DEFAULT_CONFIG_FILE: &str = "chunkfactor.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,

    /// Module record input
    #[serde(default)]
    pub input: InputConfig,

    /// Ownership factoring
    #[serde(default)]
    pub factor: FactorConfig,

    /// Size splitting
    #[serde(default)]
    pub split: SplitConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Load an explicitly named config file, or fall back to
    /// [`Config::load_or_default`] on [`DEFAULT_CONFIG_FILE`]
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_or_default(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load the config file if it exists, defaults rooted at the working
    /// directory otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = absolute(path.as_ref())?;
        if path.exists() {
            return Self::load(path);
        }

        debug!("No config at {}, using defaults", path.display());
        let mut config = Self::default_config();
        config.root = std::env::current_dir()?;
        Ok(config)
    }

    /// Parse configuration text without touching the filesystem
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse chunkfactor.toml")
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            root: PathBuf::from("."),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.split.size_limit == 0 {
            anyhow::bail!("split.size_limit must be a positive number of bytes");
        }

        if self.input.modules.trim().is_empty() {
            anyhow::bail!("input.modules must name a module record file");
        }

        if !self.factor.enabled && self.factor.primary_label.trim().is_empty() {
            anyhow::bail!("factor.primary_label must not be empty when factoring is disabled");
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Get the absolute module record path
    pub fn modules_path(&self) -> PathBuf {
        self.root.join(&self.input.modules)
    }

    /// Factoring options described by this configuration
    pub fn factor_options(&self) -> FactorOptions {
        FactorOptions {
            granularity: self.factor.granularity,
            entry_file_to_label: self.factor.label.entry_file_to_label(),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    })
}
