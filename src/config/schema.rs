//! Configuration schema definitions

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::factor::{EntryFileToLabel, Granularity};
use crate::group::PRIMARY_LABEL;
use crate::split::DEFAULT_SIZE_LIMIT;

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
        }
    }
}

fn default_name() -> String {
    "app".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Where module records come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// JSON or NDJSON file of module records
    #[serde(default = "default_modules")]
    pub modules: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            modules: default_modules(),
        }
    }
}

fn default_modules() -> String {
    "modules.json".to_string()
}

/// How entry groups are labelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LabelStrategy {
    /// The entry module id
    #[default]
    Id,
    /// File name of the entry without its extension
    FileStem,
    /// Full entry file path
    File,
}

impl LabelStrategy {
    /// Label function for [`crate::factor::FactorOptions`]
    pub fn entry_file_to_label(self) -> Option<EntryFileToLabel> {
        match self {
            LabelStrategy::Id => None,
            LabelStrategy::FileStem => Some(Arc::new(|file: &str| {
                Path::new(file)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.to_string())
            })),
            LabelStrategy::File => Some(Arc::new(|file: &str| file.to_string())),
        }
    }
}

/// Ownership factoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorConfig {
    /// Factor into per-entry groups; when off, every module goes into one
    /// group labelled `primary_label`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Own external packages per module or per package
    #[serde(default)]
    pub granularity: Granularity,

    /// Entry group labels
    #[serde(default)]
    pub label: LabelStrategy,

    /// Label of the single group used when factoring is off
    #[serde(default = "default_primary_label")]
    pub primary_label: String,
}

impl Default for FactorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            granularity: Granularity::default(),
            label: LabelStrategy::default(),
            primary_label: default_primary_label(),
        }
    }
}

fn default_primary_label() -> String {
    PRIMARY_LABEL.to_string()
}

/// Size splitting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Split factored groups at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Subgroup size ceiling in bytes
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_limit: default_size_limit(),
        }
    }
}

fn default_size_limit() -> usize {
    DEFAULT_SIZE_LIMIT
}

/// Packed output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Loadable script with a small module runtime
    #[default]
    Script,
    /// The group's module records as a JSON array
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Script => "js",
            OutputFormat::Json => "json",
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Packed file format
    #[serde(default)]
    pub format: OutputFormat,

    /// Hash file names for cache busting
    #[serde(default = "default_true")]
    pub hash: bool,

    /// Generate manifest.json
    #[serde(default = "default_true")]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
            hash: true,
            manifest: true,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_true() -> bool {
    true
}
