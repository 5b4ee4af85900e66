//! Build pipeline
//!
//! Loads module records, factors them into owner groups, optionally splits
//! the groups by size, then packs each group into an output file and writes
//! the manifest.

mod pack;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::BuildOptions;
use crate::config::Config;
use crate::factor::group_by_factor;
use crate::graph::{load_records, ModuleId, ModuleRecord};
use crate::group::{single_group, CollectedGroup, Feed, ModuleGroup, StreamError};
use crate::split::{group_by_size, Grouping};
use crate::utils::{format_duration, hash_filename, sanitize_label};

pub use pack::pack_group;

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// Written groups, in output order
    pub outputs: Vec<OutputInfo>,

    /// Group manifest
    pub manifest: Manifest,
}

/// Information about a written group
#[derive(Debug, Clone)]
pub struct OutputInfo {
    pub label: String,

    /// Group this one was split from
    pub parent: Option<String>,

    /// Output file path
    pub output_path: PathBuf,

    /// Packed size in bytes
    pub size: usize,

    /// Number of modules in the group
    pub modules: usize,
}

/// Final groups of a run, before packing
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub groups: Vec<CollectedGroup>,

    /// Empty when splitting is disabled
    pub grouping: Grouping,
}

/// Contents of manifest.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Group label -> output details
    pub groups: BTreeMap<String, ManifestEntry>,

    /// Parent label -> subgroup labels
    #[serde(default)]
    pub grouping: Grouping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Output file name, relative to the output directory
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Module ids in load order
    pub modules: Vec<ModuleId>,
}

/// The build pipeline
pub struct Bundler {
    /// Configuration with command-line overrides applied
    config: Arc<Config>,

    /// Build options
    options: BuildOptions,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(mut config: Config, options: BuildOptions) -> Result<Self> {
        if let Some(modules) = &options.modules {
            config.input.modules = modules.display().to_string();
        }
        if let Some(size_limit) = options.size_limit {
            config.split.size_limit = size_limit;
        }
        if options.no_split {
            config.split.enabled = false;
        }
        if let Some(granularity) = options.granularity {
            config.factor.granularity = granularity;
        }
        if options.no_factor {
            config.factor.enabled = false;
        }
        if let Some(label) = options.label {
            config.factor.label = label;
        }
        if let Some(primary_label) = &options.primary_label {
            config.factor.primary_label = primary_label.clone();
        }
        if let Some(format) = options.format {
            config.output.format = format;
        }
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            options,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the project
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();
        info!(
            "Building {} v{}",
            self.config.project.name, self.config.project.version
        );

        // 1. Load module records
        let modules_path = self.config.modules_path();
        info!("Loading module records from {}", modules_path.display());
        let records = load_records(&modules_path)?;

        // 2. Factor, and split if enabled
        info!("Factoring {} modules...", records.len());
        let plan = self.plan(records).await?;

        // 3. Write output groups
        info!("Writing {} groups...", plan.groups.len());
        let outputs = self.write_groups(&plan.groups)?;

        // 4. Generate manifest
        let manifest = self.generate_manifest(&outputs, &plan)?;

        debug!("Build completed in {}", format_duration(start.elapsed()));

        Ok(BuildResult { outputs, manifest })
    }

    /// Run factoring and splitting over `records`
    pub async fn plan(&self, records: Vec<ModuleRecord>) -> Result<Plan> {
        let records = Feed::from_items(records);
        let grouped = if self.config.factor.enabled {
            group_by_factor(records, self.config.factor_options())
        } else {
            debug!("Factoring disabled, grouping all modules as {}", self.config.factor.primary_label);
            single_group(records, self.config.factor.primary_label.clone())
        };

        if !self.config.split.enabled {
            let groups = collect_groups(grouped).await.context("Factoring failed")?;
            return Ok(Plan {
                groups,
                grouping: Grouping::default(),
            });
        }

        let split = group_by_size(grouped, self.config.split.size_limit)?;
        let groups = collect_groups(split.groups)
            .await
            .context("Splitting failed")?;
        let grouping = split.grouping.read().clone();

        Ok(Plan { groups, grouping })
    }

    /// Pack and write every group
    fn write_groups(&self, groups: &[CollectedGroup]) -> Result<Vec<OutputInfo>> {
        let bases = output_bases(groups)?;
        let output_dir = self.output_dir();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let format = self.config.output.format;
        let progress = ProgressBar::new(groups.len() as u64);
        progress.set_style(ProgressStyle::with_template("{spinner} writing {pos}/{len} {msg}")?);

        let mut outputs = Vec::with_capacity(groups.len());
        for (group, base) in groups.iter().zip(bases) {
            progress.set_message(group.label.clone());
            let code = pack_group(group, format)?;

            let filename = if self.config.output.hash {
                hash_filename(&base, code.as_bytes(), format.extension())
            } else {
                format!("{}.{}", base, format.extension())
            };

            let output_path = output_dir.join(&filename);
            fs::write(&output_path, &code)
                .with_context(|| format!("Failed to write group: {}", output_path.display()))?;
            debug!(group = %group.label, file = %filename, modules = group.modules.len(), "Wrote group");

            outputs.push(OutputInfo {
                label: group.label.clone(),
                parent: group.parent.clone(),
                output_path,
                size: code.len(),
                modules: group.modules.len(),
            });
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(outputs)
    }

    /// Generate the group manifest
    fn generate_manifest(&self, outputs: &[OutputInfo], plan: &Plan) -> Result<Manifest> {
        let mut manifest = Manifest {
            grouping: plan.grouping.clone(),
            ..Manifest::default()
        };

        for (output, group) in outputs.iter().zip(&plan.groups) {
            let file = output
                .output_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            manifest.groups.insert(
                output.label.clone(),
                ManifestEntry {
                    file,
                    parent: output.parent.clone(),
                    modules: group.modules.iter().map(|m| m.id.clone()).collect(),
                },
            );
        }

        // Write manifest file if enabled
        if self.config.output.manifest {
            let manifest_path = self.output_dir().join("manifest.json");
            let manifest_json = serde_json::to_string_pretty(&manifest)?;
            fs::write(&manifest_path, manifest_json).context("Failed to write manifest.json")?;
        }

        Ok(manifest)
    }

    fn output_dir(&self) -> PathBuf {
        self.options
            .outdir
            .clone()
            .unwrap_or_else(|| self.config.output_dir())
    }
}

/// File name stem of every group; two groups whose labels sanitize to the
/// same stem would overwrite each other
fn output_bases(groups: &[CollectedGroup]) -> Result<Vec<String>> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(groups.len());
    let mut bases = Vec::with_capacity(groups.len());
    for group in groups {
        let base = sanitize_label(&group.label);
        if let Some(first) = seen.insert(base.clone(), group.label.as_str()) {
            bail!(
                "Groups `{}` and `{}` would both be written as `{}`",
                first,
                group.label,
                base
            );
        }
        bases.push(base);
    }
    Ok(bases)
}

/// Collect every group of `groups` in order
pub async fn collect_groups(mut groups: Feed<ModuleGroup>) -> Result<Vec<CollectedGroup>, StreamError> {
    let mut collected = Vec::new();
    while let Some(group) = groups.next().await {
        collected.push(group?.collect().await?);
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::OutputFormat;
    use crate::factor::Granularity;

    fn records() -> Vec<ModuleRecord> {
        vec![
            ModuleRecord::new("shared").source("module.exports = 1"),
            ModuleRecord::new("a").entry().dep("shared").dep("a-only").file("./src/a.js").source("require('shared')"),
            ModuleRecord::new("a-only").source("x".repeat(120)),
            ModuleRecord::new("b").entry().dep("shared").file("./src/b.js").source("require('shared')"),
        ]
    }

    fn bundler(dir: &std::path::Path, options: BuildOptions) -> Bundler {
        let mut config = Config::default_config();
        config.root = dir.to_path_buf();
        Bundler::new(config, options).unwrap()
    }

    #[tokio::test]
    async fn test_plan_factors_and_splits() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = bundler(
            dir.path(),
            BuildOptions {
                size_limit: Some(100),
                ..BuildOptions::default()
            },
        );

        let plan = bundler.plan(records()).await.unwrap();
        let labels: Vec<&str> = plan.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["common-0", "a-0", "b-0"]);
        assert_eq!(plan.groups[1].module_ids(), vec![&ModuleId::from("a-only"), &ModuleId::from("a")]);
        assert_eq!(plan.grouping.subgroups("a").unwrap(), &["a-0"]);
    }

    #[tokio::test]
    async fn test_plan_without_split_keeps_factored_groups() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = bundler(
            dir.path(),
            BuildOptions {
                no_split: true,
                ..BuildOptions::default()
            },
        );

        let plan = bundler.plan(records()).await.unwrap();
        let labels: Vec<&str> = plan.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["common", "a", "b"]);
        assert!(plan.grouping.is_empty());
    }

    #[tokio::test]
    async fn test_plan_surfaces_invalid_graph() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = bundler(dir.path(), BuildOptions::default());

        let err = bundler
            .plan(vec![ModuleRecord::new("main").entry().dep("nowhere")])
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("`nowhere`"));
    }

    #[tokio::test]
    async fn test_build_writes_groups_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("modules.json");
        fs::write(&modules, serde_json::to_string(&records()).unwrap()).unwrap();

        let bundler = bundler(
            dir.path(),
            BuildOptions {
                label: Some(crate::config::LabelStrategy::FileStem),
                granularity: Some(Granularity::Module),
                ..BuildOptions::default()
            },
        );
        let result = bundler.build().await.unwrap();

        assert_eq!(result.outputs.len(), 3);
        for output in &result.outputs {
            assert!(output.output_path.exists());
            assert!(output.output_path.starts_with(dir.path().join("dist")));
        }

        let written: Manifest = serde_json::from_str(
            &fs::read_to_string(dir.path().join("dist/manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(written, result.manifest);
        assert_eq!(
            written.groups["common-0"].modules,
            vec![ModuleId::from("shared")]
        );
        assert_eq!(written.groups["a-0"].parent.as_deref(), Some("a"));
        assert!(written.groups["b-0"].file.starts_with("b-0."));
        assert!(written.groups["b-0"].file.ends_with(".js"));
    }

    #[tokio::test]
    async fn test_build_json_without_hash() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("graph.ndjson");
        let ndjson: Vec<String> = records()
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();
        fs::write(&modules, ndjson.join("\n")).unwrap();

        let mut config = Config::default_config();
        config.root = dir.path().to_path_buf();
        config.output.hash = false;
        config.output.manifest = false;
        let bundler = Bundler::new(
            config,
            BuildOptions {
                modules: Some(modules),
                outdir: Some(dir.path().join("out")),
                format: Some(OutputFormat::Json),
                no_split: true,
                ..BuildOptions::default()
            },
        )
        .unwrap();

        let result = bundler.build().await.unwrap();
        let names: Vec<String> = result
            .outputs
            .iter()
            .map(|o| o.output_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["common.json", "a.json", "b.json"]);
        assert!(!dir.path().join("out/manifest.json").exists());

        let common: Vec<ModuleRecord> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("out/common.json")).unwrap())
                .unwrap();
        assert_eq!(common.len(), 1);
    }

    async fn write_entries_labelled_by_file(files: &[&str]) -> (tempfile::TempDir, Result<Vec<OutputInfo>>) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default_config();
        config.root = dir.path().to_path_buf();
        config.output.hash = false;
        let bundler = Bundler::new(
            config,
            BuildOptions {
                label: Some(crate::config::LabelStrategy::File),
                no_split: true,
                ..BuildOptions::default()
            },
        )
        .unwrap();

        let records = files
            .iter()
            .enumerate()
            .map(|(i, file)| ModuleRecord::new(format!("entry{i}")).entry().file(*file).source("run()"))
            .collect();
        let plan = bundler.plan(records).await.unwrap();
        let written = bundler.write_groups(&plan.groups);
        (dir, written)
    }

    #[tokio::test]
    async fn test_entry_file_cannot_overwrite_common_output() {
        let (dir, written) = write_entries_labelled_by_file(&["./common", "./src/main.js"]).await;

        let err = written.unwrap_err().to_string();
        assert!(err.contains("`common` and `./common`"), "{err}");
        assert!(!dir.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_labels_sanitizing_to_one_file_are_rejected() {
        let (_dir, written) = write_entries_labelled_by_file(&["a/b.js", "a_b.js"]).await;

        let err = written.unwrap_err().to_string();
        assert!(err.contains("`a/b.js` and `a_b.js`"), "{err}");
        assert!(err.contains("`a_b.js`"));
    }

    #[tokio::test]
    async fn test_plan_without_factoring_splits_one_group() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = bundler(
            dir.path(),
            BuildOptions {
                no_factor: true,
                primary_label: Some("bundle".to_string()),
                size_limit: Some(100),
                ..BuildOptions::default()
            },
        );
        let sized = |id: &str, size: usize| ModuleRecord::new(id).source("1".repeat(size));

        let plan = bundler
            .plan(vec![
                sized("1", 40).entry(),
                sized("2", 40),
                sized("3", 40).entry(),
                sized("4", 150),
                sized("5", 10),
            ])
            .await
            .unwrap();

        let summary: Vec<(&str, Vec<&str>)> = plan
            .groups
            .iter()
            .map(|g| (g.label.as_str(), g.modules.iter().map(|m| m.id.as_str()).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("bundle-0", vec!["2"]),
                ("bundle-1", vec!["4"]),
                ("bundle-2", vec!["5", "1", "3"]),
            ]
        );
        assert_eq!(plan.grouping.subgroups("bundle").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unfactored_unsplit_plan_is_one_primary_group() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = bundler(
            dir.path(),
            BuildOptions {
                no_factor: true,
                no_split: true,
                ..BuildOptions::default()
            },
        );

        let plan = bundler.plan(records()).await.unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].label, "primary");
        assert_eq!(plan.groups[0].modules.len(), 4);
    }

    #[test]
    fn test_zero_size_limit_rejected() {
        let err = Bundler::new(
            Config::default_config(),
            BuildOptions {
                size_limit: Some(0),
                ..BuildOptions::default()
            },
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("size_limit"));
    }
}
