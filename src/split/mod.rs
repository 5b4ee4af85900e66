//! Size-bounded chunk splitting
//!
//! Re-splits each group into subgroups whose total source size stays under a
//! limit, in a single forward pass. Entry modules are held back and appended
//! to the last subgroup once the input ends: an entry must run after every
//! module it requires has been defined, so it always closes the sequence.

mod stage;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::graph::ModuleRecord;
use crate::group::{Emitter, GroupWriter, ModuleGroup, StreamError};

pub use stage::{group_by_size, SizeSplit};

/// Default subgroup size ceiling, in bytes
pub const DEFAULT_SIZE_LIMIT: usize = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("size limit must be a positive number of bytes")]
    InvalidSizeLimit,
}

/// Parent label -> labels of the subgroups split from it, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grouping(BTreeMap<String, Vec<String>>);

impl Grouping {
    pub fn insert(&mut self, parent: String, subgroups: Vec<String>) {
        self.0.insert(parent, subgroups);
    }

    pub fn subgroups(&self, parent: &str) -> Option<&[String]> {
        self.0.get(parent).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Splits one parent group into size-bounded subgroups
///
/// Subgroups are pushed to `output` as soon as they are opened; modules
/// follow through the subgroup's own stream.
pub struct SizeSplitter<'a> {
    parent: String,
    size_limit: usize,
    output: &'a Emitter<ModuleGroup>,
    labels: Vec<String>,
    current: GroupWriter,
    current_size: usize,
    entry_modules: Vec<ModuleRecord>,
}

impl<'a> SizeSplitter<'a> {
    /// Start splitting `parent`; the first subgroup opens immediately so an
    /// empty parent still yields one (empty) subgroup
    pub fn new(parent: impl Into<String>, size_limit: NonZeroUsize, output: &'a Emitter<ModuleGroup>) -> Self {
        let parent = parent.into();
        let mut labels = Vec::new();
        let current = open_subgroup(&parent, &mut labels, output);
        Self {
            parent,
            size_limit: size_limit.get(),
            output,
            labels,
            current,
            current_size: 0,
            entry_modules: Vec::new(),
        }
    }

    /// Add the next module of the parent group
    pub fn push(&mut self, module: ModuleRecord) {
        if module.entry {
            self.entry_modules.push(module);
            return;
        }

        let size = module.size();
        if self.current_size != 0 && self.current_size + size >= self.size_limit {
            self.next_subgroup();
        }
        self.current_size += size;
        self.current.push(module);
    }

    /// Flush deferred entry modules into the last subgroup and end it
    pub fn finish(self) -> Vec<String> {
        for module in self.entry_modules {
            self.current.push(module);
        }
        self.current.end();
        self.labels
    }

    /// Fail the open subgroup; deferred entries are dropped
    pub fn fail(self, err: StreamError) -> Vec<String> {
        self.current.fail(err);
        self.labels
    }

    fn next_subgroup(&mut self) {
        let next = open_subgroup(&self.parent, &mut self.labels, self.output);
        let full = std::mem::replace(&mut self.current, next);
        trace!(subgroup = %full.label(), size = self.current_size, "Closed subgroup");
        full.end();
        self.current_size = 0;
    }
}

fn open_subgroup(parent: &str, labels: &mut Vec<String>, output: &Emitter<ModuleGroup>) -> GroupWriter {
    let label = format!("{}-{}", parent, labels.len());
    let (writer, group) = ModuleGroup::open(label.clone(), Some(parent.to_string()));
    labels.push(label);
    output.push(group);
    writer
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::group::{channel, CollectedGroup};

    fn sized(id: &str, size: usize) -> ModuleRecord {
        ModuleRecord::new(id).source("1".repeat(size))
    }

    fn limit(bytes: usize) -> NonZeroUsize {
        NonZeroUsize::new(bytes).unwrap()
    }

    async fn split(parent: &str, modules: Vec<ModuleRecord>, size_limit: usize) -> (Vec<String>, Vec<CollectedGroup>) {
        let (output, groups) = channel();
        let mut splitter = SizeSplitter::new(parent, limit(size_limit), &output);
        for module in modules {
            splitter.push(module);
        }
        let labels = splitter.finish();
        output.end();

        let mut collected = Vec::new();
        for group in groups.collect_all().await.unwrap() {
            collected.push(group.collect().await.unwrap());
        }
        (labels, collected)
    }

    fn membership(groups: &[CollectedGroup]) -> Vec<(String, Vec<String>)> {
        groups
            .iter()
            .map(|g| {
                (
                    g.label.clone(),
                    g.modules.iter().map(|m| m.id.to_string()).collect(),
                )
            })
            .collect()
    }

    fn pair(label: &str, ids: &[&str]) -> (String, Vec<String>) {
        (label.to_string(), ids.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_greedy_packing() {
        let modules = vec![
            sized("a", 40),
            sized("b", 40),
            sized("c", 40),
            sized("d", 150),
            sized("e", 10),
        ];
        let (labels, groups) = split("bundle", modules, 100).await;

        assert_eq!(labels, vec!["bundle-0", "bundle-1", "bundle-2", "bundle-3"]);
        assert_eq!(
            membership(&groups),
            vec![
                pair("bundle-0", &["a", "b"]),
                pair("bundle-1", &["c"]),
                pair("bundle-2", &["d"]),
                pair("bundle-3", &["e"]),
            ]
        );
        assert!(groups.iter().all(|g| g.parent.as_deref() == Some("bundle")));
    }

    #[tokio::test]
    async fn test_entries_are_deferred_to_the_tail() {
        let modules = vec![
            sized("1", 40).entry(),
            sized("2", 40),
            sized("3", 40).entry(),
            sized("4", 150),
            sized("5", 10),
        ];
        let (_, groups) = split("bundle", modules, 100).await;

        assert_eq!(
            membership(&groups),
            vec![
                pair("bundle-0", &["2"]),
                pair("bundle-1", &["4"]),
                pair("bundle-2", &["5", "1", "3"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_group_yields_one_empty_subgroup() {
        let (labels, groups) = split("common", Vec::new(), 100).await;

        assert_eq!(labels, vec!["common-0"]);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].modules.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_first_module_gets_no_empty_predecessor() {
        let (_, groups) = split("big", vec![sized("huge", 500), sized("tiny", 1)], 100).await;

        assert_eq!(
            membership(&groups),
            vec![pair("big-0", &["huge"]), pair("big-1", &["tiny"])]
        );
    }

    #[tokio::test]
    async fn test_exact_fit_starts_new_subgroup() {
        let (_, groups) = split("g", vec![sized("a", 60), sized("b", 40)], 100).await;
        assert_eq!(
            membership(&groups),
            vec![pair("g-0", &["a"]), pair("g-1", &["b"])]
        );
    }

    #[tokio::test]
    async fn test_size_bound_and_entry_last_hold() {
        let sizes = [30, 70, 5, 99, 1, 64, 36, 200, 12, 50];
        let mut modules: Vec<ModuleRecord> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| sized(&i.to_string(), *size))
            .collect();
        modules.insert(3, sized("main", 80).entry());
        let (_, groups) = split("app", modules, 100).await;

        for group in &groups {
            let ordinary: Vec<&ModuleRecord> = group.modules.iter().filter(|m| !m.entry).collect();
            let ordinary_size: usize = ordinary.iter().map(|m| m.size()).sum();
            assert!(ordinary_size < 100 || ordinary.len() == 1, "{} too large", group.label);

            if let Some(first_entry) = group.modules.iter().position(|m| m.entry) {
                assert!(group.modules[first_entry..].iter().all(|m| m.entry));
            }
        }
        let last = groups.last().unwrap();
        assert_eq!(last.modules.last().unwrap().id.as_str(), "main");
    }

    #[tokio::test]
    async fn test_failure_reaches_open_subgroup() {
        let (output, groups) = channel();
        let mut splitter = SizeSplitter::new("bundle", limit(100), &output);
        splitter.push(sized("a", 10));
        splitter.push(sized("main", 10).entry());
        let labels = splitter.fail(StreamError::message("boom"));
        output.end();

        assert_eq!(labels, vec!["bundle-0"]);
        let subgroup = groups.collect_all().await.unwrap().remove(0);
        assert!(subgroup.collect().await.is_err());
    }

    #[test]
    fn test_grouping_lookup() {
        let mut grouping = Grouping::default();
        grouping.insert("common".to_string(), vec!["common-0".to_string()]);

        assert_eq!(grouping.subgroups("common"), Some(&["common-0".to_string()][..]));
        assert_eq!(grouping.subgroups("entry1"), None);
        assert_eq!(grouping.len(), 1);
    }
}
