//! Module groups: named, ordered streams of module records
//!
//! A group is the unit exchanged between the factoring stage, the size
//! splitter and the packer. The producer holds a [`GroupWriter`], the consumer
//! holds the [`ModuleGroup`].

mod feed;

use futures_util::StreamExt;
use tracing::warn;

use crate::graph::{ModuleId, ModuleRecord};

pub use feed::{channel, Emitter, Feed, StreamError};

/// Reserved label of the group holding modules shared between entries
pub const COMMON_LABEL: &str = "common";

/// Default label of the group produced by [`single_group`]
pub const PRIMARY_LABEL: &str = "primary";

/// Consuming side of a group
#[derive(Debug)]
pub struct ModuleGroup {
    label: String,
    parent: Option<String>,
    modules: Feed<ModuleRecord>,
}

/// Producing side of a group
#[derive(Debug)]
pub struct GroupWriter {
    label: String,
    emitter: Emitter<ModuleRecord>,
}

impl ModuleGroup {
    /// Open a new group, returning its writer and its consumer side
    pub fn open(label: impl Into<String>, parent: Option<String>) -> (GroupWriter, ModuleGroup) {
        let label = label.into();
        let (emitter, modules) = channel();
        (
            GroupWriter {
                label: label.clone(),
                emitter,
            },
            ModuleGroup {
                label,
                parent,
                modules,
            },
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Label of the group this one was split from
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Split into label, parent and module feed
    pub fn into_parts(self) -> (String, Option<String>, Feed<ModuleRecord>) {
        (self.label, self.parent, self.modules)
    }

    /// Wait for the group to be ended and collect its modules
    pub async fn collect(self) -> Result<CollectedGroup, StreamError> {
        let modules = self.modules.collect_all().await?;
        Ok(CollectedGroup {
            label: self.label,
            parent: self.parent,
            modules,
        })
    }
}

impl GroupWriter {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append a module to the group
    pub fn push(&self, module: ModuleRecord) {
        self.emitter.push(module);
    }

    /// Mark the group complete
    pub fn end(self) {
        self.emitter.end();
    }

    /// Mark the group failed
    pub fn fail(self, err: StreamError) {
        self.emitter.fail(err);
    }
}

/// A fully received group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedGroup {
    pub label: String,
    pub parent: Option<String>,
    pub modules: Vec<ModuleRecord>,
}

impl CollectedGroup {
    pub fn new(label: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            label: label.into(),
            parent,
            modules: Vec::new(),
        }
    }

    /// Total source size of the group's modules
    pub fn size(&self) -> usize {
        self.modules.iter().map(ModuleRecord::size).sum()
    }

    pub fn module_ids(&self) -> Vec<&ModuleId> {
        self.modules.iter().map(|m| &m.id).collect()
    }

    /// Replay the group as a terminated stream
    pub fn into_stream(self) -> ModuleGroup {
        let (writer, group) = ModuleGroup::open(self.label, self.parent);
        for module in self.modules {
            writer.push(module);
        }
        writer.end();
        group
    }
}

/// Wrap a whole record stream in one group labelled `label`
///
/// The group is emitted immediately and fills as records arrive, so size
/// splitting can run without factoring. Must be called from within a tokio
/// runtime; an upstream failure fails the group.
pub fn single_group(mut input: Feed<ModuleRecord>, label: impl Into<String>) -> Feed<ModuleGroup> {
    let (writer, group) = ModuleGroup::open(label, None);
    let (output, groups) = channel();
    output.push(group);
    output.end();

    tokio::spawn(async move {
        while let Some(module) = input.next().await {
            match module {
                Ok(module) => writer.push(module),
                Err(err) => {
                    warn!(group = %writer.label(), "Module stream failed: {}", err);
                    writer.fail(err);
                    return;
                }
            }
        }
        writer.end();
    });

    groups
}
