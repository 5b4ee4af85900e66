//! Streaming factoring stage
//!
//! Collects a record stream into a graph, factors it, and emits one group per
//! owner: `common` first, then one per entry in discovery order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{factor, FactorError, Granularity, Owner};
use crate::graph::{ModuleGraph, ModuleId, ModuleRecord};
use crate::group::{channel, CollectedGroup, Feed, ModuleGroup, StreamError, COMMON_LABEL};

/// Maps an entry's source path to its group label
pub type EntryFileToLabel = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Options for [`group_by_factor`]
#[derive(Clone, Default)]
pub struct FactorOptions {
    pub granularity: Granularity,

    /// Label entry groups by file; entries without a file, or all entries
    /// when unset, are labelled by their id
    pub entry_file_to_label: Option<EntryFileToLabel>,
}

impl fmt::Debug for FactorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactorOptions")
            .field("granularity", &self.granularity)
            .field("entry_file_to_label", &self.entry_file_to_label.is_some())
            .finish()
    }
}

impl FactorOptions {
    fn label_for(&self, entry: &ModuleRecord) -> String {
        match (&self.entry_file_to_label, &entry.file) {
            (Some(to_label), Some(file)) => to_label(file),
            _ => entry.id.to_string(),
        }
    }
}

/// Factor a record stream into owner groups
///
/// Must be called from within a tokio runtime. Upstream failures and
/// factoring errors fail the returned stream.
pub fn group_by_factor(input: Feed<ModuleRecord>, options: FactorOptions) -> Feed<ModuleGroup> {
    let (output, groups) = channel();

    tokio::spawn(async move {
        let records = match input.collect_all().await {
            Ok(records) => records,
            Err(err) => {
                warn!("Module stream failed before factoring: {}", err);
                output.fail(err);
                return;
            }
        };

        match factor_groups(records, &options) {
            Ok(collected) => {
                for group in collected {
                    output.push(group.into_stream());
                }
                output.end();
            }
            Err(err) => output.fail(StreamError::upstream(err)),
        }
    });

    groups
}

/// Factor `records` and bucket them by owner, keeping record order
pub fn factor_groups(
    records: Vec<ModuleRecord>,
    options: &FactorOptions,
) -> Result<Vec<CollectedGroup>, FactorError> {
    let graph = ModuleGraph::from_records(records)?;
    let entry_ids = graph.entry_ids();
    let ownership = factor(&entry_ids, &graph, options.granularity)?;

    let mut labels: HashMap<String, ModuleId> = HashMap::new();
    let mut slots: HashMap<Owner, usize> = HashMap::new();
    let mut groups = vec![CollectedGroup::new(COMMON_LABEL, None)];
    slots.insert(Owner::Common, 0);

    for entry_id in &entry_ids {
        let label = options.label_for(graph.module(entry_id)?);
        if label == COMMON_LABEL {
            return Err(FactorError::ReservedLabel(entry_id.clone()));
        }
        if let Some(first) = labels.insert(label.clone(), entry_id.clone()) {
            return Err(FactorError::DuplicateLabel {
                label,
                first,
                second: entry_id.clone(),
            });
        }
        slots.insert(Owner::Group(entry_id.clone()), groups.len());
        groups.push(CollectedGroup::new(label, None));
    }

    for record in graph.into_records() {
        let slot = ownership
            .owner(&record.id)
            .and_then(|owner| slots.get(owner))
            .copied();
        // every owner is either common or one of the entries
        if let Some(slot) = slot {
            groups[slot].modules.push(record);
        }
    }

    for group in &groups {
        debug!(group = %group.label, modules = group.modules.len(), "Factored group");
    }

    Ok(groups)
}
