//! Ownership factoring
//!
//! Assigns every module of a graph to exactly one owner: the entry point whose
//! traversal reached it, or [`Owner::Common`] when more than one entry reaches
//! it. Entries are walked one after another, breadth-first. When a walk runs
//! into a module claimed by a different entry, that module and everything
//! reachable from it is promoted to common in a separate walk.
//!
//! Promotion covers the whole subtree below a shared module, even parts that
//! only one entry could reach on their own. This keeps the algorithm a single
//! pass per entry at the cost of a larger common group.

mod registry;
mod stage;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{GraphError, ModuleGraph, ModuleId, ModuleRecord};
use crate::group::COMMON_LABEL;

pub use registry::{Claim, OwnershipRegistry, OwnershipUnit};
pub use stage::{factor_groups, group_by_factor, EntryFileToLabel, FactorOptions};

/// Errors raised while factoring
#[derive(Debug, Error)]
pub enum FactorError {
    #[error("invalid module graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("entry `{0}` maps to the reserved group label `common`")]
    ReservedLabel(ModuleId),

    #[error("entries `{first}` and `{second}` both map to group label `{label}`")]
    DuplicateLabel {
        label: String,
        first: ModuleId,
        second: ModuleId,
    },
}

/// Owner of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// Shared by two or more entries
    Common,
    /// Owned by the entry with this id
    Group(ModuleId),
}

impl Owner {
    pub fn is_common(&self) -> bool {
        matches!(self, Owner::Common)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Common => f.write_str(COMMON_LABEL),
            Owner::Group(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Granularity at which external packages are owned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// Every module is owned on its own
    #[default]
    Module,
    /// Modules of an external package share one owner
    Package,
}

impl Granularity {
    /// Ownership unit of `module` at this granularity
    pub fn unit_of(self, module: &ModuleRecord) -> OwnershipUnit {
        match self {
            Granularity::Package if !module.is_root_package() => {
                OwnershipUnit::Package(module.package_name.clone())
            }
            _ => OwnershipUnit::Module(module.id.clone()),
        }
    }
}

/// Final module -> owner mapping of a factoring run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ownership {
    owners: BTreeMap<ModuleId, Owner>,
}

impl Ownership {
    pub fn owner(&self, id: &ModuleId) -> Option<&Owner> {
        self.owners.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, &Owner)> {
        self.owners.iter()
    }

    /// Module ids owned by `owner`, sorted
    pub fn modules_owned_by(&self, owner: &Owner) -> Vec<&ModuleId> {
        self.owners
            .iter()
            .filter(|(_, o)| *o == owner)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn common_modules(&self) -> Vec<&ModuleId> {
        self.modules_owned_by(&Owner::Common)
    }

    /// Distinct owners, common first
    pub fn owners(&self) -> BTreeSet<&Owner> {
        self.owners.values().collect()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Assign every module of `graph` to an owner
///
/// `entry_ids` must list the entries in discovery order; each entry becomes
/// the group id of the modules only it can reach.
pub fn factor(
    entry_ids: &[ModuleId],
    graph: &ModuleGraph,
    granularity: Granularity,
) -> Result<Ownership, FactorError> {
    graph.check_edges()?;
    for entry in entry_ids {
        graph.module(entry)?;
    }

    let mut factoring = Factoring {
        graph,
        granularity,
        registry: OwnershipRegistry::new(),
    };
    for entry in entry_ids {
        factoring.claim_from(entry)?;
    }

    let ownership = factoring.finish()?;
    info!(
        entries = entry_ids.len(),
        modules = ownership.len(),
        common = ownership.common_modules().len(),
        "Factored module graph"
    );
    Ok(ownership)
}

struct Factoring<'g> {
    graph: &'g ModuleGraph,
    granularity: Granularity,
    registry: OwnershipRegistry,
}

impl Factoring<'_> {
    /// Walk from `entry`, claiming for its group whatever nobody else owns
    fn claim_from(&mut self, entry: &ModuleId) -> Result<(), FactorError> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([entry.clone()]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let module = self.graph.module(&id)?;
            match self.registry.claim(self.granularity.unit_of(module), entry) {
                Claim::Common => continue,
                Claim::Conflict => {
                    let promoted = self.promote_from(&id)?;
                    debug!(module = %id, group = %entry, promoted, "Promoted shared subtree to common");
                    continue;
                }
                Claim::Granted => {}
            }
            queue.extend(module.dependencies().cloned());
        }

        Ok(())
    }

    /// Move `start` and everything reachable from it to common, stopping at
    /// modules that already are common
    fn promote_from(&mut self, start: &ModuleId) -> Result<usize, FactorError> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start.clone()]);
        let mut promoted = 0;

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let module = self.graph.module(&id)?;
            if !self.registry.promote(self.granularity.unit_of(module)) {
                continue;
            }
            promoted += 1;
            queue.extend(module.dependencies().cloned());
        }

        Ok(promoted)
    }

    fn finish(self) -> Result<Ownership, FactorError> {
        let mut owners = BTreeMap::new();
        for module in self.graph.iter() {
            let owner = self
                .registry
                .owner(&self.granularity.unit_of(module))
                .ok_or_else(|| GraphError::Unowned(module.id.clone()))?;
            owners.insert(module.id.clone(), owner.clone());
        }
        Ok(Ownership { owners })
    }
}
