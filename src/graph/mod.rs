//! Module graph data structures
//!
//! The graph is an arena of [`ModuleRecord`]s addressed by [`ModuleId`]. It
//! remembers the order records arrived in, since entry discovery order and
//! per-group module order both derive from it.

mod loader;
mod record;

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

pub use loader::{load_records, parse_records};
pub use record::{ModuleId, ModuleRecord, ROOT_PACKAGE};

/// Violations of the module graph input contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("module `{0}` appears more than once")]
    DuplicateModule(ModuleId),

    #[error("module `{0}` is not part of the graph")]
    MissingModule(ModuleId),

    #[error("module `{from}` depends on `{to}`, which is not part of the graph")]
    MissingDependency { from: ModuleId, to: ModuleId },

    #[error("module `{0}` is not reachable from any entry point")]
    Unowned(ModuleId),
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: HashMap<ModuleId, ModuleRecord>,

    /// Insertion order
    order: Vec<ModuleId>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from records, keeping their order
    pub fn from_records<I>(records: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = ModuleRecord>,
    {
        let mut graph = Self::new();
        for record in records {
            graph.add_module(record)?;
        }
        Ok(graph)
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, module: ModuleRecord) -> Result<(), GraphError> {
        if self.modules.contains_key(&module.id) {
            return Err(GraphError::DuplicateModule(module.id));
        }
        self.order.push(module.id.clone());
        self.modules.insert(module.id.clone(), module);
        Ok(())
    }

    /// Get a module by ID
    pub fn get_module(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    /// Get a module by ID, failing if the graph does not contain it
    pub fn module(&self, id: &ModuleId) -> Result<&ModuleRecord, GraphError> {
        self.modules
            .get(id)
            .ok_or_else(|| GraphError::MissingModule(id.clone()))
    }

    /// Check that every dependency edge points at a module in the graph
    pub fn check_edges(&self) -> Result<(), GraphError> {
        for module in self.iter() {
            if let Some(to) = module
                .dependencies()
                .find(|dep| !self.modules.contains_key(*dep))
            {
                return Err(GraphError::MissingDependency {
                    from: module.id.clone(),
                    to: to.clone(),
                });
            }
        }
        Ok(())
    }

    /// Modules in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.order.iter().filter_map(|id| self.modules.get(id))
    }

    /// Entry point ids in the order they were discovered
    pub fn entry_ids(&self) -> Vec<ModuleId> {
        self.iter()
            .filter(|m| m.entry)
            .map(|m| m.id.clone())
            .collect()
    }

    /// Get all modules reachable from a given module (BFS)
    pub fn get_reachable_modules(&self, start: &ModuleId) -> Result<Vec<ModuleId>, GraphError> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start.clone());
        visited.insert(start.clone());

        while let Some(id) = queue.pop_front() {
            let module = self.module(&id)?;
            for dep_id in module.dependencies() {
                if visited.insert(dep_id.clone()) {
                    queue.push_back(dep_id.clone());
                }
            }
            result.push(id);
        }

        Ok(result)
    }

    /// Consume the graph, returning records in insertion order
    pub fn into_records(mut self) -> Vec<ModuleRecord> {
        self.order
            .iter()
            .filter_map(|id| self.modules.remove(id))
            .collect()
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
