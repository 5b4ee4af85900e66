//! Ownership registry for a single factoring run

use std::collections::HashMap;

use super::Owner;
use crate::graph::ModuleId;

/// The thing an owner is recorded against
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnershipUnit {
    /// A single module
    Module(ModuleId),
    /// Every module of an external package
    Package(String),
}

/// Outcome of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Unit is now (or already was) owned by the claiming group
    Granted,
    /// Unit is common; nothing changed
    Common,
    /// Unit belongs to another group; nothing changed
    Conflict,
}

/// Mapping from ownership unit to owner
///
/// Transitions are monotonic: unowned -> group -> common. `claim` never
/// overwrites an existing owner and `promote` only ever writes `Common`.
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    owners: HashMap<OwnershipUnit, Owner>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, unit: &OwnershipUnit) -> Option<&Owner> {
        self.owners.get(unit)
    }

    pub fn is_common(&self, unit: &OwnershipUnit) -> bool {
        matches!(self.owners.get(unit), Some(Owner::Common))
    }

    /// Try to claim `unit` for `group`
    pub fn claim(&mut self, unit: OwnershipUnit, group: &ModuleId) -> Claim {
        match self.owners.get(&unit) {
            Some(Owner::Common) => Claim::Common,
            Some(Owner::Group(owner)) if owner != group => Claim::Conflict,
            Some(Owner::Group(_)) => Claim::Granted,
            None => {
                self.owners.insert(unit, Owner::Group(group.clone()));
                Claim::Granted
            }
        }
    }

    /// Move `unit` to common; returns false if it already was common
    pub fn promote(&mut self, unit: OwnershipUnit) -> bool {
        match self.owners.insert(unit, Owner::Common) {
            Some(Owner::Common) => false,
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
