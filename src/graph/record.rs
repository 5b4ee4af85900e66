//! Module records as delivered by the resolver

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Package name reserved for the application's own source
pub const ROOT_PACKAGE: &str = "<root>";

/// Unique identifier for a module within one factoring run
///
/// Resolvers hand out either numeric or string ids; both are normalized to
/// their string form so that `1` and `"1"` name the same module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ModuleId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => ModuleId(id),
            RawId::Number(id) => ModuleId(id.to_string()),
        })
    }
}

/// A dependency target as it appears on the wire: an id, or a falsy
/// placeholder (`null`, `false`, `""`) for a require that resolved to nothing
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Id(ModuleId),
    Flag(bool),
    Missing(()),
}

fn deserialize_deps<'de, D>(deserializer: D) -> Result<IndexMap<String, Option<ModuleId>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, RawTarget>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(key, target)| {
            let target = match target {
                RawTarget::Id(id) if !id.as_str().is_empty() => Some(id),
                _ => None,
            };
            (key, target)
        })
        .collect())
}

fn default_package_name() -> String {
    ROOT_PACKAGE.to_string()
}

/// A single module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// Unique module id
    pub id: ModuleId,

    /// Package this module belongs to, `<root>` for application source
    #[serde(default = "default_package_name")]
    pub package_name: String,

    /// Local require key -> target module id, in the resolver's order
    #[serde(default, deserialize_with = "deserialize_deps")]
    pub deps: IndexMap<String, Option<ModuleId>>,

    /// Whether this module is an entry point
    #[serde(default)]
    pub entry: bool,

    /// Module source; only its length matters for chunking
    #[serde(default)]
    pub source: String,

    /// Source path, when the resolver knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ModuleRecord {
    /// Create an empty application module
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            package_name: default_package_name(),
            deps: IndexMap::new(),
            entry: false,
            source: String::new(),
            file: None,
        }
    }

    /// Mark the module as an entry point
    pub fn entry(mut self) -> Self {
        self.entry = true;
        self
    }

    /// Add a dependency, keyed by the target id
    pub fn dep(mut self, target: impl Into<ModuleId>) -> Self {
        let target = target.into();
        self.deps.insert(target.to_string(), Some(target));
        self
    }

    pub fn package(mut self, name: impl Into<String>) -> Self {
        self.package_name = name.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Size used for chunk accounting
    pub fn size(&self) -> usize {
        self.source.len()
    }

    /// Whether the module is application source rather than a package
    pub fn is_root_package(&self) -> bool {
        self.package_name == ROOT_PACKAGE
    }

    /// Dependency targets in enumeration order, skipping empty edges
    pub fn dependencies(&self) -> impl Iterator<Item = &ModuleId> {
        self.deps.values().flatten()
    }
}
