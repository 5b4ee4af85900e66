//! chunkfactor library
//!
//! Partitions a bundler's module graph into one group per entry point plus a
//! shared `common` group, and re-splits groups into size-bounded subgroups
//! that keep entry modules last.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod factor;
pub mod graph;
pub mod group;
pub mod split;
pub mod utils;

pub use bundler::Bundler;
pub use cli::Cli;
pub use config::Config;
pub use factor::{factor, group_by_factor, FactorError, FactorOptions, Granularity, Owner, Ownership};
pub use graph::{ModuleGraph, ModuleId, ModuleRecord};
pub use group::{single_group, ModuleGroup, StreamError, COMMON_LABEL, PRIMARY_LABEL};
pub use split::{group_by_size, Grouping, SizeSplitter, SplitError};
