//! Streaming size-split stage

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{Grouping, SizeSplitter, SplitError};
use crate::group::{channel, Emitter, Feed, ModuleGroup};

/// Output of [`group_by_size`]
#[derive(Debug)]
pub struct SizeSplit {
    /// Subgroups, in parent order
    pub groups: Feed<ModuleGroup>,

    /// Filled in as each parent group completes; final once `groups` has ended
    pub grouping: Arc<RwLock<Grouping>>,
}

/// Split every group of `input` into subgroups under `size_limit` bytes
///
/// Must be called from within a tokio runtime. A zero limit is rejected
/// before anything is consumed.
pub fn group_by_size(input: Feed<ModuleGroup>, size_limit: usize) -> Result<SizeSplit, SplitError> {
    let size_limit = NonZeroUsize::new(size_limit).ok_or(SplitError::InvalidSizeLimit)?;
    let (output, groups) = channel();
    let grouping = Arc::new(RwLock::new(Grouping::default()));

    tokio::spawn(split_groups(input, size_limit, output, grouping.clone()));

    Ok(SizeSplit { groups, grouping })
}

async fn split_groups(
    mut input: Feed<ModuleGroup>,
    size_limit: NonZeroUsize,
    output: Emitter<ModuleGroup>,
    grouping: Arc<RwLock<Grouping>>,
) {
    while let Some(next) = input.next().await {
        let parent = match next {
            Ok(parent) => parent,
            Err(err) => {
                warn!("Group stream failed: {}", err);
                output.fail(err);
                return;
            }
        };

        let (label, _, mut modules) = parent.into_parts();
        let mut splitter = SizeSplitter::new(label.clone(), size_limit, &output);

        let failure = loop {
            match modules.next().await {
                Some(Ok(module)) => splitter.push(module),
                Some(Err(err)) => break Some(err),
                None => break None,
            }
        };

        match failure {
            None => {
                let labels = splitter.finish();
                debug!(group = %label, subgroups = labels.len(), "Split group");
                grouping.write().insert(label, labels);
            }
            Some(err) => {
                warn!("Group {} failed while splitting: {}", label, err);
                let labels = splitter.fail(err.clone());
                grouping.write().insert(label, labels);
                output.fail(err);
                return;
            }
        }
    }

    output.end();
}
