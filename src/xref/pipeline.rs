use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{HookPipeline, XrefError, XrefIndex};
use crate::command::CommandTree;

/// A command tree together with its hook pipeline and current index.
///
/// [`Xref::rebuild`] runs the cycle: before hooks, a pure build, then after
/// hooks. A failed build leaves the previous index in place.
#[derive(Debug)]
pub struct Xref {
    tree: CommandTree,
    hooks: HookPipeline,
    index: Option<Arc<XrefIndex>>,
}

impl Xref {
    #[allow(missing_docs)]
    pub fn new(tree: CommandTree, hooks: HookPipeline) -> Self {
        Self {
            tree,
            hooks,
            index: None,
        }
    }

    #[allow(missing_docs)]
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Mutable tree access. Changes made here leave the index stale until
    /// the next rebuild.
    pub fn tree_mut(&mut self) -> &mut CommandTree {
        &mut self.tree
    }

    #[allow(missing_docs)]
    pub fn hooks_mut(&mut self) -> &mut HookPipeline {
        &mut self.hooks
    }

    /// The last successfully built index, stale or not.
    pub fn index(&self) -> Option<Arc<XrefIndex>> {
        self.index.clone()
    }

    /// The index, only if it reflects the current tree.
    pub fn fresh_index(&self) -> Option<Arc<XrefIndex>> {
        self.index
            .as_ref()
            .filter(|index| !index.is_stale(&self.tree))
            .cloned()
    }

    /// True when there is no index or the tree changed after it was built.
    pub fn is_stale(&self) -> bool {
        self.fresh_index().is_none()
    }

    /// Runs the before hooks, builds a new index and runs the after hooks.
    ///
    /// # Errors
    /// Returns `XrefError::DuplicateAlias` if the tree has clashing aliases.
    /// The previous index stays authoritative and the after hooks do not run.
    #[instrument(skip_all, fields(generation = self.tree.generation()))]
    pub fn rebuild(&mut self, raw_args: &[String]) -> Result<Arc<XrefIndex>, XrefError> {
        for hook in self.hooks.before_snapshot() {
            hook(&mut self.tree, raw_args);
        }

        let index = match XrefIndex::build(&self.tree) {
            Ok(index) => Arc::new(index),
            Err(e) => {
                warn!(error = %e, "xref build failed; keeping previous index");
                return Err(e);
            }
        };

        debug!(
            commands = index.command_alias_count(),
            flags = index.flag_alias_count(),
            "xref index built"
        );
        self.index = Some(Arc::clone(&index));

        for hook in self.hooks.after_snapshot() {
            hook(&self.tree, &index, raw_args);
        }

        Ok(index)
    }
}
