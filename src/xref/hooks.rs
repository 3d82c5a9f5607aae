use std::sync::Arc;

use crate::command::CommandTree;

use super::XrefIndex;

/// Runs before the index is built; may still change the tree.
pub type BeforeXrefHook = dyn Fn(&mut CommandTree, &[String]) + Send + Sync;

/// Runs after a successful build with the tree and the new index.
pub type AfterXrefHook = dyn Fn(&CommandTree, &XrefIndex, &[String]) + Send + Sync;

/// Ordered callback lists for the two xref phases.
///
/// Hooks run synchronously in registration order. A run works on a
/// snapshot of the lists, so a hook registered while a phase is running is
/// first called on the next run.
#[derive(Clone, Default)]
pub struct HookPipeline {
    before: Vec<Arc<BeforeXrefHook>>,
    after: Vec<Arc<AfterXrefHook>>,
}

impl HookPipeline {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook for the "before xref building" phase.
    pub fn on_before_xref_building<F>(&mut self, hook: F)
    where
        F: Fn(&mut CommandTree, &[String]) + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
    }

    /// Registers a hook for the "after xref built" phase.
    pub fn on_after_xref_built<F>(&mut self, hook: F)
    where
        F: Fn(&CommandTree, &XrefIndex, &[String]) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
    }

    pub(super) fn before_snapshot(&self) -> Vec<Arc<BeforeXrefHook>> {
        self.before.clone()
    }

    pub(super) fn after_snapshot(&self) -> Vec<Arc<AfterXrefHook>> {
        self.after.clone()
    }

    /// Number of registered hooks as `(before, after)`.
    pub fn len(&self) -> (usize, usize) {
        (self.before.len(), self.after.len())
    }

    /// True when no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPipeline")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}
