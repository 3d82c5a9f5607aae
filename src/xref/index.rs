use std::{collections::HashMap, fmt};

use thiserror::Error;

use crate::command::{CommandId, CommandTree, FlagId};

/// Alias namespaces kept apart by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Sub-command names, scoped per parent command.
    Command,
    /// Flag names, scoped per owning command.
    Flag,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::Flag => "flag",
        })
    }
}

/// Errors raised by the xref build phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrefError {
    /// Two nodes claim the same alias in the same scope.
    #[error("duplicate {namespace} alias '{alias}' under '{scope}': claimed by '{first}' and '{second}'")]
    DuplicateAlias {
        /// Which namespace the clash happened in
        namespace: Namespace,
        /// The contested name
        alias: String,
        /// Dotted path of the parent (commands) or owner (flags)
        scope: String,
        /// The node that registered the alias first
        first: String,
        /// The node that tried to register it again
        second: String,
    },

    /// An attached command or flag has no full title, so it has no key
    /// segment of its own.
    #[error("{namespace} #{node} under '{scope}' has no full title")]
    MissingTitle {
        /// Which kind of node is untitled
        namespace: Namespace,
        /// Arena index of the node
        node: usize,
        /// Dotted path of the parent (commands) or owner (flags)
        scope: String,
    },

    /// A build was requested from inside a hook of a running build.
    #[error("xref build requested while a build is already running on this thread")]
    Reentrant,
}

/// Alias → node lookup derived from a [`CommandTree`].
///
/// Built by [`XrefIndex::build`] as a pure function of the tree. The index
/// remembers the tree generation it was built from; once the tree moves on
/// the index is stale and must be rebuilt before it is trusted.
#[derive(Debug, Clone, Default)]
pub struct XrefIndex {
    commands: HashMap<CommandId, HashMap<String, CommandId>>,
    flags: HashMap<CommandId, HashMap<String, FlagId>>,
    parents: HashMap<CommandId, CommandId>,
    generation: u64,
}

impl XrefIndex {
    /// Indexes every command and flag reachable from the root.
    ///
    /// # Errors
    /// * `XrefError::DuplicateAlias` - Two children of one command, or two
    ///   flags of one command, share a name; both nodes are named
    /// * `XrefError::MissingTitle` - An attached node has an empty full title
    pub fn build(tree: &CommandTree) -> Result<Self, XrefError> {
        let mut index = Self {
            generation: tree.generation(),
            ..Self::default()
        };

        for id in tree.walk() {
            let Some(command) = tree.command(id) else {
                continue;
            };

            let scope = describe_scope(tree, id);

            let children = index.commands.entry(id).or_default();
            for child_id in command.children() {
                let Some(child) = tree.command(*child_id) else {
                    continue;
                };
                if child.titles.full.is_empty() {
                    return Err(XrefError::MissingTitle {
                        namespace: Namespace::Command,
                        node: child_id.index(),
                        scope,
                    });
                }
                index.parents.insert(*child_id, id);

                for name in child.titles.names() {
                    match children.get(name) {
                        Some(existing) if existing == child_id => {}
                        Some(existing) => {
                            return Err(XrefError::DuplicateAlias {
                                namespace: Namespace::Command,
                                alias: name.to_string(),
                                scope,
                                first: tree.dotted_path(*existing),
                                second: tree.dotted_path(*child_id),
                            });
                        }
                        None => {
                            children.insert(name.to_string(), *child_id);
                        }
                    }
                }
            }

            let flags = index.flags.entry(id).or_default();
            for flag_id in command.flags() {
                let Some(flag) = tree.flag(*flag_id) else {
                    continue;
                };
                if flag.titles.full.is_empty() {
                    return Err(XrefError::MissingTitle {
                        namespace: Namespace::Flag,
                        node: flag_id.index(),
                        scope,
                    });
                }

                for name in flag.titles.names() {
                    match flags.get(name) {
                        Some(existing) if existing == flag_id => {}
                        Some(existing) => {
                            return Err(XrefError::DuplicateAlias {
                                namespace: Namespace::Flag,
                                alias: name.to_string(),
                                scope,
                                first: describe_flag(tree, *existing),
                                second: describe_flag(tree, *flag_id),
                            });
                        }
                        None => {
                            flags.insert(name.to_string(), *flag_id);
                        }
                    }
                }
            }
        }

        Ok(index)
    }

    /// Tree generation this index was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when `tree` changed after this index was built.
    pub fn is_stale(&self, tree: &CommandTree) -> bool {
        tree.generation() != self.generation
    }

    /// Child of `parent` answering to `alias`.
    pub fn command(&self, parent: CommandId, alias: &str) -> Option<CommandId> {
        self.commands.get(&parent)?.get(alias).copied()
    }

    /// Follows a path of aliases from the root.
    ///
    /// The empty path resolves to the root.
    pub fn resolve<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<CommandId> {
        path.into_iter()
            .try_fold(CommandTree::ROOT, |current, alias| self.command(current, alias))
    }

    /// Flag answering to `alias` on `command`, falling back to the flags of
    /// its ancestors, nearest first.
    pub fn flag(&self, command: CommandId, alias: &str) -> Option<FlagId> {
        let mut current = Some(command);

        while let Some(id) = current {
            if let Some(flag) = self.flags.get(&id).and_then(|names| names.get(alias)) {
                return Some(*flag);
            }
            current = self.parents.get(&id).copied();
        }

        None
    }

    /// Number of indexed sub-command aliases.
    pub fn command_alias_count(&self) -> usize {
        self.commands.values().map(HashMap::len).sum()
    }

    /// Number of indexed flag aliases.
    pub fn flag_alias_count(&self) -> usize {
        self.flags.values().map(HashMap::len).sum()
    }
}

fn describe_scope(tree: &CommandTree, id: CommandId) -> String {
    if id == CommandTree::ROOT {
        return tree.meta().app_name.clone();
    }
    tree.dotted_path(id)
}

fn describe_flag(tree: &CommandTree, id: FlagId) -> String {
    match (tree.flag_key(id), tree.flag(id)) {
        (Some(key), _) => key,
        (None, Some(flag)) => flag.titles.full.clone(),
        (None, None) => format!("flag #{}", id.index()),
    }
}
