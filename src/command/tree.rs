use tracing::debug;

use super::{
    Command, CommandId, Flag, FlagId, RootMeta, Titles,
    dedup::add_unique,
};
use crate::config_store::key;

/// Arena holding every command and flag of an application.
///
/// Nodes are created detached and only take part in lookups once attached
/// under the root. Every structural change, and every mutable borrow of a
/// node, advances [`CommandTree::generation`] so that an index built from an
/// older generation can be recognised as stale.
#[derive(Debug, Clone)]
pub struct CommandTree {
    commands: Vec<Command>,
    flags: Vec<Flag>,
    meta: RootMeta,
    generation: u64,
}

impl CommandTree {
    /// Id of the root command.
    pub const ROOT: CommandId = CommandId(0);

    /// Creates a tree holding only the root command.
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        let app_name = app_name.into();

        let root = Command {
            titles: Titles {
                short: None,
                full: app_name.clone(),
                aliases: Vec::new(),
            },
            ..Command::default()
        };

        Self {
            commands: vec![root],
            flags: Vec::new(),
            meta: RootMeta {
                app_name,
                version: version.into(),
                ..RootMeta::default()
            },
            generation: 0,
        }
    }

    /// Id of the root command.
    pub fn root(&self) -> CommandId {
        Self::ROOT
    }

    /// Application identity.
    pub fn meta(&self) -> &RootMeta {
        &self.meta
    }

    #[allow(missing_docs)]
    pub fn meta_mut(&mut self) -> &mut RootMeta {
        &mut self.meta
    }

    /// Counter advanced by every structural mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    #[allow(missing_docs)]
    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(id.0)
    }

    /// Mutable access to a command. Marks the tree as changed.
    pub fn command_mut(&mut self, id: CommandId) -> Option<&mut Command> {
        self.touch();
        self.commands.get_mut(id.0)
    }

    #[allow(missing_docs)]
    pub fn flag(&self, id: FlagId) -> Option<&Flag> {
        self.flags.get(id.0)
    }

    /// Mutable access to a flag. Marks the tree as changed.
    pub fn flag_mut(&mut self, id: FlagId) -> Option<&mut Flag> {
        self.touch();
        self.flags.get_mut(id.0)
    }

    /// Adds a detached command.
    pub fn add_command(&mut self, mut command: Command) -> CommandId {
        command.parent = None;
        command.children.clear();
        command.flags.clear();

        self.commands.push(command);
        self.touch();
        CommandId(self.commands.len() - 1)
    }

    /// Adds a detached flag.
    pub fn add_flag(&mut self, mut flag: Flag) -> FlagId {
        flag.owner = None;

        self.flags.push(flag);
        self.touch();
        FlagId(self.flags.len() - 1)
    }

    /// Attaches `child` under `parent`.
    ///
    /// Returns true only when the tree changed. Attaching a child that is
    /// already there is a no-op. The request is ignored when `child` is the
    /// root, is `parent` itself or one of its ancestors, or already hangs
    /// under a different parent.
    pub fn attach_command(&mut self, parent: CommandId, child: CommandId) -> bool {
        if self.command(parent).is_none() || self.command(child).is_none() {
            return false;
        }

        if child == Self::ROOT || child == parent || self.is_ancestor(child, parent) {
            debug!(?parent, ?child, "ignoring attach that would create a cycle");
            return false;
        }

        match self.commands[child.0].parent {
            Some(current) if current == parent => return false,
            Some(current) => {
                debug!(?child, ?current, ?parent, "ignoring attach of command owned elsewhere");
                return false;
            }
            None => {}
        }

        self.commands[child.0].parent = Some(parent);
        add_unique(&mut self.commands[parent.0].children, child);
        self.touch();
        true
    }

    /// Attaches `flag` to `owner`, moving it off any previous owner.
    ///
    /// Returns true only when the tree changed.
    pub fn attach_flag(&mut self, owner: CommandId, flag: FlagId) -> bool {
        if self.command(owner).is_none() {
            return false;
        }

        let previous = match self.flags.get(flag.0) {
            Some(f) if f.owner == Some(owner) => return false,
            Some(f) => f.owner,
            None => return false,
        };

        if let Some(previous) = previous {
            self.commands[previous.0].flags.retain(|id| *id != flag);
        }

        self.flags[flag.0].owner = Some(owner);
        add_unique(&mut self.commands[owner.0].flags, flag);
        self.touch();
        true
    }

    /// True when `ancestor` lies on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: CommandId, node: CommandId) -> bool {
        self.ancestors(node).any(|id| id == ancestor)
    }

    /// Parent chain of `node`, nearest first, excluding `node`.
    pub fn ancestors(&self, node: CommandId) -> impl Iterator<Item = CommandId> + '_ {
        std::iter::successors(
            self.command(node).and_then(|c| c.parent),
            move |id| self.command(*id).and_then(|c| c.parent),
        )
    }

    /// True when `id` is the root or hangs under it.
    pub fn is_attached(&self, id: CommandId) -> bool {
        id == Self::ROOT || self.ancestors(id).any(|a| a == Self::ROOT)
    }

    /// Full titles from the root (exclusive) down to `id`, joined with `.`.
    ///
    /// The root itself is the empty path.
    pub fn dotted_path(&self, id: CommandId) -> String {
        if id == Self::ROOT {
            return String::new();
        }

        let mut chain: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|node| *node != Self::ROOT)
            .filter_map(|node| self.command(node).map(|c| c.titles.full.as_str()))
            .collect();
        chain.reverse();

        key::from_segments(chain)
    }

    /// Configuration key of an attached flag, e.g. `server.start.port`,
    /// before the store prefix is applied. Untitled flags have no key.
    pub fn flag_key(&self, id: FlagId) -> Option<String> {
        let flag = self.flag(id)?;
        let owner = flag.owner?;
        if flag.titles.full.is_empty() {
            return None;
        }

        Some(key::join(&self.dotted_path(owner), &flag.titles.full))
    }

    /// Attached commands in depth-first pre-order, starting at the root.
    pub fn walk(&self) -> Vec<CommandId> {
        let mut order = Vec::new();
        let mut stack = vec![Self::ROOT];

        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(command) = self.command(id) {
                stack.extend(command.children.iter().rev().copied());
            }
        }

        order
    }

    /// Flags attached to commands reachable from the root, in walk order.
    pub fn attached_flags(&self) -> Vec<FlagId> {
        self.walk()
            .into_iter()
            .filter_map(|id| self.command(id))
            .flat_map(|c| c.flags.iter().copied())
            .collect()
    }

    /// Number of commands in the arena, detached ones included.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Number of flags in the arena, detached ones included.
    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }
}
