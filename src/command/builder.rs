use std::time::Duration;

use super::{
    Action, ActionContext, Command, CommandId, CommandResult, CommandTree, Flag, FlagId,
    FlagValue, Titles,
};

/// Fluent construction context for a [`CommandTree`].
///
/// The builder tracks one cursor, the "current working command". It starts
/// at the root, advances when [`new_sub_cmd`](Self::new_sub_cmd) creates a
/// child, and is redirected explicitly by [`new_cmd_from`](Self::new_cmd_from).
/// Nothing else moves it.
///
/// ```
/// use cmdopt::command::TreeBuilder;
///
/// let mut b = TreeBuilder::new("demo", "1.0.0");
/// let server = b.new_sub_cmd().titles("s", "server").id();
/// b.new_sub_cmd().titles("", "start").description("start the server");
/// let port = b.new_int(8080).titles("p", "port").attach_to(server).id();
///
/// let tree = b.build();
/// assert_eq!(tree.flag_key(port).as_deref(), Some("server.port"));
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    tree: CommandTree,
    cursor: CommandId,
}

impl TreeBuilder {
    /// Starts a tree whose root is named after `app_name`.
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::from_tree(CommandTree::new(app_name, version))
    }

    /// Continues building an existing tree, cursor at the root.
    pub fn from_tree(tree: CommandTree) -> Self {
        Self {
            cursor: tree.root(),
            tree,
        }
    }

    /// The current working command.
    pub fn cursor(&self) -> CommandId {
        self.cursor
    }

    /// Handle on the root command. Does not move the cursor.
    pub fn root(&mut self) -> CmdOpt<'_> {
        let id = self.tree.root();
        CmdOpt { builder: self, id }
    }

    /// Sets the banner printed above help output.
    pub fn header(&mut self, header: &str) -> &mut Self {
        self.tree.meta_mut().header = header.to_string();
        self
    }

    /// Sets the copyright line and author.
    pub fn copyright(&mut self, copyright: &str, author: &str) -> &mut Self {
        let meta = self.tree.meta_mut();
        meta.copyright = copyright.to_string();
        meta.author = author.to_string();
        self
    }

    /// Creates a detached command. The cursor stays where it is.
    pub fn new_cmd(&mut self) -> CmdOpt<'_> {
        let id = self.tree.add_command(Command::default());
        CmdOpt { builder: self, id }
    }

    /// Re-anchors the cursor on an existing command and returns its handle.
    pub fn new_cmd_from(&mut self, id: CommandId) -> CmdOpt<'_> {
        self.cursor = id;
        CmdOpt { builder: self, id }
    }

    /// Creates a command under the cursor and moves the cursor onto it.
    pub fn new_sub_cmd(&mut self) -> CmdOpt<'_> {
        let parent = self.cursor;
        let id = self.tree.add_command(Command::default());
        self.tree.attach_command(parent, id);
        self.cursor = id;
        CmdOpt { builder: self, id }
    }

    /// Creates a detached flag with `default` as value and type.
    pub fn new_flag(&mut self, default: FlagValue) -> FlagOpt<'_> {
        let id = self.tree.add_flag(Flag::new(default));
        FlagOpt { builder: self, id }
    }

    /// Attaches an existing flag to the cursor and returns its handle.
    pub fn new_flag_from(&mut self, id: FlagId) -> FlagOpt<'_> {
        let cursor = self.cursor;
        self.tree.attach_flag(cursor, id);
        FlagOpt { builder: self, id }
    }

    #[allow(missing_docs)]
    pub fn new_bool(&mut self, default: bool) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Bool(default))
    }

    #[allow(missing_docs)]
    pub fn new_string(&mut self, default: &str) -> FlagOpt<'_> {
        self.new_flag(FlagValue::String(default.to_string()))
    }

    #[allow(missing_docs)]
    pub fn new_string_slice(&mut self, default: &[&str]) -> FlagOpt<'_> {
        self.new_flag(FlagValue::StringSlice(
            default.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[allow(missing_docs)]
    pub fn new_int(&mut self, default: i64) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Int(default))
    }

    #[allow(missing_docs)]
    pub fn new_int_slice(&mut self, default: &[i64]) -> FlagOpt<'_> {
        self.new_flag(FlagValue::IntSlice(default.to_vec()))
    }

    #[allow(missing_docs)]
    pub fn new_uint(&mut self, default: u64) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Uint(default))
    }

    #[allow(missing_docs)]
    pub fn new_int64(&mut self, default: i64) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Int64(default))
    }

    #[allow(missing_docs)]
    pub fn new_uint64(&mut self, default: u64) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Uint64(default))
    }

    #[allow(missing_docs)]
    pub fn new_float32(&mut self, default: f32) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Float32(default))
    }

    #[allow(missing_docs)]
    pub fn new_float64(&mut self, default: f64) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Float64(default))
    }

    #[allow(missing_docs)]
    pub fn new_duration(&mut self, default: Duration) -> FlagOpt<'_> {
        self.new_flag(FlagValue::Duration(default))
    }

    /// Read access to the tree under construction.
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Finishes construction.
    pub fn build(self) -> CommandTree {
        self.tree
    }
}

/// Chainable handle on one command.
#[derive(Debug)]
pub struct CmdOpt<'a> {
    builder: &'a mut TreeBuilder,
    id: CommandId,
}

impl<'a> CmdOpt<'a> {
    /// The command's id.
    pub fn id(&self) -> CommandId {
        self.id
    }

    fn edit(self, f: impl FnOnce(&mut Command)) -> Self {
        if let Some(command) = self.builder.tree.command_mut(self.id) {
            f(command);
        }
        self
    }

    /// Sets the short and full titles. An empty short title means none.
    pub fn titles(self, short: &str, full: &str) -> Self {
        self.edit(|c| {
            c.titles.short = (!short.is_empty()).then(|| short.to_string());
            c.titles.full = full.to_string();
        })
    }

    /// Adds aliases, skipping ones already present.
    pub fn aliases(self, aliases: &[&str]) -> Self {
        self.edit(|c| c.titles.add_aliases(aliases.iter().copied()))
    }

    #[allow(missing_docs)]
    pub fn description(self, description: &str) -> Self {
        self.edit(|c| c.meta.description = description.to_string())
    }

    #[allow(missing_docs)]
    pub fn long_description(self, text: &str) -> Self {
        self.edit(|c| c.meta.long_description = text.to_string())
    }

    #[allow(missing_docs)]
    pub fn examples(self, examples: &str) -> Self {
        self.edit(|c| c.meta.examples = examples.to_string())
    }

    #[allow(missing_docs)]
    pub fn group(self, group: &str) -> Self {
        self.edit(|c| c.meta.group = group.to_string())
    }

    #[allow(missing_docs)]
    pub fn hidden(self, hidden: bool) -> Self {
        self.edit(|c| c.meta.hidden = hidden)
    }

    /// Sets the callback run when the command is invoked.
    pub fn action<F>(self, f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.edit(|c| c.action = Some(Action::new(f)))
    }

    /// Attaches this command under `parent`. See
    /// [`CommandTree::attach_command`] for the cases that are ignored.
    pub fn attach_to(self, parent: CommandId) -> Self {
        self.builder.tree.attach_command(parent, self.id);
        self
    }

    /// Creates a flag with `default` and attaches it to this command.
    pub fn new_flag(self, default: FlagValue) -> FlagOpt<'a> {
        let owner = self.id;
        let builder = self.builder;
        let id = builder.tree.add_flag(Flag::new(default));
        builder.tree.attach_flag(owner, id);
        FlagOpt { builder, id }
    }
}

/// Chainable handle on one flag.
#[derive(Debug)]
pub struct FlagOpt<'a> {
    builder: &'a mut TreeBuilder,
    id: FlagId,
}

impl FlagOpt<'_> {
    /// The flag's id.
    pub fn id(&self) -> FlagId {
        self.id
    }

    fn edit(self, f: impl FnOnce(&mut Flag)) -> Self {
        if let Some(flag) = self.builder.tree.flag_mut(self.id) {
            f(flag);
        }
        self
    }

    /// Sets the short and full titles. An empty short title means none.
    pub fn titles(self, short: &str, full: &str) -> Self {
        self.edit(|f| {
            f.titles = Titles {
                short: (!short.is_empty()).then(|| short.to_string()),
                full: full.to_string(),
                aliases: std::mem::take(&mut f.titles.aliases),
            };
        })
    }

    /// Adds aliases, skipping ones already present.
    pub fn aliases(self, aliases: &[&str]) -> Self {
        self.edit(|f| f.titles.add_aliases(aliases.iter().copied()))
    }

    #[allow(missing_docs)]
    pub fn description(self, description: &str) -> Self {
        self.edit(|f| f.meta.description = description.to_string())
    }

    #[allow(missing_docs)]
    pub fn long_description(self, text: &str) -> Self {
        self.edit(|f| f.meta.long_description = text.to_string())
    }

    #[allow(missing_docs)]
    pub fn examples(self, examples: &str) -> Self {
        self.edit(|f| f.meta.examples = examples.to_string())
    }

    #[allow(missing_docs)]
    pub fn group(self, group: &str) -> Self {
        self.edit(|f| f.meta.group = group.to_string())
    }

    #[allow(missing_docs)]
    pub fn hidden(self, hidden: bool) -> Self {
        self.edit(|f| f.meta.hidden = hidden)
    }

    /// Restricts the flag to an enumerated set of values.
    pub fn valid_args(self, values: &[&str]) -> Self {
        self.edit(|f| {
            super::add_unique_all(&mut f.valid_args, values.iter().map(|v| v.to_string()));
        })
    }

    /// Binds environment variables read for this flag, in priority order.
    pub fn env_vars(self, names: &[&str]) -> Self {
        self.edit(|f| {
            super::add_unique_all(&mut f.env_vars, names.iter().map(|v| v.to_string()));
        })
    }

    #[allow(missing_docs)]
    pub fn required(self, required: bool) -> Self {
        self.edit(|f| f.required = required)
    }

    /// Attaches the flag to `owner`, moving it off any previous owner.
    pub fn attach_to(self, owner: CommandId) -> Self {
        self.builder.tree.attach_flag(owner, self.id);
        self
    }
}
