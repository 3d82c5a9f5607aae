//! Command and flag definitions.
//!
//! Commands and flags live in a [`CommandTree`] arena and refer to each
//! other by [`CommandId`] / [`FlagId`]. Trees are usually put together with
//! the fluent [`TreeBuilder`].

mod builder;
mod dedup;
mod node;
mod tree;
mod types;

#[cfg(test)]
mod tests;

pub use builder::{CmdOpt, FlagOpt, TreeBuilder};
pub use dedup::{add_unique, add_unique_all};
pub use node::{Command, CommandId, Flag, FlagId, FlagValue, Meta, RootMeta, Titles};
pub use tree::CommandTree;
pub use types::{Action, ActionContext, CliError, CommandResult};
