use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::config_store::{ConfigError, ConfigStore, Lookup, Scoped};

use super::CommandId;

/// Errors that can occur while resolving or running a command.
///
/// Covers everything between "the caller named a command" and "its action
/// returned": lookup misses, flag values that fail validation, and failures
/// raised by the action itself.
#[derive(Error, Debug)]
pub enum CliError {
    /// No command matches the given alias path.
    ///
    /// Each segment of the path is looked up among the children of the
    /// previous one, by full title, short title or alias.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// The command exists but has no action attached.
    #[error("Command '{0}' has no action")]
    NoAction(String),

    /// Invalid arguments were provided to a command.
    ///
    /// Returned for unknown flag names and for values that cannot be
    /// parsed as the flag's declared type.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A flag with enumerated valid values received something else.
    ///
    /// Only returned when wrong enum values are not being ignored; otherwise
    /// the value is accepted and a warning is logged.
    #[error("Invalid value '{value}' for flag '{flag}' (expected one of: {})", .allowed.join(", "))]
    InvalidEnumValue {
        /// Full title of the flag
        flag: String,
        /// The rejected value
        value: String,
        /// The declared valid values
        allowed: Vec<String>,
    },

    /// The command's action reported a failure.
    #[error("Command '{command}' failed: {details}")]
    ActionFailed {
        /// Dotted path of the command
        command: String,
        /// Failure reported by the action
        details: String,
    },

    /// An error occurred in the configuration system.
    ///
    /// Wraps failures from the store, such as a poisoned lock while writing
    /// flag overrides.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Type alias for command execution results.
///
/// Actions return either an output message or a [`CliError`].
pub type CommandResult = Result<String, CliError>;

/// What an action sees when it runs.
pub struct ActionContext<'a> {
    /// The command being run.
    pub command: CommandId,
    /// Dotted path of the command from the root, e.g. `server.start`.
    pub path: &'a str,
    /// Positional arguments left after the command path.
    pub args: &'a [String],
    /// The application's configuration store.
    pub store: &'a ConfigStore,
}

impl ActionContext<'_> {
    /// A view over this command's flag values.
    ///
    /// Flag values live at `<prefix>.<command path>.<flag>`, so
    /// `ctx.flags().get_bool("verbose", false)` reads the `verbose` flag of
    /// the running command.
    pub fn flags(&self) -> Scoped {
        self.store.prefixed().within(self.path)
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("command", &self.command)
            .field("path", &self.path)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// The callback attached to a command.
///
/// Cloning shares the underlying closure.
#[derive(Clone)]
pub struct Action(Arc<dyn Fn(&ActionContext<'_>) -> CommandResult + Send + Sync>);

impl Action {
    /// Wraps a closure as an action.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> CommandResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Runs the action.
    ///
    /// # Errors
    /// Whatever the action returns.
    pub fn run(&self, ctx: &ActionContext<'_>) -> CommandResult {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}
