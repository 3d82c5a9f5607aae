//! Optional modules that extend an application's command tree.

/// Built-in `shell` sub-command.
pub mod shell;
