//! cmdopt - Hierarchical option store and command tree for
//! runtime-configurable command-line applications.
//!
//! The main pieces are:
//!
//! - A layered configuration store merging defaults, files, environment
//!   variables, explicit writes and flag values under a fixed precedence
//! - A command and flag tree built through a cursor-based builder
//! - A cross-reference index over the tree, rebuilt through before/after
//!   hooks and failing closed on duplicate aliases
//! - An application service that runs the startup sequence and reloads
//!   config files when they change
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cmdopt::{
//!     app::AppBuilder,
//!     command::{FlagValue, TreeBuilder},
//!     config_store::Lookup,
//! };
//!
//! let mut tree = TreeBuilder::new("demo", "1.0.0");
//! tree.root()
//!     .new_flag(FlagValue::Bool(false))
//!     .titles("v", "verbose");
//!
//! let app = AppBuilder::new(tree.build()).build();
//! app.bootstrap(&std::env::args().collect::<Vec<_>>())?;
//!
//! let verbose = app.store().prefixed().get_bool("verbose", false);
//! println!("verbose: {verbose}");
//! # Ok::<(), cmdopt::Error>(())
//! ```

/// Application service wiring the store, the tree and hot reload.
pub mod app;

/// Command tree, flags and the fluent builder.
pub mod command;

/// Layered configuration store with typed accessors.
pub mod config_store;

/// Core error types and result aliases.
pub mod core;

/// Optional command tree extensions.
pub mod plugins;

/// Config file, environment and codec sources.
pub mod sources;

/// Tracing subscriber setup.
pub mod tracing_config;

/// Cross-reference index and its rebuild pipeline.
pub mod xref;

/// Re-exported core types for convenience.
pub use crate::core::{Error, Result};
