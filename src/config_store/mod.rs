//! Hierarchical configuration store with layered provenance.
//!
//! Values are addressed by dotted paths and live in one layer per
//! [`Source`]. Typed reads go through the [`Lookup`] trait, either on the
//! store itself (raw keys) or on a [`Scoped`] view (prefixed keys).

mod changes;
mod coerce;
mod diff;
pub mod key;
mod lookup;
mod merging;
mod path_ops;
mod store;

#[cfg(test)]
mod tests;

pub use changes::{ConfigChange, ConfigError, ConfigLoaded, Source};
pub use coerce::{FromValue, format_duration, infer_scalar, parse_bool, parse_duration};
pub use lookup::{Lookup, Scoped};
pub use store::{ConfigHook, ConfigStore, DEFAULT_PREFIX, WriteAccess};

pub(crate) use merging::merge_tables;
pub(crate) use path_ops::set_value_at_path;
