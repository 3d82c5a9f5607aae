use std::time::Duration;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use super::{
    ConfigError, ConfigStore,
    coerce::{self, FromValue},
    key,
};

/// Read access to a [`ConfigStore`], keyed relative to some base path.
///
/// [`ConfigStore`] implements this with raw keys. [`Scoped`] implements it
/// with a base path prepended, which is how the prefixed accessors are
/// reached (`store.prefixed().get_bool("debug", false)` reads
/// `app.debug`).
///
/// Lookups never fail: a missing key or a value of the wrong shape resolves
/// to the caller's default.
pub trait Lookup {
    /// The store being read.
    fn store(&self) -> &ConfigStore;

    /// Maps a caller key to the exact store path.
    fn resolve(&self, key: &str) -> String;

    /// Exact path lookup. The empty key yields the whole subtree at the base.
    fn get(&self, key: &str) -> Option<Value> {
        self.store().value_at(&self.resolve(key))
    }

    /// Returns true when a value (leaf or subtree) exists at `key`.
    fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Coerces the value at `key`, falling back to `default`.
    fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| T::from_value(&value))
            .unwrap_or(default)
    }

    /// Boolean at `key`.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_or(key, default)
    }

    /// Platform integer at `key`.
    fn get_int(&self, key: &str, default: isize) -> isize {
        self.get_or(key, default)
    }

    /// 64-bit integer at `key`.
    fn get_int64(&self, key: &str, default: i64) -> i64 {
        self.get_or(key, default)
    }

    /// Platform unsigned integer at `key`.
    fn get_uint(&self, key: &str, default: usize) -> usize {
        self.get_or(key, default)
    }

    /// 64-bit unsigned integer at `key`.
    fn get_uint64(&self, key: &str, default: u64) -> u64 {
        self.get_or(key, default)
    }

    /// Single precision float at `key`.
    fn get_float32(&self, key: &str, default: f32) -> f32 {
        self.get_or(key, default)
    }

    /// Double precision float at `key`.
    fn get_float64(&self, key: &str, default: f64) -> f64 {
        self.get_or(key, default)
    }

    /// String at `key`; scalars are stringified.
    fn get_string(&self, key: &str, default: &str) -> String {
        self.get_or(key, default.to_string())
    }

    /// Duration at `key` (`"30s"`, `"1h30m"`, or a number of seconds).
    fn get_duration(&self, key: &str, default: Duration) -> Duration {
        self.get_or(key, default)
    }

    /// Typed list at `key`. A comma separated string is split; if any
    /// element fails to convert the whole list falls back to `defaults`.
    fn get_slice<T: FromValue>(&self, key: &str, defaults: Vec<T>) -> Vec<T> {
        self.get(key)
            .and_then(|value| coerce::slice_from_value(&value))
            .unwrap_or(defaults)
    }

    #[allow(missing_docs)]
    fn get_string_slice(&self, key: &str, defaults: &[&str]) -> Vec<String> {
        self.get_slice(key, defaults.iter().map(|s| s.to_string()).collect())
    }

    #[allow(missing_docs)]
    fn get_int_slice(&self, key: &str, defaults: &[isize]) -> Vec<isize> {
        self.get_slice(key, defaults.to_vec())
    }

    #[allow(missing_docs)]
    fn get_int64_slice(&self, key: &str, defaults: &[i64]) -> Vec<i64> {
        self.get_slice(key, defaults.to_vec())
    }

    #[allow(missing_docs)]
    fn get_uint64_slice(&self, key: &str, defaults: &[u64]) -> Vec<u64> {
        self.get_slice(key, defaults.to_vec())
    }

    /// Subtree at `key` as a table; empty when absent or not a table.
    fn get_map(&self, key: &str) -> Table {
        match self.get(key) {
            Some(Value::Table(table)) => table,
            _ => Table::new(),
        }
    }

    /// Deserializes the subtree at `key` into `T`.
    ///
    /// An absent subtree is decoded from an empty table, so targets whose
    /// fields all have defaults succeed.
    ///
    /// # Errors
    /// Returns `ConfigError::SectionDecode` when the subtree does not fit `T`.
    fn get_section<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let path = self.resolve(key);
        let value = self
            .store()
            .value_at(&path)
            .unwrap_or_else(|| Value::Table(Table::new()));

        T::deserialize(value).map_err(|e| ConfigError::SectionDecode {
            path,
            details: e.to_string(),
        })
    }

    /// A view whose keys are relative to `section` under this one.
    fn within(&self, section: &str) -> Scoped {
        Scoped {
            store: self.store().clone(),
            base: self.resolve(section),
        }
    }
}

impl Lookup for ConfigStore {
    fn store(&self) -> &ConfigStore {
        self
    }

    fn resolve(&self, key: &str) -> String {
        key.to_string()
    }
}

/// A [`ConfigStore`] handle that prepends a fixed base path to every key.
#[derive(Clone)]
pub struct Scoped {
    store: ConfigStore,
    base: String,
}

impl Scoped {
    /// The path prepended to every key.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Writes `value` at the resolved path.
    ///
    /// # Errors
    /// Same as [`ConfigStore::set_nx`].
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.store.set_nx(&self.resolve(key), value)
    }
}

impl Lookup for Scoped {
    fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn resolve(&self, key: &str) -> String {
        key::join(&self.base, key)
    }
}

impl std::fmt::Debug for Scoped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scoped").field("base", &self.base).finish()
    }
}
