use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, RwLock, RwLockWriteGuard},
    thread::{self, ThreadId},
};

use toml::{Table, Value};
use tracing::{debug, instrument, warn};

use super::{
    ConfigChange, ConfigError, ConfigLoaded, Scoped, Source,
    diff::diff_tables,
    key,
    merging::{merge_layers, merge_tables},
    path_ops::{navigate_path, set_value_at_path, table_paths},
};
use crate::sources::codec::Format;

/// Callback fired after every successful merge step.
pub type ConfigHook = dyn Fn(&ConfigLoaded) + Send + Sync;

/// Default namespace prepended by the prefixed accessors.
pub const DEFAULT_PREFIX: &str = "app";

/// One table per [`Source`] plus the folded view that readers see.
#[derive(Debug, Default)]
struct Layers {
    by_source: [Table; Source::ALL.len()],
    merged: Table,
}

impl Layers {
    fn recompute(&mut self) {
        self.merged = merge_layers(self.by_source.iter());
    }

    fn write(&mut self, source: Source, path: &str, value: Value) -> Result<(), ConfigError> {
        let mut layer = self.by_source[source.rank()].clone();
        set_value_at_path(&mut layer, path, value)?;
        self.by_source[source.rank()] = layer;
        self.recompute();
        Ok(())
    }

    fn merge(&mut self, source: Source, overlay: Table) -> Vec<String> {
        let paths = table_paths(&overlay, "");
        merge_tables(&mut self.by_source[source.rank()], overlay);
        self.recompute();
        paths
    }

    fn replace(&mut self, source: Source, table: Table) -> Vec<ConfigChange> {
        let before = std::mem::take(&mut self.merged);
        self.by_source[source.rank()] = table;
        self.recompute();
        diff_tables(&before, &self.merged, source)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn source_of(&self, path: &str) -> Option<Source> {
        if path.is_empty() {
            return Source::ALL
                .into_iter()
                .rev()
                .find(|source| !self.by_source[source.rank()].is_empty());
        }

        Source::ALL
            .into_iter()
            .rev()
            .find(|source| navigate_path(&self.by_source[source.rank()], path).is_some())
    }
}

/// Thread-safe hierarchical configuration store.
///
/// Values live in one layer per [`Source`]; readers see the layers folded
/// in precedence order, so a flag value shadows an explicit `set`, which
/// shadows the environment, then files, then defaults, no matter which was
/// written last. Within a layer a later write replaces an earlier one, and
/// a leaf written over a subtree replaces the subtree.
///
/// Clones share the same state, prefix and hook list.
#[derive(Clone)]
pub struct ConfigStore {
    state: Arc<RwLock<Layers>>,
    prefix: Arc<Vec<String>>,
    hooks: Arc<RwLock<Vec<Arc<ConfigHook>>>>,
    dispatching: Arc<Mutex<Vec<ThreadId>>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Creates an empty store with the default `["app"]` prefix.
    pub fn new() -> Self {
        Self::with_prefix(vec![DEFAULT_PREFIX.to_string()])
    }

    /// Creates an empty store owning `prefix`.
    ///
    /// Empty segments are dropped.
    pub fn with_prefix(prefix: Vec<String>) -> Self {
        let prefix = prefix.into_iter().filter(|s| !s.is_empty()).collect();

        Self {
            state: Arc::new(RwLock::new(Layers::default())),
            prefix: Arc::new(prefix),
            hooks: Arc::new(RwLock::new(Vec::new())),
            dispatching: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The namespace segments used by [`ConfigStore::prefixed`].
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    /// Composes the store prefix with `key`. Does not touch the store.
    pub fn wrap_with_prefix(&self, key: &str) -> String {
        key::wrap_with_prefix(&self.prefix, key)
    }

    /// A view that reads and writes under the store prefix.
    pub fn prefixed(&self) -> Scoped {
        super::Lookup::within(self, &key::wrap_with_prefix(&self.prefix, ""))
    }

    pub(super) fn value_at(&self, path: &str) -> Option<Value> {
        let state = self.read_state();

        if path.is_empty() {
            return Some(Value::Table(state.merged.clone()));
        }

        navigate_path(&state.merged, path).cloned()
    }

    /// Writes `value` at the exact `path` in the explicit layer, creating
    /// intermediate tables.
    ///
    /// # Errors
    /// * `ConfigError::EmptyPath` - If `path` is empty
    /// * `ConfigError::InvalidPath` - If `path` has an empty segment
    /// * `ConfigError::LockError` - If the store lock is poisoned
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.set_from(Source::Explicit, path, value)
    }

    /// The exact-path write used by the prefixed view after it has wrapped
    /// the key. Behaves like [`ConfigStore::set`].
    ///
    /// # Errors
    /// Same as [`ConfigStore::set`].
    pub fn set_nx(&self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.set_from(Source::Explicit, path, value)
    }

    /// Writes `value` at `path` in the layer for `source`.
    ///
    /// # Errors
    /// Same as [`ConfigStore::set`].
    pub fn set_from(
        &self,
        source: Source,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        let value = value.into();
        self.write_state()?.write(source, path, value)
    }

    /// Recursively merges `value` into the explicit layer.
    ///
    /// # Errors
    /// * `ConfigError::StructuralMerge` - If `value` is not a table or holds
    ///   keys that cannot be path segments; the store is left untouched
    /// * `ConfigError::LockError` - If the store lock is poisoned
    pub fn merge_with(&self, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.merge_from(Source::Explicit, value)
    }

    /// Recursively merges `value` into the layer for `source` and fires the
    /// config-loaded hooks.
    ///
    /// # Errors
    /// Same as [`ConfigStore::merge_with`].
    #[instrument(skip_all, fields(source = %source))]
    pub fn merge_from(&self, source: Source, value: impl Into<Value>) -> Result<(), ConfigError> {
        let overlay = validate_mapping(source, value.into())?;

        let paths = self.write_state()?.merge(source, overlay);
        debug!(count = paths.len(), "merged config values");

        self.dispatch(&ConfigLoaded { source, paths });
        Ok(())
    }

    /// Swaps out the whole layer for `source`, returning how the merged
    /// view moved. Used by reloads so keys deleted from a file disappear.
    ///
    /// # Errors
    /// Same as [`ConfigStore::merge_with`].
    #[instrument(skip_all, fields(source = %source))]
    pub fn replace_layer(
        &self,
        source: Source,
        table: Table,
    ) -> Result<Vec<ConfigChange>, ConfigError> {
        let table = validate_mapping(source, Value::Table(table))?;
        let paths = table_paths(&table, "");

        let changes = self.write_state()?.replace(source, table);
        debug!(changes = changes.len(), "replaced config layer");

        self.dispatch(&ConfigLoaded { source, paths });
        Ok(changes)
    }

    /// Clears every layer. Registered hooks are kept.
    ///
    /// # Errors
    /// Returns `ConfigError::LockError` if the store lock is poisoned.
    pub fn reset(&self) -> Result<(), ConfigError> {
        self.write_state()?.clear();
        Ok(())
    }

    /// Ordered snapshot of the merged view.
    pub fn dump_hierarchy(&self) -> Table {
        self.read_state().merged.clone()
    }

    /// The highest precedence layer holding `path`.
    pub fn source_of(&self, path: &str) -> Option<Source> {
        self.read_state().source_of(path)
    }

    /// Registers a callback run after every successful merge step.
    ///
    /// Callbacks run in registration order on the thread that performed the
    /// merge. A callback registered while hooks are running is first called
    /// on the next merge.
    pub fn on_config_loaded<F>(&self, hook: F)
    where
        F: Fn(&ConfigLoaded) + Send + Sync + 'static,
    {
        match self.hooks.write() {
            Ok(mut hooks) => hooks.push(Arc::new(hook)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(hook)),
        }
    }

    /// Holds exclusive write access across several operations.
    ///
    /// Readers block until the guard is dropped. Hooks for merges done
    /// through the guard fire after it is released.
    ///
    /// # Errors
    /// Returns `ConfigError::LockError` if the store lock is poisoned.
    pub fn write_access(&self) -> Result<WriteAccess<'_>, ConfigError> {
        Ok(WriteAccess {
            store: self,
            guard: Some(self.write_state()?),
            pending: Vec::new(),
        })
    }

    /// The merged view encoded as YAML.
    ///
    /// # Errors
    /// Returns `ConfigError::Encode` if serialization fails.
    pub fn as_yaml(&self) -> Result<String, ConfigError> {
        Format::Yaml.encode(&self.dump_hierarchy())
    }

    /// The merged view encoded as pretty JSON.
    ///
    /// # Errors
    /// Returns `ConfigError::Encode` if serialization fails.
    pub fn as_json(&self) -> Result<String, ConfigError> {
        Format::Json.encode(&self.dump_hierarchy())
    }

    /// The merged view encoded as TOML.
    ///
    /// # Errors
    /// Returns `ConfigError::Encode` if serialization fails.
    pub fn as_toml(&self) -> Result<String, ConfigError> {
        Format::Toml.encode(&self.dump_hierarchy())
    }

    /// Writes the merged view to `path` in `format`.
    ///
    /// The content goes to a sibling temp file first and is renamed into
    /// place, so readers never see a half written file.
    ///
    /// # Errors
    /// * `ConfigError::Encode` - If serialization fails
    /// * `ConfigError::Io` - If the temp file cannot be written or renamed
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save_as(&self, path: &Path, format: Format) -> Result<(), ConfigError> {
        let content = format.encode(&self.dump_hierarchy())?;

        let temp_path = path.with_extension(format!("{}.tmp", format.extension()));
        fs::write(&temp_path, content).map_err(|e| ConfigError::Io {
            path: temp_path.clone(),
            details: e.to_string(),
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        debug!("saved config snapshot");
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, Layers> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, Layers>, ConfigError> {
        self.state.write().map_err(|e| ConfigError::LockError {
            lock_type: "write".to_string(),
            details: e.to_string(),
        })
    }

    fn dispatch(&self, loaded: &ConfigLoaded) {
        let current = thread::current().id();

        {
            let mut active = match self.dispatching.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if active.contains(&current) {
                warn!(
                    source = %loaded.source,
                    "config-loaded hook triggered another merge; skipping nested dispatch"
                );
                return;
            }
            active.push(current);
        }

        let snapshot: Vec<Arc<ConfigHook>> = match self.hooks.read() {
            Ok(hooks) => hooks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for hook in snapshot {
            hook(loaded);
        }

        let mut active = match self.dispatching.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.retain(|id| *id != current);
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("prefix", &self.prefix)
            .field("merged", &self.read_state().merged)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`ConfigStore`], from
/// [`ConfigStore::write_access`].
pub struct WriteAccess<'a> {
    store: &'a ConfigStore,
    guard: Option<RwLockWriteGuard<'a, Layers>>,
    pending: Vec<ConfigLoaded>,
}

impl WriteAccess<'_> {
    fn layers(&mut self) -> Result<&mut Layers, ConfigError> {
        self.guard.as_deref_mut().ok_or_else(|| ConfigError::LockError {
            lock_type: "write".to_string(),
            details: "write access already released".to_string(),
        })
    }

    /// Reads the merged view while holding the guard.
    pub fn get(&self, path: &str) -> Option<Value> {
        let layers = self.guard.as_deref()?;

        if path.is_empty() {
            return Some(Value::Table(layers.merged.clone()));
        }
        navigate_path(&layers.merged, path).cloned()
    }

    /// See [`ConfigStore::set`].
    ///
    /// # Errors
    /// Same as [`ConfigStore::set`].
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.layers()?.write(Source::Explicit, path, value.into())
    }

    /// See [`ConfigStore::merge_from`].
    ///
    /// # Errors
    /// Same as [`ConfigStore::merge_with`].
    pub fn merge_from(&mut self, source: Source, value: impl Into<Value>) -> Result<(), ConfigError> {
        let overlay = validate_mapping(source, value.into())?;
        let paths = self.layers()?.merge(source, overlay);
        self.pending.push(ConfigLoaded { source, paths });
        Ok(())
    }

    /// See [`ConfigStore::replace_layer`].
    ///
    /// # Errors
    /// Same as [`ConfigStore::merge_with`].
    pub fn replace_layer(
        &mut self,
        source: Source,
        table: Table,
    ) -> Result<Vec<ConfigChange>, ConfigError> {
        let table = validate_mapping(source, Value::Table(table))?;
        let paths = table_paths(&table, "");
        let changes = self.layers()?.replace(source, table);
        self.pending.push(ConfigLoaded { source, paths });
        Ok(changes)
    }

    /// See [`ConfigStore::reset`].
    ///
    /// # Errors
    /// Returns `ConfigError::LockError` if the guard was already released.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.layers()?.clear();
        Ok(())
    }
}

impl Drop for WriteAccess<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        for loaded in std::mem::take(&mut self.pending) {
            self.store.dispatch(&loaded);
        }
    }
}

/// Checks that `value` can be merged as nested mappings keyed by path
/// segments.
fn validate_mapping(source: Source, value: Value) -> Result<Table, ConfigError> {
    let Value::Table(table) = value else {
        return Err(ConfigError::StructuralMerge {
            what: source.to_string(),
            details: format!("expected a mapping at the root, found {}", value.type_str()),
        });
    };

    check_keys(source, &table, "")?;
    Ok(table)
}

fn check_keys(source: Source, table: &Table, prefix: &str) -> Result<(), ConfigError> {
    for (name, value) in table {
        if name.is_empty() || name.contains(key::SEPARATOR) {
            return Err(ConfigError::StructuralMerge {
                what: source.to_string(),
                details: format!("key '{name}' under '{prefix}' is not a valid path segment"),
            });
        }

        if let Value::Table(child) = value {
            check_keys(source, child, &key::join(prefix, name))?;
        }
    }

    Ok(())
}
