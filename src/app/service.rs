use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, Weak},
    thread::{self, ThreadId},
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle};
use toml::{Table, Value};
use tracing::{debug, info, instrument, warn};

use crate::{
    Result,
    command::{
        ActionContext, CliError, CommandId, CommandTree, Flag, FlagId, FlagValue, add_unique_all,
    },
    config_store::{ConfigChange, ConfigStore, Source, set_value_at_path},
    sources::{ConfigLoader, EnvSource, FileWatcher, scan_env},
    xref::{Xref, XrefError, XrefIndex},
};

use super::{AppBuilder, reload};

struct WatchHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    store: ConfigStore,
    xref: Mutex<Xref>,
    loader: Option<ConfigLoader>,
    env: Arc<dyn EnvSource>,
    env_prefixes: Vec<String>,
    ignore_wrong_enum_value: bool,
    debounce: Duration,
    raw_args: Mutex<Vec<String>>,
    watched: Mutex<Vec<PathBuf>>,
    watch: Mutex<Option<WatchHandle>>,
    rebuilding: Mutex<Option<ThreadId>>,
}

/// Owns the store, the command tree and the xref pipeline of one
/// application, and runs the startup and reload sequences over them.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct AppService {
    inner: Arc<Inner>,
}

/// Non-owning handle held by the reload task, so a watching service can
/// still be dropped.
#[derive(Clone)]
pub(super) struct WeakAppService {
    inner: Weak<Inner>,
}

impl WeakAppService {
    pub(super) fn upgrade(&self) -> Option<AppService> {
        self.inner.upgrade().map(|inner| AppService { inner })
    }
}

impl AppService {
    pub(super) fn from_builder(builder: AppBuilder) -> Self {
        let store = builder.make_store();
        let loader = builder.make_loader();

        Self {
            inner: Arc::new(Inner {
                store,
                loader,
                env: builder.env,
                env_prefixes: builder.env_prefixes,
                ignore_wrong_enum_value: builder.ignore_wrong_enum_value,
                debounce: builder.debounce,
                xref: Mutex::new(Xref::new(builder.tree, builder.hooks)),
                raw_args: Mutex::new(Vec::new()),
                watched: Mutex::new(Vec::new()),
                watch: Mutex::new(None),
                rebuilding: Mutex::new(None),
            }),
        }
    }

    /// The application's configuration store.
    pub fn store(&self) -> &ConfigStore {
        &self.inner.store
    }

    /// Runs `f` with shared access to the command tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&CommandTree) -> R) -> R {
        f(lock(&self.inner.xref).tree())
    }

    /// Runs `f` with mutable access to the command tree. Any change leaves
    /// the index stale until the next [`AppService::rebuild_xref`].
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut CommandTree) -> R) -> R {
        f(lock(&self.inner.xref).tree_mut())
    }

    /// The last successfully built index, stale or not.
    pub fn index(&self) -> Option<Arc<XrefIndex>> {
        lock(&self.inner.xref).index()
    }

    /// Config files found by the last successful load.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        lock(&self.inner.watched).clone()
    }

    /// Runs the startup sequence: xref build, flag defaults, config files
    /// and the environment, each merge step firing the config-loaded hooks.
    ///
    /// # Errors
    /// * `Error::Xref` - If the tree has duplicate aliases
    /// * `Error::Config` - If a config file cannot be read or parsed
    /// * `Error::Cli` - If an environment value is outside a flag's valid set
    #[instrument(skip_all, fields(args = raw_args.len()))]
    pub fn bootstrap(&self, raw_args: &[String]) -> Result<()> {
        *lock(&self.inner.raw_args) = raw_args.to_vec();
        self.rebuild_xref()?;

        let defaults = self.flag_defaults();
        self.inner.store.replace_layer(Source::Default, defaults)?;

        if let Some(loader) = &self.inner.loader {
            let loaded = loader.load()?;
            self.remember_files(loaded.files);
            self.inner.store.replace_layer(Source::File, loaded.table)?;
        }

        let env = self.env_table()?;
        self.inner.store.replace_layer(Source::Env, env)?;

        info!("Application bootstrapped");
        Ok(())
    }

    /// Runs one xref cycle with the raw arguments given to
    /// [`AppService::bootstrap`].
    ///
    /// # Errors
    /// * `XrefError::DuplicateAlias` - The previous index is kept
    /// * `XrefError::Reentrant` - If called from inside an xref hook
    pub fn rebuild_xref(&self) -> Result<Arc<XrefIndex>> {
        let current = thread::current().id();

        if *lock(&self.inner.rebuilding) == Some(current) {
            warn!("xref rebuild requested from inside an xref hook; ignoring");
            return Err(XrefError::Reentrant.into());
        }

        let raw_args = lock(&self.inner.raw_args).clone();
        let mut xref = lock(&self.inner.xref);

        *lock(&self.inner.rebuilding) = Some(current);
        let result = xref.rebuild(&raw_args);
        *lock(&self.inner.rebuilding) = None;

        Ok(result?)
    }

    /// Store key of an attached flag, with the store prefix applied.
    pub fn flag_key(&self, flag: FlagId) -> Option<String> {
        let key = lock(&self.inner.xref).tree().flag_key(flag)?;
        Some(self.inner.store.wrap_with_prefix(&key))
    }

    /// Writes per-invocation flag values into the flag layer.
    ///
    /// Names are resolved on `command` and then on its ancestors. A bool
    /// flag given an empty value is set to `true`. All values are validated
    /// before any is written.
    ///
    /// # Errors
    /// * `CliError::InvalidArguments` - Unknown flag or unparsable value
    /// * `CliError::InvalidEnumValue` - Value outside the flag's valid set,
    ///   unless wrong enum values are ignored
    /// * `Error::Config` - If the store rejects the write
    #[instrument(skip_all, fields(count = overrides.len()))]
    pub fn apply_flag_overrides(
        &self,
        command: CommandId,
        overrides: &[(&str, &str)],
    ) -> Result<Vec<String>> {
        let index = self.current_index()?;
        let mut table = Table::new();
        let mut written = Vec::with_capacity(overrides.len());

        {
            let xref = lock(&self.inner.xref);
            let tree = xref.tree();

            for (name, raw) in overrides {
                let (flag, key) = index
                    .flag(command, name)
                    .and_then(|id| Some((tree.flag(id)?, tree.flag_key(id)?)))
                    .ok_or_else(|| CliError::InvalidArguments(format!("unknown flag '{name}'")))?;

                let value = parse_flag_value(flag, raw)?;
                self.check_enum(flag, &value)?;

                let key = self.inner.store.wrap_with_prefix(&key);
                set_value_at_path(&mut table, &key, value.to_value())?;
                written.push(key);
            }
        }

        if !table.is_empty() {
            self.inner.store.merge_from(Source::Flag, Value::Table(table))?;
        }

        Ok(written)
    }

    /// Runs the action of the command at `path`, an alias path from the
    /// root.
    ///
    /// # Errors
    /// * `CliError::CommandNotFound` - If no command answers to `path`
    /// * `CliError::NoAction` - If the command has no action
    /// * Whatever the action returns
    #[instrument(skip_all, fields(path = %path.join(" ")))]
    pub fn invoke(&self, path: &[&str], args: &[String]) -> Result<String> {
        let index = self.current_index()?;

        let (id, dotted, action) = {
            let xref = lock(&self.inner.xref);
            let tree = xref.tree();

            let id = index
                .resolve(path.iter().copied())
                .ok_or_else(|| CliError::CommandNotFound(path.join(" ")))?;
            let dotted = tree.dotted_path(id);
            let action = tree
                .command(id)
                .and_then(|c| c.action.clone())
                .ok_or_else(|| CliError::NoAction(dotted.clone()))?;

            (id, dotted, action)
        };

        debug!(command = %dotted, "running action");
        let ctx = ActionContext {
            command: id,
            path: &dotted,
            args,
            store: &self.inner.store,
        };

        Ok(action.run(&ctx)?)
    }

    /// Reloads the config files into the file layer and rebuilds the xref
    /// index. Returns how the merged view moved.
    ///
    /// A reload that fails to read or parse leaves the previous values in
    /// place.
    ///
    /// # Errors
    /// * `Error::Config` - If a config file cannot be read or parsed
    /// * `Error::Xref` - If the rebuild finds duplicate aliases
    #[instrument(skip_all)]
    pub fn reload_config(&self) -> Result<Vec<ConfigChange>> {
        let Some(loader) = &self.inner.loader else {
            debug!("config file loading disabled; nothing to reload");
            return Ok(Vec::new());
        };

        let loaded = match loader.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "config reload failed; keeping previous values");
                return Err(e.into());
            }
        };

        self.remember_files(loaded.files);
        let changes = self.inner.store.replace_layer(Source::File, loaded.table)?;
        info!(changes = changes.len(), "Configuration reloaded");

        self.rebuild_xref()?;
        Ok(changes)
    }

    /// Starts the background task that reloads on config file changes.
    ///
    /// Must be called from within a tokio runtime. Calling it while already
    /// watching does nothing.
    ///
    /// # Errors
    /// * `ConfigError::FileWatcherInit` - If the platform watcher fails
    /// * `ConfigError::FileWatch` - If a config directory cannot be watched
    pub async fn start_watching(&self) -> Result<()> {
        let mut watch = lock(&self.inner.watch);
        if watch.is_some() {
            debug!("config watcher already running");
            return Ok(());
        }

        let (mut watcher, events) = FileWatcher::new()?;
        watcher.update_watched_files(&self.watched_files())?;

        let (stop, stopped) = oneshot::channel();
        let task = reload::spawn(self.downgrade(), watcher, events, stopped, self.inner.debounce);

        info!(files = self.watched_files().len(), "Watching config files");
        *watch = Some(WatchHandle { stop, task });
        Ok(())
    }

    /// Stops the watcher task and waits for it to finish. No reload runs
    /// after this returns.
    pub async fn stop_watching(&self) {
        let Some(handle) = lock(&self.inner.watch).take() else {
            return;
        };

        let _ = handle.stop.send(());
        if let Err(e) = handle.task.await {
            warn!(error = %e, "config watcher task ended abnormally");
        }
        debug!("config watcher stopped");
    }

    fn downgrade(&self) -> WeakAppService {
        WeakAppService {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True while the watcher task is running.
    pub fn is_watching(&self) -> bool {
        lock(&self.inner.watch).is_some()
    }

    fn current_index(&self) -> Result<Arc<XrefIndex>> {
        let fresh = lock(&self.inner.xref).fresh_index();
        match fresh {
            Some(index) => Ok(index),
            None => self.rebuild_xref(),
        }
    }

    fn remember_files(&self, files: Vec<PathBuf>) {
        let mut watched = lock(&self.inner.watched);
        add_unique_all(&mut watched, files);
    }

    fn check_enum(&self, flag: &Flag, value: &FlagValue) -> Result<()> {
        if flag.accepts(value) {
            return Ok(());
        }

        if self.inner.ignore_wrong_enum_value {
            warn!(
                flag = %flag.titles.full,
                value = %value.display_value(),
                "value outside the valid set; accepting it anyway"
            );
            return Ok(());
        }

        Err(CliError::InvalidEnumValue {
            flag: flag.titles.full.clone(),
            value: value.display_value(),
            allowed: flag.valid_args.clone(),
        }
        .into())
    }

    fn flag_defaults(&self) -> Table {
        let xref = lock(&self.inner.xref);
        let tree = xref.tree();
        let mut table = Table::new();

        for id in tree.attached_flags() {
            let (Some(flag), Some(key)) = (tree.flag(id), tree.flag_key(id)) else {
                continue;
            };
            let key = self.inner.store.wrap_with_prefix(&key);

            if let Err(e) = set_value_at_path(&mut table, &key, flag.default.to_value()) {
                warn!(key = %key, error = %e, "skipping flag default");
            }
        }

        table
    }

    fn env_table(&self) -> Result<Table> {
        let env = self.inner.env.as_ref();
        let mut table = scan_env(env, &self.inner.env_prefixes, self.inner.store.prefix());

        let xref = lock(&self.inner.xref);
        let tree = xref.tree();

        for id in tree.attached_flags() {
            let (Some(flag), Some(key)) = (tree.flag(id), tree.flag_key(id)) else {
                continue;
            };
            let Some((name, raw)) = flag
                .env_vars
                .iter()
                .find_map(|name| env.var(name).map(|raw| (name, raw)))
            else {
                continue;
            };

            let Some(value) = flag.default.parse_like(&raw) else {
                warn!(
                    var = %name,
                    kind = flag.default.kind(),
                    "environment value does not fit the flag type; ignoring"
                );
                continue;
            };
            self.check_enum(flag, &value)?;

            let key = self.inner.store.wrap_with_prefix(&key);
            set_value_at_path(&mut table, &key, value.to_value())?;
        }

        Ok(table)
    }
}

impl std::fmt::Debug for AppService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppService")
            .field("store", &self.inner.store)
            .field("env_prefixes", &self.inner.env_prefixes)
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

fn parse_flag_value(flag: &Flag, raw: &str) -> Result<FlagValue> {
    if raw.is_empty() && matches!(flag.default, FlagValue::Bool(_)) {
        return Ok(FlagValue::Bool(true));
    }

    flag.default.parse_like(raw).ok_or_else(|| {
        CliError::InvalidArguments(format!(
            "invalid {} value '{raw}' for flag '{}'",
            flag.default.kind(),
            flag.titles.full
        ))
        .into()
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
