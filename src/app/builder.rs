use std::{sync::Arc, time::Duration};

use crate::{
    command::CommandTree,
    config_store::{ConfigHook, ConfigLoaded, ConfigStore, DEFAULT_PREFIX},
    sources::{ConfigLoader, EnvSource, FileSystem, Format, OsFileSystem, ProcessEnv},
    xref::{HookPipeline, XrefIndex},
};

use super::AppService;

/// Location templates searched when none are configured.
///
/// Each entry is a path without extension; `{app}` is replaced with the
/// application name.
pub const DEFAULT_LOCATIONS: [&str; 4] = [
    "./ci/etc/{app}/{app}",
    "/etc/{app}/{app}",
    "~/.config/{app}/{app}",
    "~/.{app}/{app}",
];

/// Quiet period after the last file event before a reload runs.
pub const DEFAULT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Collects the options for an [`AppService`].
///
/// ```
/// use cmdopt::{app::AppBuilder, command::TreeBuilder};
///
/// let mut tree = TreeBuilder::new("demo", "1.0.0");
/// tree.new_sub_cmd().titles("s", "server");
///
/// let app = AppBuilder::new(tree.build())
///     .with_env_prefix(&["DEMO"])
///     .with_no_load_config_files(true)
///     .build();
/// assert_eq!(app.store().prefix(), ["app"]);
/// ```
pub struct AppBuilder {
    pub(super) tree: CommandTree,
    pub(super) hooks: HookPipeline,
    prefix: Vec<String>,
    pub(super) env_prefixes: Vec<String>,
    locations: Vec<String>,
    extensions: Vec<String>,
    no_load_config_files: bool,
    pub(super) ignore_wrong_enum_value: bool,
    listeners: Vec<Arc<ConfigHook>>,
    pub(super) env: Arc<dyn EnvSource>,
    fs: Arc<dyn FileSystem>,
    pub(super) debounce: Duration,
}

impl AppBuilder {
    /// Starts from a built command tree with every option at its default.
    pub fn new(tree: CommandTree) -> Self {
        let env_prefixes = vec![tree.meta().app_name.to_uppercase()];

        Self {
            tree,
            hooks: HookPipeline::new(),
            prefix: vec![DEFAULT_PREFIX.to_string()],
            env_prefixes,
            locations: DEFAULT_LOCATIONS.iter().map(|l| l.to_string()).collect(),
            extensions: Format::EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            no_load_config_files: false,
            ignore_wrong_enum_value: false,
            listeners: Vec::new(),
            env: Arc::new(ProcessEnv),
            fs: Arc::new(OsFileSystem),
            debounce: DEFAULT_RELOAD_DEBOUNCE,
        }
    }

    /// Namespace segments the store prepends for prefixed access and flag
    /// keys. An empty slice disables the prefix.
    pub fn with_options_prefix(mut self, segments: &[&str]) -> Self {
        self.prefix = segments.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Environment variable prefixes scanned at startup, in increasing
    /// precedence.
    pub fn with_env_prefix(mut self, prefixes: &[&str]) -> Self {
        self.env_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Replaces the config file location templates.
    pub fn with_predefined_locations(mut self, locations: &[&str]) -> Self {
        self.locations = locations.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Replaces the extensions tried for each location.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Skips the config file step entirely; reloads become no-ops.
    pub fn with_no_load_config_files(mut self, skip: bool) -> Self {
        self.no_load_config_files = skip;
        self
    }

    /// Accepts values outside a flag's valid set with a warning instead of
    /// failing.
    pub fn with_ignore_wrong_enum_value(mut self, ignore: bool) -> Self {
        self.ignore_wrong_enum_value = ignore;
        self
    }

    /// Registers a hook pair for the xref build phases.
    pub fn with_xref_building_hooks<B, A>(self, before: B, after: A) -> Self
    where
        B: Fn(&mut CommandTree, &[String]) + Send + Sync + 'static,
        A: Fn(&CommandTree, &XrefIndex, &[String]) + Send + Sync + 'static,
    {
        self.with_before_xref_building(before).with_after_xref_built(after)
    }

    /// Registers a hook run before every xref build.
    pub fn with_before_xref_building<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut CommandTree, &[String]) + Send + Sync + 'static,
    {
        self.hooks.on_before_xref_building(hook);
        self
    }

    /// Registers a hook run after every successful xref build.
    pub fn with_after_xref_built<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommandTree, &XrefIndex, &[String]) + Send + Sync + 'static,
    {
        self.hooks.on_after_xref_built(hook);
        self
    }

    /// Registers a hook run after every merge step on the store.
    pub fn with_config_loaded_listener<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConfigLoaded) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(hook));
        self
    }

    /// Replaces the process environment, mostly for tests.
    pub fn with_env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Replaces the file system used by the config loader.
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    /// Quiet period between the last file event and the reload.
    pub fn with_reload_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub(super) fn make_store(&self) -> ConfigStore {
        let store = ConfigStore::with_prefix(self.prefix.clone());

        for listener in &self.listeners {
            let listener = Arc::clone(listener);
            store.on_config_loaded(move |loaded| listener(loaded));
        }

        store
    }

    pub(super) fn make_loader(&self) -> Option<ConfigLoader> {
        if self.no_load_config_files {
            return None;
        }

        Some(
            ConfigLoader::new(self.tree.meta().app_name.clone(), self.locations.clone())
                .with_extensions(self.extensions.clone())
                .with_file_system(Arc::clone(&self.fs)),
        )
    }

    /// Finishes configuration. Nothing is loaded until
    /// [`AppService::bootstrap`] runs.
    pub fn build(self) -> AppService {
        AppService::from_builder(self)
    }
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("app", &self.tree.meta().app_name)
            .field("prefix", &self.prefix)
            .field("env_prefixes", &self.env_prefixes)
            .field("locations", &self.locations)
            .field("no_load_config_files", &self.no_load_config_files)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
