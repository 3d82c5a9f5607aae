//! Where configuration values come from: files, the environment, and the
//! codecs and path helpers around them.

/// YAML / JSON / TOML encoding of configuration tables.
pub mod codec;
mod env;
mod file_watcher;
mod files;
mod paths;

pub use codec::Format;
pub use env::{EnvSource, ProcessEnv, scan_env};
pub use file_watcher::{FileEvent, FileEventKind, FileWatcher};
pub use files::{
    APP_PLACEHOLDER, ConfigLoader, DROP_IN_DIR, FileSystem, LoadedFiles, OsFileSystem,
};
pub use paths::{
    config_dir, current_dir, ensure_dir, executable_dir, expand_home, file_exists, is_directory,
    is_regular_file, normalize_dir, remove_dir_recursive,
};
