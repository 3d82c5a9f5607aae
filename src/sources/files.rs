use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use toml::Table;
use tracing::{debug, info, instrument};

use super::{codec::Format, paths};
use crate::config_store::{ConfigError, merge_tables};

/// Placeholder replaced by the application name in location templates.
pub const APP_PLACEHOLDER: &str = "{app}";

/// Drop-in directory read next to every matched config file.
pub const DROP_IN_DIR: &str = "conf.d";

/// File-system access used by the loader.
pub trait FileSystem: Send + Sync {
    /// True when `path` is an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Reads the whole file as UTF-8.
    ///
    /// # Errors
    /// Any I/O error from the underlying file system.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Entries of a directory; an absent directory yields no entries.
    ///
    /// # Errors
    /// Any I/O error other than the directory not existing.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        paths::is_regular_file(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        match fs::read_dir(path) {
            Ok(entries) => entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<io::Result<Vec<_>>>(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Result of one pass over the configured locations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedFiles {
    /// All matched files merged in discovery order.
    pub table: Table,
    /// Every file that contributed, for the watcher.
    pub files: Vec<PathBuf>,
}

/// Finds and merges configuration files from a list of location templates.
///
/// Each location is a path without extension, such as
/// `~/.config/{app}/{app}`. For each location the recognised extensions are
/// tried in order and the first existing file wins; every location that
/// matched contributes, in listed order. After a file is merged, the files
/// of its sibling `conf.d/` directory are merged in name order.
#[derive(Clone)]
pub struct ConfigLoader {
    app_name: String,
    locations: Vec<String>,
    extensions: Vec<String>,
    fs: Arc<dyn FileSystem>,
}

impl ConfigLoader {
    /// Creates a loader over the real file system.
    pub fn new(app_name: impl Into<String>, locations: Vec<String>) -> Self {
        Self {
            app_name: app_name.into(),
            locations,
            extensions: Format::EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            fs: Arc::new(OsFileSystem),
        }
    }

    /// Restricts or reorders the extensions tried per location.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Replaces the file-system collaborator.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// The location templates with `{app}` substituted and the result
    /// normalized.
    pub fn resolved_locations(&self) -> Vec<PathBuf> {
        self.locations
            .iter()
            .map(|template| paths::normalize_dir(&template.replace(APP_PLACEHOLDER, &self.app_name)))
            .collect()
    }

    /// Reads and merges every matching file.
    ///
    /// # Errors
    /// * `ConfigError::Io` - If a matched file cannot be read
    /// * `ConfigError::Decode` - If a matched file is malformed
    /// * `ConfigError::StructuralMerge` - If a file root is not a mapping
    #[instrument(skip(self), fields(app = %self.app_name))]
    pub fn load(&self) -> Result<LoadedFiles, ConfigError> {
        let mut loaded = LoadedFiles::default();

        for location in self.resolved_locations() {
            let Some(path) = self.first_match(&location) else {
                continue;
            };

            self.merge_file(&path, &mut loaded)?;

            let drop_in = path
                .parent()
                .map(|dir| dir.join(DROP_IN_DIR))
                .unwrap_or_else(|| PathBuf::from(DROP_IN_DIR));

            for extra in self.drop_in_files(&drop_in)? {
                self.merge_file(&extra, &mut loaded)?;
            }
        }

        info!(files = loaded.files.len(), "Loaded config files");
        Ok(loaded)
    }

    fn first_match(&self, location: &Path) -> Option<PathBuf> {
        self.extensions.iter().find_map(|ext| {
            let mut candidate = location.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);

            self.fs.is_file(&candidate).then_some(candidate)
        })
    }

    fn drop_in_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files: Vec<PathBuf> = self
            .fs
            .read_dir(dir)
            .map_err(|e| ConfigError::Io {
                path: dir.to_path_buf(),
                details: e.to_string(),
            })?
            .into_iter()
            .filter(|p| self.recognised(p) && self.fs.is_file(p))
            .collect();

        files.sort();
        Ok(files)
    }

    fn recognised(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
    }

    fn merge_file(&self, path: &Path, loaded: &mut LoadedFiles) -> Result<(), ConfigError> {
        let Some(format) = Format::from_path(path) else {
            return Ok(());
        };

        let content = self.fs.read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        let table = format.decode(&content, &path.display().to_string())?;
        debug!(path = %path.display(), keys = table.len(), "merging config file");

        merge_tables(&mut loaded.table, table);
        loaded.files.push(path.to_path_buf());
        Ok(())
    }
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("app_name", &self.app_name)
            .field("locations", &self.locations)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
