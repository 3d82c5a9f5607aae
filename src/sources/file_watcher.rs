use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config_store::ConfigError;

/// A change to one watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// The path that changed
    pub path: PathBuf,
    /// What happened to it
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was modified
    Modified,
    /// File was created (including the target of a rename)
    Created,
    /// File was removed
    Removed,
}

/// Watches the directories of a set of config files and reports events for
/// those files only.
///
/// Directories are watched instead of the files because editors commonly
/// replace a file by renaming a new one over it, which drops a watch placed
/// on the old inode.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched_dirs: HashSet<PathBuf>,
    files: Arc<RwLock<HashSet<PathBuf>>>,
}

impl FileWatcher {
    /// Creates a watcher and the receiver its events arrive on.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatcherInit` if the platform watcher cannot
    /// be created.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), ConfigError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let files = Arc::new(RwLock::new(HashSet::<PathBuf>::new()));
        let filter = Arc::clone(&files);

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileEventKind::Created,
                EventKind::Modify(_) => FileEventKind::Modified,
                EventKind::Remove(_) => FileEventKind::Removed,
                _ => return,
            };

            let watched = match filter.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            for path in event.paths {
                if watched.contains(&path) {
                    let _ = event_tx.send(FileEvent { path, kind });
                }
            }
        })
        .map_err(|e| ConfigError::FileWatcherInit {
            details: e.to_string(),
        })?;

        Ok((
            Self {
                watcher,
                watched_dirs: HashSet::new(),
                files,
            },
            event_rx,
        ))
    }

    /// Replaces the set of watched files.
    ///
    /// Paths are made absolute; files that do not exist yet are still
    /// tracked as long as their directory exists, so creating them later is
    /// reported.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatch` if a directory cannot be watched.
    pub fn update_watched_files(&mut self, new_files: &[PathBuf]) -> Result<(), ConfigError> {
        let wanted: HashSet<PathBuf> = new_files.iter().map(|p| absolute(p)).collect();
        let wanted_dirs: HashSet<PathBuf> =
            wanted.iter().filter_map(|p| p.parent().map(Path::to_path_buf)).collect();

        for dir in self.watched_dirs.difference(&wanted_dirs) {
            if let Err(e) = self.watcher.unwatch(dir) {
                debug!(dir = %dir.display(), error = %e, "failed to unwatch directory");
            }
        }

        for dir in wanted_dirs.difference(&self.watched_dirs) {
            if !dir.is_dir() {
                continue;
            }
            self.watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| ConfigError::FileWatch {
                    path: dir.clone(),
                    details: e.to_string(),
                })?;
        }

        self.watched_dirs = wanted_dirs.into_iter().filter(|d| d.is_dir()).collect();

        match self.files.write() {
            Ok(mut files) => *files = wanted,
            Err(poisoned) => *poisoned.into_inner() = wanted,
        }

        Ok(())
    }

    /// Files currently reported on.
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let files = match self.files.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        files.iter().cloned().collect()
    }
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match (joined.parent().and_then(|p| p.canonicalize().ok()), joined.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => joined,
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watched_dirs", &self.watched_dirs)
            .finish_non_exhaustive()
    }
}
