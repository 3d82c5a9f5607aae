use std::{fmt, path::PathBuf, time::Instant};

use toml::Value;

use super::path_ops::path_matches;

/// Which merge step wrote a value.
///
/// Variants are ordered by precedence: a value written by a later variant
/// shadows the same path written by an earlier one, regardless of the order
/// in which the writes happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Built-in defaults, usually registered from flag declarations.
    Default,
    /// On-disk configuration files.
    File,
    /// Environment variables.
    Env,
    /// Programmatic `set` / `merge_with` calls.
    Explicit,
    /// Per-invocation command-line flag values.
    Flag,
}

impl Source {
    /// All sources in increasing precedence.
    pub const ALL: [Source; 5] = [
        Source::Default,
        Source::File,
        Source::Env,
        Source::Explicit,
        Source::Flag,
    ];

    pub(super) fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Default => "default",
            Source::File => "file",
            Source::Env => "env",
            Source::Explicit => "explicit",
            Source::Flag => "flag",
        };
        f.write_str(name)
    }
}

/// Represents a configuration change with path-based identification.
///
/// Produced when a reload replaces the file layer and the merged view moves.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    /// Path to the changed field using dot notation (e.g., "app.server.port").
    pub path: String,
    /// The previous value of the field, if there was one.
    pub old_value: Option<Value>,
    /// The new value of the field, `None` when the field disappeared.
    pub new_value: Option<Value>,
    /// The merge step responsible for the change.
    pub source: Source,
    /// Timestamp when the change was detected.
    pub timestamp: Instant,
}

impl ConfigChange {
    /// Creates a new configuration change stamped with the current instant.
    pub fn new(
        path: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
        source: Source,
    ) -> Self {
        Self {
            path,
            old_value,
            new_value,
            source,
            timestamp: Instant::now(),
        }
    }

    /// Extracts the new value as a specific type.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SectionDecode` if the field was removed or the
    /// value cannot be deserialized into the requested type.
    pub fn extract<T>(&self) -> Result<T, ConfigError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.new_value.clone().ok_or_else(|| ConfigError::SectionDecode {
            path: self.path.clone(),
            details: "field was removed".to_string(),
        })?;

        T::deserialize(value).map_err(|e| ConfigError::SectionDecode {
            path: self.path.clone(),
            details: format!("expected {}: {e}", std::any::type_name::<T>()),
        })
    }
}

/// Payload handed to `on_config_loaded` hooks after a successful merge step.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLoaded {
    /// The merge step that just completed.
    pub source: Source,
    /// Leaf paths written by the step, in merge order.
    pub paths: Vec<String>,
}

impl ConfigLoaded {
    /// Returns true when any written path matches `pattern` (`*` wildcards).
    ///
    /// ```
    /// use cmdopt::config_store::{ConfigLoaded, Source};
    ///
    /// let loaded = ConfigLoaded {
    ///     source: Source::File,
    ///     paths: vec!["app.server.port".to_string()],
    /// };
    /// assert!(loaded.touches("app.server.*"));
    /// assert!(!loaded.touches("app.logger.*"));
    /// ```
    pub fn touches(&self, pattern: &str) -> bool {
        self.paths.iter().any(|path| path_matches(path, pattern))
    }
}

/// Errors that can occur during configuration operations.
///
/// Lookups never produce these: a missing key or a failed coercion resolves
/// to the caller's default. Only structural operations report errors, and
/// they leave the store untouched when they do.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The path is malformed (empty segment) or runs through a leaf.
    #[error("invalid config path: {0}")]
    InvalidPath(String),

    /// An operation that needs a key or directory got an empty string.
    #[error("empty path given to {operation}")]
    EmptyPath {
        /// The operation that rejected the path
        operation: &'static str,
    },

    /// The mapping handed to a merge cannot be read as nested mappings.
    #[error("cannot merge {what}: {details}")]
    StructuralMerge {
        /// What was being merged (a source name or a file)
        what: String,
        /// Why the input was rejected
        details: String,
    },

    /// A subtree could not be turned into the caller's target type.
    #[error("failed to decode section '{path}': {details}")]
    SectionDecode {
        /// Section root path
        path: String,
        /// Deserializer message
        details: String,
    },

    /// A config payload could not be parsed.
    #[error("failed to parse {format} from {location}: {details}")]
    Decode {
        /// Payload format name
        format: &'static str,
        /// Where the payload came from (file path or "string")
        location: String,
        /// Parser message
        details: String,
    },

    /// The store could not be encoded in the requested format.
    #[error("failed to encode {format}: {details}")]
    Encode {
        /// Target format name
        format: &'static str,
        /// Serializer message
        details: String,
    },

    /// Error occurred during file I/O operations
    #[error("I/O error on '{path}': {details}")]
    Io {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Error occurred while acquiring locks for thread-safe access
    #[error("failed to acquire {lock_type} lock: {details}")]
    LockError {
        /// Type of lock that failed (read, write)
        lock_type: String,
        /// Lock error details
        details: String,
    },

    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {details}")]
    FileWatcherInit {
        /// File watcher initialization error details
        details: String,
    },

    /// Error occurred while watching a specific file
    #[error("file watcher error for '{path}': {details}")]
    FileWatch {
        /// Path being watched when error occurred
        path: PathBuf,
        /// File watcher error details
        details: String,
    },
}
