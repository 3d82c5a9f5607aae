use std::{
    env, fs, io,
    path::{Component, Path, PathBuf},
};

use crate::config_store::ConfigError;

/// Expands `~` and `$VAR` / `${VAR}` references, then removes `.` and
/// `..` components lexically. Unset variables expand to nothing.
///
/// ```
/// use std::path::PathBuf;
/// use cmdopt::sources::normalize_dir;
///
/// assert_eq!(normalize_dir("/etc/./demo/../cmdopt"), PathBuf::from("/etc/cmdopt"));
/// ```
pub fn normalize_dir(raw: &str) -> PathBuf {
    let expanded = expand_vars(&expand_home(raw));
    let mut out = PathBuf::new();

    for component in Path::new(&expanded).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() && !expanded.is_empty() {
        out.push(".");
    }

    out
}

/// Replaces a leading `~` with `$HOME`.
pub fn expand_home(raw: &str) -> String {
    let Some(rest) = raw.strip_prefix('~') else {
        return raw.to_string();
    };

    if !(rest.is_empty() || rest.starts_with('/')) {
        return raw.to_string();
    }

    match env::var("HOME") {
        Ok(home) => format!("{home}{rest}"),
        Err(_) => raw.to_string(),
    }
}

fn expand_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if braced {
            if chars.peek() == Some(&'}') {
                chars.next();
            } else {
                out.push_str("${");
                out.push_str(&name);
                continue;
            }
        }

        if name.is_empty() {
            out.push('$');
            continue;
        }

        out.push_str(&env::var(&name).unwrap_or_default());
    }

    out
}

/// Creates `dir` and its parents if they are missing.
///
/// # Errors
/// * `ConfigError::EmptyPath` - If `dir` is empty
/// * `ConfigError::Io` - If the directory cannot be created
pub fn ensure_dir(dir: &str) -> Result<PathBuf, ConfigError> {
    if dir.is_empty() {
        return Err(ConfigError::EmptyPath {
            operation: "ensure_dir",
        });
    }

    let path = normalize_dir(dir);
    if !path.is_dir() {
        fs::create_dir_all(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            details: e.to_string(),
        })?;
    }

    Ok(path)
}

/// True when `path` exists and is a regular file (symlinks followed).
pub fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// True when `path` exists and is a directory (symlinks followed).
pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// True when something exists at `path`, whatever its kind.
///
/// Only a definite "not found" counts as absent; a permission error on the
/// lookup still reports the entry as present.
pub fn file_exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(_) => true,
        Err(e) => e.kind() != io::ErrorKind::NotFound,
    }
}

/// Removes `dir` and everything below it. A missing directory is not an
/// error.
///
/// # Errors
/// * `ConfigError::EmptyPath` - If `dir` is empty
/// * `ConfigError::Io` - If an entry cannot be removed
pub fn remove_dir_recursive(dir: &Path) -> Result<(), ConfigError> {
    if dir.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath {
            operation: "remove_dir_recursive",
        });
    }

    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConfigError::Io {
            path: dir.to_path_buf(),
            details: e.to_string(),
        }),
    }
}

/// Absolute directory holding the running executable.
///
/// # Errors
/// Returns `ConfigError::Io` if the executable path cannot be determined.
pub fn executable_dir() -> Result<PathBuf, ConfigError> {
    let exe = env::current_exe().map_err(|e| ConfigError::Io {
        path: PathBuf::from("<current executable>"),
        details: e.to_string(),
    })?;

    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| ConfigError::Io {
            path: exe.clone(),
            details: "executable path has no parent directory".to_string(),
        })
}

/// The process working directory.
///
/// # Errors
/// Returns `ConfigError::Io` if the working directory is gone or unreadable.
pub fn current_dir() -> Result<PathBuf, ConfigError> {
    env::current_dir().map_err(|e| ConfigError::Io {
        path: PathBuf::from("."),
        details: e.to_string(),
    })
}

/// Per-user configuration directory for `app`.
///
/// Follows the XDG Base Directory layout: `$XDG_CONFIG_HOME/<app>`, falling
/// back to `$HOME/.config/<app>`.
///
/// # Errors
/// Returns `ConfigError::Io` if neither variable is set.
pub fn config_dir(app: &str) -> Result<PathBuf, ConfigError> {
    let config_home = env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| env::var("HOME").ok().map(|home| format!("{home}/.config")))
        .ok_or_else(|| ConfigError::Io {
            path: PathBuf::from("$XDG_CONFIG_HOME"),
            details: "neither XDG_CONFIG_HOME nor HOME is set".to_string(),
        })?;

    Ok(PathBuf::from(config_home).join(app))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize_dir("a/./b/../c"), PathBuf::from("a/c"));
        assert_eq!(normalize_dir("../x"), PathBuf::from("../x"));
        assert_eq!(normalize_dir("../../x"), PathBuf::from("../../x"));
        assert_eq!(normalize_dir("a/../../x"), PathBuf::from("../x"));
        assert_eq!(normalize_dir("/../etc"), PathBuf::from("/etc"));
        assert_eq!(normalize_dir("./"), PathBuf::from("."));
        assert_eq!(normalize_dir(""), PathBuf::new());
    }

    #[test]
    fn unknown_variables_expand_to_nothing() {
        assert_eq!(
            normalize_dir("/opt/$CMDOPT_SURELY_UNSET_VAR/etc"),
            PathBuf::from("/opt/etc")
        );
        assert_eq!(normalize_dir("/cost/$/x"), PathBuf::from("/cost/$/x"));
    }

    #[test]
    fn ensure_dir_rejects_empty_path() {
        assert!(matches!(
            ensure_dir(""),
            Err(ConfigError::EmptyPath {
                operation: "ensure_dir"
            })
        ));
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("a/b/c");
        let created = ensure_dir(&target.to_string_lossy());

        assert!(created.is_ok());
        assert!(target.is_dir());
        assert!(!is_regular_file(&target));
    }

    #[test]
    fn existence_checks_tell_files_from_directories() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("demo.toml");
        fs::write(&file, "a = 1\n").unwrap();

        assert!(file_exists(&file));
        assert!(is_regular_file(&file));
        assert!(!is_directory(&file));

        assert!(file_exists(temp.path()));
        assert!(is_directory(temp.path()));

        let missing = temp.path().join("missing");
        assert!(!file_exists(&missing));
        assert!(!is_directory(&missing));
    }

    #[test]
    fn remove_dir_recursive_clears_tree_and_tolerates_missing() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("cache");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/entry"), "x").unwrap();

        remove_dir_recursive(&root).unwrap();
        assert!(!file_exists(&root));
        remove_dir_recursive(&root).unwrap();

        assert!(matches!(
            remove_dir_recursive(Path::new("")),
            Err(ConfigError::EmptyPath {
                operation: "remove_dir_recursive"
            })
        ));
    }

    #[test]
    fn process_directories_are_absolute() {
        assert!(executable_dir().unwrap().is_absolute());
        assert!(current_dir().unwrap().is_absolute());
    }
}
