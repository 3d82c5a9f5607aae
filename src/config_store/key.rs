//! Dotted-key composition.

use super::ConfigError;

/// Segment separator for hierarchical keys.
pub const SEPARATOR: char = '.';

/// Joins two key fragments with the separator, skipping empty ones.
///
/// ```
/// use cmdopt::config_store::key::join;
///
/// assert_eq!(join("app.logger", "level"), "app.logger.level");
/// assert_eq!(join("", "level"), "level");
/// assert_eq!(join("app", ""), "app");
/// ```
pub fn join(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key.is_empty()) {
        (true, _) => key.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{SEPARATOR}{key}"),
    }
}

/// Composes `prefix` segments with `key`.
///
/// Pure: the same prefix and key always give the same result. Callers pick
/// exactly one of the raw or prefixed entry points per key; wrapping an
/// already wrapped key prepends the prefix a second time.
///
/// ```
/// use cmdopt::config_store::key::wrap_with_prefix;
///
/// let prefix = vec!["app".to_string()];
/// assert_eq!(wrap_with_prefix(&prefix, "logger.level"), "app.logger.level");
/// assert_eq!(wrap_with_prefix(&[], "x"), "x");
/// assert_eq!(wrap_with_prefix(&prefix, ""), "app");
/// ```
pub fn wrap_with_prefix(prefix: &[String], key: &str) -> String {
    let joined = prefix.join(".");
    join(&joined, key)
}

/// Splits a path into its segments. The empty path yields no segments.
///
/// # Errors
/// Returns `ConfigError::InvalidPath` when any segment is empty
/// (e.g. `"a..b"`, `".a"`, `"a."`).
pub fn segments(path: &str) -> Result<Vec<&str>, ConfigError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = path.split(SEPARATOR).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ConfigError::InvalidPath(format!(
            "empty segment in '{path}'"
        )));
    }

    Ok(parts)
}

/// Builds a key from already split segments, dropping empty ones.
pub fn from_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}
