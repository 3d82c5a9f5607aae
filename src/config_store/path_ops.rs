use toml::{Table, Value};

use super::{ConfigError, key};

/// Checks if a configuration path matches a given pattern
///
/// # Arguments
/// * `path` - The actual configuration path
/// * `pattern` - The pattern to match against (supports "*" as wildcard)
///
/// # Examples
/// * `"server.port"` matches `"server.port"`
/// * `"server.port"` matches `"server.*"`
/// * `"server.port"` matches `"*"`
pub(crate) fn path_matches(path: &str, pattern: &str) -> bool {
    const WILDCARD: &str = "*";

    if pattern == WILDCARD {
        return true;
    };

    let path_parts: Vec<&str> = path.split('.').collect();
    let pattern_parts: Vec<&str> = pattern.split('.').collect();

    if pattern_parts.len() > path_parts.len() {
        return false;
    }

    for (path_part, pattern_part) in path_parts.iter().zip(pattern_parts.iter()) {
        if pattern_part == &WILDCARD {
            continue;
        }

        if path_part != pattern_part {
            return false;
        }
    }

    true
}

/// Navigates through a table following a dot-separated path.
///
/// Numeric segments index into arrays (`"servers.0.host"`). Returns `None`
/// for any miss, including malformed paths; the empty path is not handled
/// here since the root is a table rather than a value.
pub(crate) fn navigate_path<'a>(table: &'a Table, path: &str) -> Option<&'a Value> {
    let parts = key::segments(path).ok()?;
    let (first, rest) = parts.split_first()?;
    let mut current = table.get(*first)?;

    for part in rest {
        current = match current {
            Value::Table(table) => table.get(*part)?,
            Value::Array(array) => array.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Sets a value at the specified path, creating intermediate tables.
///
/// A leaf sitting where an intermediate table is needed is replaced by a
/// table, and a value written over a table replaces that whole subtree.
///
/// # Arguments
/// * `table` - The root table to modify
/// * `path` - Dot-separated path to the target location
/// * `new_value` - The value to insert at the path
///
/// # Errors
/// * `ConfigError::EmptyPath` - If the path is empty
/// * `ConfigError::InvalidPath` - If a segment is empty or an array index is invalid
pub(crate) fn set_value_at_path(
    table: &mut Table,
    path: &str,
    new_value: Value,
) -> Result<(), ConfigError> {
    let parts = key::segments(path)?;
    let Some((last_key, parents)) = parts.split_last() else {
        return Err(ConfigError::EmptyPath { operation: "set" });
    };

    let Some((first, rest)) = parents.split_first() else {
        table.insert(last_key.to_string(), new_value);
        return Ok(());
    };

    let mut parent = table
        .entry(first.to_string())
        .or_insert_with(|| Value::Table(Table::new()));

    for (i, part) in rest.iter().enumerate() {
        parent = navigate_step_mut(parent, part, &parents[..i + 2])?;
    }

    ensure_container(parent);
    insert_value(parent, last_key, new_value)
}

/// Performs a single navigation step, creating or replacing as needed.
fn navigate_step_mut<'a>(
    current: &'a mut Value,
    key: &str,
    path_so_far: &[&str],
) -> Result<&'a mut Value, ConfigError> {
    ensure_container(current);

    match current {
        Value::Table(table) => Ok(table
            .entry(key.to_string())
            .or_insert_with(|| Value::Table(Table::new()))),
        Value::Array(arr) => {
            let index = key.parse::<usize>().map_err(|_| {
                ConfigError::InvalidPath(format!(
                    "Invalid array index '{}' at path '{}'",
                    key,
                    path_so_far.join(".")
                ))
            })?;

            let len = arr.len();
            arr.get_mut(index).ok_or_else(|| {
                ConfigError::InvalidPath(format!(
                    "Array index {index} out of bounds (len {len}) at path '{}'",
                    path_so_far.join(".")
                ))
            })
        }
        _ => Err(ConfigError::InvalidPath(format!(
            "Cannot navigate into {} at path '{}'",
            current.type_str(),
            path_so_far.join(".")
        ))),
    }
}

/// Replaces a scalar with an empty table so it can hold children.
fn ensure_container(value: &mut Value) {
    if !matches!(value, Value::Table(_) | Value::Array(_)) {
        *value = Value::Table(Table::new());
    }
}

/// Inserts a value into a container (table or array)
///
/// # Errors
/// * `ConfigError::InvalidPath` - If the array index is invalid
fn insert_value(container: &mut Value, key: &str, new_value: Value) -> Result<(), ConfigError> {
    match container {
        Value::Table(table) => {
            table.insert(key.to_string(), new_value);
            Ok(())
        }
        Value::Array(arr) => {
            let index = key
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidPath(format!("Invalid array index '{key}'")))?;

            arr.get_mut(index)
                .map(|elem| *elem = new_value)
                .ok_or_else(|| {
                    ConfigError::InvalidPath(format!("Array index {index} out of bounds"))
                })
        }
        _ => Err(ConfigError::InvalidPath(format!(
            "Cannot insert into {}",
            container.type_str()
        ))),
    }
}

/// Collects the dotted paths of every leaf under `value`, in table order.
///
/// Empty tables count as leaves so that an explicit `{}` write is reported.
pub(crate) fn flatten_paths(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Table(table) if !table.is_empty() => {
            for (k, v) in table {
                flatten_paths(v, &key::join(prefix, k), out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

/// Leaf paths of a whole table.
pub(crate) fn table_paths(table: &Table, prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (k, v) in table {
        flatten_paths(v, &key::join(prefix, k), &mut out);
    }
    out
}
