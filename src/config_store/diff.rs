use toml::{Table, Value};

use super::{ConfigChange, Source, key};

/// Compares two merged views and lists the paths whose value moved.
///
/// Nested tables are compared key by key. Any other difference (a changed
/// scalar, a changed list, or a table turned into a scalar) is reported once
/// at the path where the trees diverge. Changes come out in `old` key order
/// followed by keys that only exist in `new`.
pub(super) fn diff_tables(old: &Table, new: &Table, source: Source) -> Vec<ConfigChange> {
    let mut changes = Vec::new();
    diff_into("", old, new, source, &mut changes);
    changes
}

fn diff_into(
    prefix: &str,
    old: &Table,
    new: &Table,
    source: Source,
    changes: &mut Vec<ConfigChange>,
) {
    for (name, old_value) in old {
        let path = key::join(prefix, name);

        match new.get(name) {
            Some(new_value) => diff_values(&path, old_value, new_value, source, changes),
            None => changes.push(ConfigChange::new(path, Some(old_value.clone()), None, source)),
        }
    }

    for (name, new_value) in new {
        if !old.contains_key(name) {
            changes.push(ConfigChange::new(
                key::join(prefix, name),
                None,
                Some(new_value.clone()),
                source,
            ));
        }
    }
}

fn diff_values(
    path: &str,
    old: &Value,
    new: &Value,
    source: Source,
    changes: &mut Vec<ConfigChange>,
) {
    match (old, new) {
        (Value::Table(old_table), Value::Table(new_table)) => {
            diff_into(path, old_table, new_table, source, changes);
        }
        _ if old == new => {}
        _ => changes.push(ConfigChange::new(
            path.to_string(),
            Some(old.clone()),
            Some(new.clone()),
            source,
        )),
    }
}
