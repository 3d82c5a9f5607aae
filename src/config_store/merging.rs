use toml::{Table, Value};

/// Folds several layers into one table, later layers taking precedence.
pub(super) fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a Table>) -> Table {
    let mut accumulated = Table::new();

    for layer in layers {
        merge_tables(&mut accumulated, layer.clone());
    }

    accumulated
}

/// Deep merges `overlay` into `base` in place.
///
/// Nested tables merge key by key; any other pairing is decided by the
/// overlay, so a scalar replaces a subtree, a table replaces a scalar and an
/// array replaces whatever was there (no element-wise merging of lists).
/// Keys already in `base` keep their position; new keys are appended in the
/// overlay's order.
pub(crate) fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match base.get_mut(&key) {
            Some(Value::Table(base_table)) if overlay_value.is_table() => {
                if let Value::Table(overlay_table) = overlay_value {
                    merge_tables(base_table, overlay_table);
                }
            }
            Some(slot) => *slot = overlay_value,
            None => {
                base.insert(key, overlay_value);
            }
        }
    }
}
