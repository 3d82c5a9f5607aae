//! Append-if-absent helpers for ordered collections.
//!
//! Node lists hold arena indices, so `PartialEq` on them is identity; string
//! lists compare by value. Either way the first occurrence keeps its place.

/// Appends `item` unless an equal element is already present.
///
/// Returns true when the sequence grew.
///
/// ```
/// use cmdopt::command::add_unique;
///
/// let mut names = vec!["a".to_string()];
/// assert!(add_unique(&mut names, "b".to_string()));
/// assert!(!add_unique(&mut names, "a".to_string()));
/// assert_eq!(names, vec!["a", "b"]);
/// ```
pub fn add_unique<T: PartialEq>(seq: &mut Vec<T>, item: T) -> bool {
    if seq.contains(&item) {
        return false;
    }
    seq.push(item);
    true
}

/// Folds every candidate through [`add_unique`], in order.
///
/// Returns how many were appended. Duplicates inside `items` are skipped too.
pub fn add_unique_all<T, I>(seq: &mut Vec<T>, items: I) -> usize
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .filter_map(|item| add_unique(seq, item).then_some(()))
        .count()
}
