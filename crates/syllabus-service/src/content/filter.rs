//! Pure, in-memory filters over already resolved collections.
//!
//! None of these perform I/O or touch the module cache.

use super::{CatalogItem, Difficulty};

pub fn by_difficulty<T: CatalogItem + Clone>(items: &[T], difficulty: Difficulty) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.difficulty() == Some(difficulty))
        .cloned()
        .collect()
}

/// Categories are compared case-insensitively.
pub fn by_category<T: CatalogItem + Clone>(items: &[T], category: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.category().eq_ignore_ascii_case(category))
        .cloned()
        .collect()
}

/// Tags are compared case-insensitively.
pub fn by_tag<T: CatalogItem + Clone>(items: &[T], tag: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.tags().iter().any(|t| t.eq_ignore_ascii_case(tag)))
        .cloned()
        .collect()
}

/// Case-insensitive substring search over the searchable text and tags of each item.
///
/// A blank query matches everything.
pub fn search<T: CatalogItem + Clone>(items: &[T], query: &str) -> Vec<T> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.to_vec();
    }

    items
        .iter()
        .filter(|item| {
            item.text()
                .into_iter()
                .chain(item.tags().iter().map(String::as_str))
                .any(|text| text.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

pub fn find_by_id<'a, T: CatalogItem>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|item| item.id() == id)
}
