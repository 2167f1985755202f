//! Sort orders shared by the store and every materialized item list.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::types::{Feed, Group, Item};

/// Newest first; equal timestamps fall back to descending title.
///
/// Items without a timestamp sort after every dated item.
pub fn compare_items(a: &Item, b: &Item) -> Ordering {
    match (a.published, b.published) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.title.cmp(&a.title)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.title.cmp(&a.title),
    }
}

pub fn sort_items(items: &mut [Item]) {
    items.sort_by(compare_items);
}

/// Ascending by display title.
pub fn sort_feeds(feeds: &mut [Feed]) {
    feeds.sort_by(|a, b| a.title.cmp(&b.title));
}

/// Ascending by title.
pub fn sort_groups(groups: &mut [Group]) {
    groups.sort_by(|a, b| a.title.cmp(&b.title));
}

/// Sort items for display and keep only the first item of each title.
///
/// The same article often shows up in several feeds of one group; the list
/// shows it once.
pub fn materialize(mut items: Vec<Item>) -> Vec<Item> {
    sort_items(&mut items);
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.title.clone()));
    items
}
