//! Integration tests for the store lifecycle: subscribe, group, recolor, delete.
//!
//! Each test creates its own temporary data directory and reopens it to check
//! that every operation survives a reload.

use chrono::{Duration, Local};
use pretty_assertions::assert_eq;
use rssview::storage::{codec, Feed, Group, Item, RecordKind, StorageError, Store, TODAY_GROUP_TITLE};

fn test_feed(link: &str, title: &str, color: u8) -> Feed {
    let now = Local::now();
    Feed {
        link: link.to_string(),
        title: title.to_string(),
        color,
        items: (0..3)
            .map(|i| Item {
                title: format!("{title} #{i}"),
                link: format!("{link}/{i}"),
                published: Some(now - Duration::days(i)),
                belongs_to: link.to_string(),
                color,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn data_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

// ============================================================================
// Persistence layout
// ============================================================================

#[test]
fn test_records_named_by_identity_hash() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    store.add_feed(test_feed("https://a.example/rss", "A", 1)).unwrap();
    store
        .add_or_update_group(Group::new("Reading", ["https://a.example/rss"]))
        .unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut expected = vec![
        codec::file_name(RecordKind::Feed, "https://a.example/rss"),
        codec::file_name(RecordKind::Group, "Reading"),
    ];
    expected.sort();
    assert_eq!(names, expected);
    assert!(names.iter().any(|n| n.starts_with("f_")));
    assert!(names.iter().any(|n| n.starts_with("g_")));
}

#[test]
fn test_reload_reproduces_feeds_and_items() {
    let dir = data_dir();
    let original = test_feed("https://a.example/rss", "A", 99);
    {
        let mut store = Store::open(dir.path()).unwrap();
        store.add_feed(original.clone()).unwrap();
    }
    let store = Store::open(dir.path()).unwrap();
    assert_eq!(store.feed("https://a.example/rss"), Some(&original));
}

// ============================================================================
// Groups
// ============================================================================

#[test]
fn test_group_lifecycle() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    for (link, title) in [("a", "Alpha"), ("b", "Bravo"), ("c", "Charlie")] {
        store.add_feed(test_feed(link, title, 5)).unwrap();
    }

    store.add_or_update_group(Group::new("Mixed", ["a", "b"])).unwrap();
    store.add_or_update_group(Group::new("Mixed", ["b", "c"])).unwrap();
    store.add_or_update_group(Group::new("Solo", ["c"])).unwrap();

    let store_again = Store::open(dir.path()).unwrap();
    assert_eq!(store_again.groups().len(), 2);
    assert_eq!(store_again.group("Mixed").unwrap().feed_links, vec!["a", "b", "c"]);

    // Deleting the only member of Solo prunes it; Mixed is only trimmed.
    store.delete_feed("c").unwrap();
    assert!(store.group("Solo").is_none());
    assert_eq!(store.group("Mixed").unwrap().feed_links, vec!["a", "b"]);

    let reloaded = Store::open(dir.path()).unwrap();
    let titles: Vec<_> = reloaded.groups().iter().map(|g| g.title.as_str()).collect();
    assert_eq!(titles, vec!["Mixed"]);
    assert_eq!(reloaded.group("Mixed").unwrap().feed_links, vec!["a", "b"]);

    store.delete_group("Mixed").unwrap();
    assert!(Store::open(dir.path()).unwrap().groups().is_empty());
    assert_eq!(store.feeds().len(), 2);
}

#[test]
fn test_today_group_is_virtual() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    store.add_feed(test_feed("a", "Alpha", 5)).unwrap();
    store.add_feed(test_feed("b", "Bravo", 6)).unwrap();

    store
        .add_or_update_group(Group::new(TODAY_GROUP_TITLE, ["a"]))
        .unwrap();
    assert!(Store::open(dir.path()).unwrap().groups().is_empty());

    let today = store.group_items(TODAY_GROUP_TITLE);
    let titles: Vec<_> = today.iter().map(|i| i.title.as_str()).collect();
    // Only the "#0" items were published today; "#1" and "#2" are older.
    assert!(titles.contains(&"Alpha #0"));
    assert!(titles.contains(&"Bravo #0"));
    assert!(!titles.iter().any(|t| t.ends_with("#2")));

    assert!(matches!(
        store.delete_group(TODAY_GROUP_TITLE),
        Err(StorageError::ReservedGroup(_))
    ));
}

#[test]
fn test_group_items_suppress_duplicate_titles() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    let mut mirror = test_feed("mirror", "Mirror", 3);
    for item in &mut mirror.items {
        item.title = item.title.replace("Mirror", "Alpha");
    }
    store.add_feed(test_feed("a", "Alpha", 5)).unwrap();
    store.add_feed(mirror).unwrap();
    store.add_or_update_group(Group::new("Both", ["a", "mirror"])).unwrap();

    let items = store.group_items("Both");
    assert_eq!(items.len(), 3);
}

// ============================================================================
// Feeds
// ============================================================================

#[test]
fn test_recolor_survives_reload() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    store.add_feed(test_feed("a", "Alpha", 5)).unwrap();
    store.set_feed_color("a", 42).unwrap();

    let reloaded = Store::open(dir.path()).unwrap();
    let feed = reloaded.feed("a").unwrap();
    assert_eq!(feed.color, 42);
    assert!(reloaded.feed_items("a").iter().all(|i| i.color == 42));
}

#[test]
fn test_feed_links_stay_unique() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    assert!(store.add_feed(test_feed("a", "Alpha", 5)).unwrap());
    assert!(!store.add_feed(test_feed("a", "Alpha again", 6)).unwrap());
    assert_eq!(Store::open(dir.path()).unwrap().feeds().len(), 1);
    assert_eq!(store.export_links(), vec!["a"]);
}

#[test]
fn test_delete_unknown_records() {
    let dir = data_dir();
    let mut store = Store::open(dir.path()).unwrap();
    assert!(matches!(
        store.delete_feed("missing"),
        Err(StorageError::NotFound { kind: RecordKind::Feed, .. })
    ));
    assert!(matches!(
        store.delete_group("missing"),
        Err(StorageError::NotFound { kind: RecordKind::Group, .. })
    ));
}
