use std::path::{Path, PathBuf};

use super::codec::{self, Record};
use super::ordering::{sort_feeds, sort_groups};
use super::types::{Feed, Group, RecordKind, StorageError};
use crate::util::{is_scratch_file, write_atomic};

// ============================================================================
// Store
// ============================================================================

/// In-memory feed and group collections backed by one file per entity.
///
/// Both collections stay sorted by title after every mutation. Callers hold
/// identities (feed link, group title) and look entities up again after each
/// mutation, since positions shift.
#[derive(Debug)]
pub struct Store {
    data_dir: PathBuf,
    pub(crate) feeds: Vec<Feed>,
    pub(crate) groups: Vec<Group>,
}

impl Store {
    /// An empty store rooted at `data_dir`. Nothing is read until
    /// [`Store::load_all`].
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            feeds: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Create a store and load every record found in `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let mut store = Self::new(data_dir);
        store.load_all()?;
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Replace the in-memory collections with the records on disk.
    ///
    /// Creates the data directory on first use. Records that fail to decode
    /// are logged and skipped instead of aborting the scan.
    pub fn load_all(&mut self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.data_dir)?;

        let mut files = Vec::new();
        collect_files(&self.data_dir, &mut files)?;

        let mut feeds = Vec::new();
        let mut groups = Vec::new();
        let mut skipped = 0usize;

        for path in files {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) if !is_scratch_file(n) => n.to_owned(),
                _ => continue,
            };
            let bytes = std::fs::read(&path)?;
            match RecordKind::from_file_name(&name) {
                RecordKind::Group => {
                    let group: Group = codec::decode(&bytes);
                    if group.is_empty() {
                        tracing::warn!(file = %name, "Skipping unreadable group record");
                        skipped += 1;
                    } else {
                        groups.push(group);
                    }
                }
                RecordKind::Feed => {
                    let feed: Feed = codec::decode(&bytes);
                    if feed.is_empty() {
                        tracing::warn!(file = %name, "Skipping unreadable feed record");
                        skipped += 1;
                    } else {
                        feeds.push(feed);
                    }
                }
            }
        }

        self.feeds = feeds;
        self.groups = groups;
        self.sort();

        tracing::info!(
            dir = %self.data_dir.display(),
            feeds = self.feeds.len(),
            groups = self.groups.len(),
            skipped = skipped,
            "Loaded store"
        );
        Ok(())
    }

    /// Re-sort both collections by title.
    pub fn sort(&mut self) {
        sort_feeds(&mut self.feeds);
        sort_groups(&mut self.groups);
    }

    pub(crate) fn record_path(&self, kind: RecordKind, identity: &str) -> PathBuf {
        self.data_dir.join(codec::file_name(kind, identity))
    }

    pub(crate) fn write_record<R: Record>(&self, record: &R) -> Result<(), StorageError> {
        let bytes = codec::encode(record)?;
        std::fs::create_dir_all(&self.data_dir)?;
        write_atomic(&self.record_path(R::KIND, record.identity()), &bytes)?;
        Ok(())
    }

    pub(crate) fn remove_record(&self, kind: RecordKind, identity: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.record_path(kind, identity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                kind,
                identity: identity.to_owned(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::Item;
    use pretty_assertions::assert_eq;

    fn feed(link: &str, title: &str) -> Feed {
        Feed {
            link: link.to_string(),
            title: title.to_string(),
            color: 7,
            items: vec![Item {
                title: format!("{title} post"),
                belongs_to: link.to_string(),
                color: 7,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_load_all_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let store = Store::open(&data).unwrap();
        assert!(data.is_dir());
        assert!(store.feeds().is_empty());
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_records_reload_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.write_record(&feed("https://b.example/rss", "Beta")).unwrap();
        store.write_record(&feed("https://a.example/rss", "Alpha")).unwrap();
        store.write_record(&Group::new("Zed", ["https://a.example/rss"])).unwrap();
        store.write_record(&Group::new("Art", ["https://b.example/rss"])).unwrap();

        let loaded = Store::open(dir.path()).unwrap();
        let feeds: Vec<_> = loaded.feeds().iter().map(|f| f.title.as_str()).collect();
        let groups: Vec<_> = loaded.groups().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(feeds, vec!["Alpha", "Beta"]);
        assert_eq!(groups, vec!["Art", "Zed"]);
        assert_eq!(loaded.feeds()[0].items.len(), 1);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.write_record(&feed("https://a.example/rss", "Alpha")).unwrap();
        std::fs::write(dir.path().join("f_garbage"), b"\xff\xfe").unwrap();
        std::fs::write(dir.path().join("g_garbage"), b"{").unwrap();

        let loaded = Store::open(dir.path()).unwrap();
        assert_eq!(loaded.feeds().len(), 1);
        assert!(loaded.groups().is_empty());
    }

    #[test]
    fn test_scratch_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".f_abc.tmp.0000"), b"{}").unwrap();
        let loaded = Store::open(dir.path()).unwrap();
        assert!(loaded.feeds().is_empty());
    }

    #[test]
    fn test_remove_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let err = store.remove_record(RecordKind::Feed, "nope").unwrap_err();
        assert!(matches!(err, StorageError::NotFound { kind: RecordKind::Feed, .. }));
    }
}
