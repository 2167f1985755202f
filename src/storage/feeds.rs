use super::ordering::{materialize, sort_feeds};
use super::store::Store;
use super::types::{Feed, Item, RecordKind, StorageError};

impl Store {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    pub fn feed(&self, link: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.link == link)
    }

    pub fn contains_feed(&self, link: &str) -> bool {
        self.feed(link).is_some()
    }

    /// Insert a new feed and persist it.
    ///
    /// Returns `false` without touching anything when a feed with the same
    /// link is already present, so the link stays unique.
    pub fn add_feed(&mut self, feed: Feed) -> Result<bool, StorageError> {
        if self.contains_feed(&feed.link) {
            tracing::debug!(feed = %feed.link, "Feed already subscribed");
            return Ok(false);
        }
        self.write_record(&feed)?;
        self.feeds.push(feed);
        sort_feeds(&mut self.feeds);
        Ok(true)
    }

    /// Swap in a refreshed copy of a feed, matched by link.
    ///
    /// Position is kept; call [`Store::sort`] once a batch of replacements
    /// is done. Returns `false` when no feed has that link.
    pub fn replace_feed(&mut self, feed: Feed) -> bool {
        match self.feeds.iter_mut().find(|f| f.link == feed.link) {
            Some(slot) => {
                *slot = feed;
                true
            }
            None => false,
        }
    }

    /// Write the current in-memory state of a feed to its record.
    pub fn save_feed(&self, link: &str) -> Result<(), StorageError> {
        let feed = self.feed(link).ok_or_else(|| StorageError::NotFound {
            kind: RecordKind::Feed,
            identity: link.to_owned(),
        })?;
        self.write_record(feed)
    }

    /// Recolor a feed and its items, then persist it.
    pub fn set_feed_color(&mut self, link: &str, color: u8) -> Result<(), StorageError> {
        let feed = self
            .feeds
            .iter_mut()
            .find(|f| f.link == link)
            .ok_or_else(|| StorageError::NotFound {
                kind: RecordKind::Feed,
                identity: link.to_owned(),
            })?;
        feed.set_color(color);
        self.save_feed(link)
    }

    /// Delete a feed and drop it from every group.
    ///
    /// Groups left without members are deleted along with their records.
    /// Groups that only lost this one member are rewritten.
    pub fn delete_feed(&mut self, link: &str) -> Result<(), StorageError> {
        self.remove_record(RecordKind::Feed, link)?;
        self.feeds.retain(|f| f.link != link);

        let mut emptied = Vec::new();
        let mut trimmed = Vec::new();
        for group in &mut self.groups {
            let before = group.feed_links.len();
            group.feed_links.retain(|l| l != link);
            if group.feed_links.len() == before {
                continue;
            }
            if group.feed_links.is_empty() {
                emptied.push(group.title.clone());
            } else {
                trimmed.push(group.title.clone());
            }
        }

        self.groups.retain(|g| !emptied.contains(&g.title));
        for title in &emptied {
            match self.remove_record(RecordKind::Group, title) {
                Ok(()) | Err(StorageError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            tracing::info!(group = %title, "Removed group left empty by feed deletion");
        }
        for title in &trimmed {
            if let Some(group) = self.group(title) {
                self.write_record(group)?;
            }
        }

        tracing::info!(feed = %link, "Deleted feed");
        Ok(())
    }

    /// The feed an item belongs to, if it is still subscribed.
    pub fn item_parent(&self, item: &Item) -> Option<&Feed> {
        self.feed(&item.belongs_to)
    }

    /// A feed's items in display order, or nothing for an unknown link.
    pub fn feed_items(&self, link: &str) -> Vec<Item> {
        self.feed(link)
            .map(|f| materialize(f.items.clone()))
            .unwrap_or_default()
    }

    /// Every feed link in feed order, for the export list.
    pub fn export_links(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.link.as_str()).collect()
    }
}
