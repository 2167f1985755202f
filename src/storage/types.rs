use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::codec::CodecError;

/// Title of the virtual group that collects every item published today.
///
/// The group is materialized from the live feed collection on demand and
/// never reaches storage.
pub const TODAY_GROUP_TITLE: &str = "Today's Articles";

/// Title given to the placeholder feed that stands in for a failed fetch.
pub const ERROR_FEED_TITLE: &str = "Error";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by store mutations and record I/O.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record to delete does not exist on disk.
    #[error("{kind} record not found: {identity}")]
    NotFound { kind: RecordKind, identity: String },

    /// The virtual today group was the target of a delete.
    #[error("\"{0}\" is a built-in group and cannot be deleted")]
    ReservedGroup(String),

    /// Reading or writing the data directory failed.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error(transparent)]
    Encoding(#[from] CodecError),
}

/// The two kinds of record kept in the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Feed,
    Group,
}

impl RecordKind {
    /// Filename prefix that marks a record of this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Feed => "f_",
            Self::Group => "g_",
        }
    }

    /// Classify a record by its filename.
    ///
    /// Anything without the group prefix is read as a feed.
    pub fn from_file_name(name: &str) -> Self {
        if name.starts_with(Self::Group.prefix()) {
            Self::Group
        } else {
            Self::Feed
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed => f.write_str("Feed"),
            Self::Group => f.write_str("Group"),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One published entry of a feed.
///
/// Items are rebuilt from the source on every fetch and stored inside the
/// owning feed's record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub title: String,
    pub description: String,
    pub link: String,
    pub author: Option<String>,
    pub published: Option<DateTime<Local>>,
    /// Link of the owning feed.
    pub belongs_to: String,
    /// Palette index inherited from the owning feed.
    pub color: u8,
}

/// A subscribed source, identified by its feed link.
///
/// The link is either an absolute URL or a shell command line whose output
/// is a feed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    /// Identity of the feed. Unique within a store.
    pub link: String,
    pub title: String,
    pub description: String,
    /// Website link advertised by the feed document.
    pub site_link: String,
    pub published: Option<DateTime<Local>>,
    pub color: u8,
    pub items: Vec<Item>,
}

impl Feed {
    /// True for the zero-value feed produced by a failed decode.
    pub fn is_empty(&self) -> bool {
        self.link.is_empty()
    }

    /// Recolor the feed and every item it owns.
    pub fn set_color(&mut self, color: u8) {
        self.color = color;
        for item in &mut self.items {
            item.color = color;
        }
    }
}

/// A named set of feed links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    /// Identity of the group. Unique within a store.
    pub title: String,
    /// Set once a refresh cycle has brought in every member feed.
    pub first_updated: bool,
    /// Member feed links, in insertion order, without duplicates.
    pub feed_links: Vec<String>,
}

impl Group {
    /// Build a group from a title and a list of links, dropping repeats.
    pub fn new<I, S>(title: impl Into<String>, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = Self {
            title: title.into(),
            first_updated: false,
            feed_links: Vec::new(),
        };
        group.merge_links(links);
        group
    }

    /// Build a group whose members are the given feeds.
    pub fn from_feeds<'a>(title: impl Into<String>, feeds: impl IntoIterator<Item = &'a Feed>) -> Self {
        Self::new(title, feeds.into_iter().map(|f| f.link.clone()))
    }

    /// The virtual "today" group.
    pub fn today() -> Self {
        Self::new(TODAY_GROUP_TITLE, Vec::<String>::new())
    }

    pub fn is_today(&self) -> bool {
        self.title == TODAY_GROUP_TITLE
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.feed_links.iter().any(|l| l == link)
    }

    /// Append links not yet in the membership. Returns how many were added.
    pub fn merge_links<I, S>(&mut self, links: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for link in links {
            let link = link.into();
            if !self.contains(&link) {
                self.feed_links.push(link);
                added += 1;
            }
        }
        added
    }
}
