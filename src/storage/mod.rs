//! Local store: feed and group collections persisted one record per file.
//!
//! - [`codec`] - record encoding and identity-derived filenames
//! - [`ordering`] - item, feed and group sort orders
//! - [`Store`] - the collections and their mutations, split across
//!   `store.rs` (loading, record I/O), `feeds.rs` and `groups.rs`

pub mod codec;
mod feeds;
mod groups;
pub mod ordering;
mod store;
mod types;

pub use store::Store;
pub use types::{
    Feed, Group, Item, RecordKind, StorageError, ERROR_FEED_TITLE, TODAY_GROUP_TITLE,
};
