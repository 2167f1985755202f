//! Feed sources: fetching, parsing and identity lists.
//!
//! - [`parser`] - RSS/Atom/JSON Feed parsing using the `feed-rs` crate
//! - [`fetcher`] - retrieval from URLs or shell commands with typed failures
//! - [`list`] - plain-text import and export lists

mod fetcher;
mod list;
mod parser;

pub use fetcher::{FailureKind, FetchError, FetchFailure, Fetcher};
pub use list::{parse_identity_list, read_identity_list, write_link_list};
pub use parser::parse_feed;
