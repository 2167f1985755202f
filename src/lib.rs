//! Core of a terminal RSS/Atom reader.
//!
//! Feeds come from URLs or shell commands, are stored one record per file,
//! can be collected into named groups, and are refreshed concurrently.

pub mod config;
pub mod feed;
pub mod palette;
pub mod storage;
pub mod sync;
pub mod util;
