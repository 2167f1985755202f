//! Utility functions for common operations.
//!
//! - **Sources**: deciding whether a feed identity is a URL or a command line
//! - **Links**: validation before handing a link to the browser
//! - **Text**: flattening remote titles into terminal-safe lines
//! - **Files**: atomic record writes

mod fs;
mod text;
mod url_validator;

pub use fs::{is_scratch_file, write_atomic};
pub use text::sanitize_line;
pub use url_validator::{is_url, validate_url_for_open, UrlValidationError};
