//! Static text loaded once at startup: the reply catalog and the blacklist.
//!
//! Both files are plain text and are never reloaded while the bot runs.

mod blacklist;
pub mod replies;

pub use blacklist::Blacklist;
pub use replies::ReplyCatalog;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("line {line}: expected '<count> <category>', found '{found}'")]
    BadHeader { line: usize, found: String },

    #[error("line {line}: expected a count, found '{found}'")]
    BadCount { line: usize, found: String },

    #[error("line {line}: expected a user id, found '{found}'")]
    BadUserId { line: usize, found: String },

    #[error("category '{category}' declares {expected} lines but only {found} follow")]
    Truncated {
        category: String,
        expected: usize,
        found: usize,
    },

    #[error("blacklist declares {expected} ids but only {found} follow")]
    TruncatedBlacklist { expected: usize, found: usize },

    #[error("category '{0}' is required but missing or empty")]
    MissingCategory(String),
}
