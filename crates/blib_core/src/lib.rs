//! Bookmark presentation logic for B-Lib
//!
//! Everything here is pure: URL heuristics used before a bookmark is saved,
//! and the read-only projection the CLI renders from an engine snapshot.

pub mod format;
pub mod links;
pub mod view;

pub use format::relative_age;
pub use links::{derive_title, domain, favicon_url, normalize_url};
pub use view::{summary, BookmarkRow, Projection};
