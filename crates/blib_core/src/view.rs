//! Read-only projection of an engine snapshot into display rows

use crate::{format::relative_age, links};
use blib_common::Bookmark;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One rendered line of the library
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkRow<'a> {
    #[serde(flatten)]
    pub bookmark: &'a Bookmark,
    pub domain: String,
    pub favicon_url: String,
    pub age: String,
}

/// Search filter plus display settings, recomputed on every snapshot
#[derive(Debug, Clone)]
pub struct Projection {
    query: String,
    favicon_size: u32,
}

impl Default for Projection {
    fn default() -> Self {
        Self::new("")
    }
}

impl Projection {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into().to_lowercase(),
            favicon_size: 64,
        }
    }

    pub fn with_favicon_size(mut self, size: u32) -> Self {
        self.favicon_size = size;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Case-insensitive match on title, URL or domain
    pub fn matches(&self, bookmark: &Bookmark) -> bool {
        if self.query.is_empty() {
            return true;
        }
        bookmark.title.to_lowercase().contains(&self.query)
            || bookmark.url.to_lowercase().contains(&self.query)
            || links::domain(&bookmark.url)
                .to_lowercase()
                .contains(&self.query)
    }

    /// Matching bookmarks in snapshot order
    pub fn filter<'a>(&self, bookmarks: &'a [Bookmark]) -> Vec<&'a Bookmark> {
        bookmarks.iter().filter(|b| self.matches(b)).collect()
    }

    pub fn rows<'a>(&self, bookmarks: &'a [Bookmark], now: DateTime<Utc>) -> Vec<BookmarkRow<'a>> {
        self.filter(bookmarks)
            .into_iter()
            .map(|bookmark| BookmarkRow {
                bookmark,
                domain: links::domain(&bookmark.url),
                favicon_url: links::favicon_url(&bookmark.url, self.favicon_size),
                age: relative_age(bookmark.created_at, now),
            })
            .collect()
    }

    /// Message shown when `rows` comes back empty
    pub fn empty_message(&self) -> String {
        if self.query.is_empty() {
            "Your library is empty. Save a URL with `blib add`.".to_string()
        } else {
            format!("No bookmarks match \u{201c}{}\u{201d}", self.query)
        }
    }
}

/// Header line for the library
pub fn summary(count: usize) -> String {
    match count {
        0 => "No bookmarks yet".to_string(),
        1 => "1 bookmark saved".to_string(),
        n => format!("{} bookmarks saved", n),
    }
}

/// Whether a search box is worth offering for a library of `count` bookmarks
pub fn search_enabled(count: usize, threshold: usize) -> bool {
    count > threshold
}
