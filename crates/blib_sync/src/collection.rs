//! The local bookmark collection and its guards.
//!
//! Invariants: at most one bookmark per id, newest `created_at` first.
//! Insertion is idempotent under an existence check and removal under a
//! presence check; the engine relies on both to accept request responses and
//! push events in any order.

use blib_common::{Bookmark, BookmarkId};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    items: Vec<Bookmark>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an authoritative fetch. Rows are re-sorted newest first and
    /// duplicate ids collapse to their first occurrence.
    pub fn from_fetch(rows: Vec<Bookmark>) -> Self {
        let mut seen = HashSet::new();
        let mut items: Vec<Bookmark> = rows
            .into_iter()
            .filter(|b| seen.insert(b.id.clone()))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { items }
    }

    /// Insert unless a member with the same id exists. Returns whether the
    /// collection changed.
    ///
    /// A new bookmark lands ahead of everything not newer than it, which is
    /// the front for any freshly created row.
    pub fn insert(&mut self, bookmark: Bookmark) -> bool {
        if self.contains(&bookmark.id) {
            return false;
        }
        let at = self
            .items
            .partition_point(|existing| existing.created_at > bookmark.created_at);
        self.items.insert(at, bookmark);
        true
    }

    /// Remove the member with `id` if present
    pub fn remove(&mut self, id: &BookmarkId) -> Option<Bookmark> {
        let idx = self.items.iter().position(|b| &b.id == id)?;
        Some(self.items.remove(idx))
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.items.iter().any(|b| &b.id == id)
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.items.iter().find(|b| &b.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bookmark> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Bookmark;
    type IntoIter = std::slice::Iter<'a, Bookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
