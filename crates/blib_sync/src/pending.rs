//! Two-step delete intent.
//!
//! A delete is only issued after the user has marked a bookmark and then
//! confirmed it. The slot holds at most one id; marking another replaces it.

use blib_common::BookmarkId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDelete {
    slot: Option<BookmarkId>,
}

impl PendingDelete {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id`, returning whatever was pending before
    pub fn mark(&mut self, id: BookmarkId) -> Option<BookmarkId> {
        self.slot.replace(id)
    }

    pub fn cancel(&mut self) -> Option<BookmarkId> {
        self.slot.take()
    }

    /// Clear the slot only if it holds `id`
    pub fn clear_if(&mut self, id: &BookmarkId) -> bool {
        if self.slot.as_ref() == Some(id) {
            self.slot = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&BookmarkId> {
        self.slot.as_ref()
    }

    /// Take the id for confirmation, leaving the slot empty
    pub fn take(&mut self) -> Option<BookmarkId> {
        self.slot.take()
    }
}
