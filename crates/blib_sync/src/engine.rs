//! Reconciliation engine
//!
//! Owns the canonical local collection for one owner. Mutations happen only
//! between suspension points: the collection is updated atomically inside
//! the snapshot channel and never held across an `.await`.

use crate::{
    collection::Collection,
    pending::PendingDelete,
    store::{PushEvent, RemoteStore},
    SyncError,
};
use blib_common::{sanitizer::sanitize, Bookmark, BookmarkId, NewBookmark, OwnerId};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// What `delete` did locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Removed locally and confirmed by the store
    Deleted,
    /// The id was not in the collection; nothing was sent
    Absent,
}

/// Main reconciliation engine
pub struct ReconciliationEngine {
    owner: OwnerId,
    store: Arc<dyn RemoteStore>,
    collection: watch::Sender<Collection>,
    pending: Mutex<PendingDelete>,
}

impl ReconciliationEngine {
    /// Create an engine with an empty collection
    pub fn new(owner: OwnerId, store: Arc<dyn RemoteStore>) -> Self {
        Self::with_initial(owner, store, Vec::new())
    }

    /// Create an engine seeded with an already-fetched list
    pub fn with_initial(owner: OwnerId, store: Arc<dyn RemoteStore>, initial: Vec<Bookmark>) -> Self {
        let initial = initial
            .into_iter()
            .filter(|b| b.owner_id == owner)
            .collect();
        let (collection, _) = watch::channel(Collection::from_fetch(initial));
        Self {
            owner,
            store,
            collection,
            pending: Mutex::new(PendingDelete::new()),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Copy of the current collection
    pub fn snapshot(&self) -> Collection {
        self.collection.borrow().clone()
    }

    /// Receiver that observes every change to the collection
    pub fn subscribe(&self) -> watch::Receiver<Collection> {
        self.collection.subscribe()
    }

    pub fn len(&self) -> usize {
        self.collection.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.borrow().is_empty()
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.collection.borrow().contains(id)
    }

    /// Create a bookmark remotely and insert the confirmed row.
    ///
    /// Nothing is inserted before the store responds. On failure the
    /// collection is untouched and the error is returned; there is no retry.
    pub async fn add(&self, url: &str, title: &str) -> crate::Result<Bookmark> {
        let url = url.trim();
        let title = title.trim();
        if url.is_empty() {
            return Err(SyncError::Validation("url cannot be empty".to_string()));
        }
        if title.is_empty() {
            return Err(SyncError::Validation("title cannot be empty".to_string()));
        }

        let draft = NewBookmark::new(url, title);
        let created = match self.store.create(&self.owner, &draft).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(error = %sanitize(&e.message), "Create failed, collection unchanged");
                return Err(e.into());
            }
        };

        if self.insert_guarded(created.clone()) {
            tracing::debug!(id = %created.id, "Inserted confirmed bookmark");
        } else {
            tracing::debug!(id = %created.id, "Bookmark already present from push stream");
        }
        Ok(created)
    }

    /// Remove a bookmark optimistically, then delete it remotely.
    ///
    /// The removal is visible before the store responds. If the store
    /// rejects the delete the collection is rebuilt from a full fetch and
    /// the store's error is returned.
    pub async fn delete(&self, id: &BookmarkId) -> crate::Result<DeleteOutcome> {
        let mut removed = false;
        self.collection.send_if_modified(|collection| {
            removed = collection.remove(id).is_some();
            removed
        });
        if !removed {
            tracing::debug!(id = %id, "Delete of absent bookmark ignored");
            return Ok(DeleteOutcome::Absent);
        }
        self.lock_pending().clear_if(id);

        match self.store.delete(id, &self.owner).await {
            Ok(()) => {
                tracing::debug!(id = %id, "Delete confirmed");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %sanitize(&e.message), "Delete failed, resyncing");
                if let Err(resync_err) = self.resync().await {
                    tracing::error!(
                        error = %sanitize(&resync_err.to_string()),
                        "Resync after failed delete also failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Replace the collection with the store's authoritative list
    pub async fn resync(&self) -> crate::Result<usize> {
        let rows = self.store.fetch_all(&self.owner).await?;
        let total = rows.len();
        let rows: Vec<Bookmark> = rows
            .into_iter()
            .filter(|b| b.owner_id == self.owner)
            .collect();
        if rows.len() != total {
            tracing::warn!(dropped = total - rows.len(), "Fetch returned rows for another owner");
        }

        let fresh = Collection::from_fetch(rows);
        let count = fresh.len();
        self.collection.send_if_modified(|collection| {
            if *collection == fresh {
                false
            } else {
                *collection = fresh;
                true
            }
        });
        tracing::info!(count, "Resynced collection");
        Ok(count)
    }

    /// Merge an insert notification from the push stream
    pub fn merge_remote_insert(&self, bookmark: Bookmark) -> bool {
        if bookmark.owner_id != self.owner {
            tracing::warn!(id = %bookmark.id, "Ignoring insert for another owner");
            return false;
        }
        let id = bookmark.id.clone();
        let inserted = self.insert_guarded(bookmark);
        if !inserted {
            tracing::debug!(id = %id, "Duplicate insert ignored");
        }
        inserted
    }

    /// Merge a delete notification from the push stream
    pub fn merge_remote_delete(&self, id: &BookmarkId, owner: Option<&OwnerId>) -> bool {
        if owner.is_some_and(|owner| owner != &self.owner) {
            tracing::warn!(id = %id, "Ignoring delete for another owner");
            return false;
        }
        let removed = self
            .collection
            .send_if_modified(|collection| collection.remove(id).is_some());
        if removed {
            self.lock_pending().clear_if(id);
        } else {
            tracing::debug!(id = %id, "Delete of absent bookmark ignored");
        }
        removed
    }

    /// Route a push event. Status events do not touch the collection.
    pub fn apply(&self, event: PushEvent) -> bool {
        match event {
            PushEvent::Insert(bookmark) => self.merge_remote_insert(bookmark),
            PushEvent::Delete { id, owner_id } => self.merge_remote_delete(&id, owner_id.as_ref()),
            PushEvent::Status(_) => false,
        }
    }

    /// Mark `id` as awaiting confirmation, replacing any earlier mark.
    /// Ids not in the collection are not marked.
    pub fn mark_pending_delete(&self, id: &BookmarkId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.lock_pending().mark(id.clone());
        true
    }

    pub fn cancel_pending_delete(&self) -> Option<BookmarkId> {
        self.lock_pending().cancel()
    }

    pub fn pending_delete(&self) -> Option<BookmarkId> {
        self.lock_pending().current().cloned()
    }

    /// Delete whatever is pending. `Ok(None)` when nothing was marked.
    pub async fn confirm_pending_delete(&self) -> crate::Result<Option<DeleteOutcome>> {
        let id = self.lock_pending().take();
        match id {
            Some(id) => self.delete(&id).await.map(Some),
            None => Ok(None),
        }
    }

    fn insert_guarded(&self, bookmark: Bookmark) -> bool {
        self.collection
            .send_if_modified(move |collection| collection.insert(bookmark))
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingDelete> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("owner", &self.owner)
            .field("len", &self.len())
            .finish()
    }
}
