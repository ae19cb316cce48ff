//! Collaborator contracts: the remote store and the identity context

use async_trait::async_trait;
use blib_common::{Bookmark, BookmarkId, NewBookmark, OwnerId, RemoteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Connection state of the live change stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Connecting,
    Connected,
    Disconnected,
}

impl Status {
    /// Short label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            Status::Connecting => "Connecting\u{2026}",
            Status::Connected => "Live sync active",
            Status::Disconnected => "Reconnecting\u{2026}",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Connecting => "connecting",
            Status::Connected => "connected",
            Status::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Notification delivered by a [`Subscription`]
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A row was inserted for the subscribed owner
    Insert(Bookmark),

    /// A row was deleted. Delete payloads may only carry the primary key,
    /// so the owner is optional.
    Delete {
        id: BookmarkId,
        owner_id: Option<OwnerId>,
    },

    Status(Status),
}

/// Live change stream for one owner.
///
/// Dropping the subscription or calling [`Subscription::unsubscribe`]
/// releases the underlying connection.
pub struct Subscription {
    events: mpsc::Receiver<PushEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(events: mpsc::Receiver<PushEvent>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            events,
            release: Some(Box::new(release)),
        }
    }

    /// A stream that reports one status and then stays silent until released
    pub fn idle(status: Status) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(PushEvent::Status(status));
        Self::new(rx, move || drop(tx))
    }

    /// Next event; `None` once the transport has shut down
    pub async fn next(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }

    /// Event already queued, without waiting
    pub fn try_next(&mut self) -> Option<PushEvent> {
        self.events.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Remote store operations, all scoped to an owner
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a row and return it with its store-assigned id and timestamp
    async fn create(&self, owner: &OwnerId, draft: &NewBookmark) -> Result<Bookmark, RemoteError>;

    async fn delete(&self, id: &BookmarkId, owner: &OwnerId) -> Result<(), RemoteError>;

    /// Every row for the owner, newest `created_at` first
    async fn fetch_all(&self, owner: &OwnerId) -> Result<Vec<Bookmark>, RemoteError>;

    /// Open the owner's change stream. Implementations must only deliver
    /// events for rows belonging to `owner`.
    async fn subscribe(&self, owner: &OwnerId) -> Result<Subscription, RemoteError>;
}

/// Source of the signed-in user's id
pub trait IdentityContext: Send + Sync {
    fn current_user_id(&self) -> Option<OwnerId>;
}

/// Identity fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<OwnerId>);

impl StaticIdentity {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self(Some(OwnerId::new(id)))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityContext for StaticIdentity {
    fn current_user_id(&self) -> Option<OwnerId> {
        self.0.clone()
    }
}
