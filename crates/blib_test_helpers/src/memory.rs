//! In-memory remote store for engine and session tests
//!
//! Behaves like the hosted store: rows are scoped by owner, ids and
//! timestamps are assigned on create, and every successful mutation is
//! re-reported to that owner's subscribers, the same way the realtime feed
//! echoes a client's own writes.
//!
//! Failures can be injected per operation, and [`Gate`]s hold a create or
//! delete mid-flight so tests can observe the optimistic window.

use async_trait::async_trait;
use blib_common::{Bookmark, BookmarkId, NewBookmark, OwnerId, RemoteError};
use blib_sync::{PushEvent, RemoteStore, Status, Subscription};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify, Semaphore};

/// Holds an operation after it has been received until released
#[derive(Clone)]
pub struct Gate {
    entered: Arc<Notify>,
    proceed: Arc<Semaphore>,
}

impl Gate {
    fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            proceed: Arc::new(Semaphore::new(0)),
        }
    }

    /// Wait until an operation is parked at the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked operation continue
    pub fn release(&self) {
        self.proceed.add_permits(1);
    }

    async fn pass(&self) -> Result<(), RemoteError> {
        self.entered.notify_one();
        self.proceed
            .acquire()
            .await
            .map(|permit| permit.forget())
            .map_err(|_| RemoteError::new("gate closed"))
    }
}

struct Subscriber {
    key: u64,
    owner: OwnerId,
    events: mpsc::Sender<PushEvent>,
}

#[derive(Default)]
struct Faults {
    create: Option<String>,
    delete: Option<String>,
    fetch: Option<String>,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub creates: usize,
    pub deletes: usize,
    pub fetches: usize,
    pub subscribes: usize,
}

struct State {
    rows: Vec<Bookmark>,
    subscribers: Vec<Subscriber>,
    next_key: u64,
    next_id: u64,
    id_prefix: String,
    clock: DateTime<Utc>,
    faults: Faults,
    create_gate: Option<Gate>,
    delete_gate: Option<Gate>,
    calls: CallCounts,
}

/// Remote store kept entirely in memory
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Ids are `a1`, `a2`, ...; timestamps start at 2024-01-01 10:00 UTC and
    /// advance one minute per create.
    pub fn new() -> Self {
        let clock = Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            state: Arc::new(Mutex::new(State {
                rows: Vec::new(),
                subscribers: Vec::new(),
                next_key: 0,
                next_id: 1,
                id_prefix: "a".to_string(),
                clock,
                faults: Faults::default(),
                create_gate: None,
                delete_gate: None,
                calls: CallCounts::default(),
            })),
        }
    }

    /// Store pre-populated with rows (any owners)
    pub fn with_rows(rows: Vec<Bookmark>) -> Self {
        let store = Self::new();
        store.lock().rows = rows;
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a row directly, as another device would. Subscribers of the
    /// row's owner are notified.
    pub fn insert_row(&self, bookmark: Bookmark) {
        let mut state = self.lock();
        state.rows.push(bookmark.clone());
        let owner = bookmark.owner_id.clone();
        broadcast(&mut state, &owner, PushEvent::Insert(bookmark));
    }

    /// Insert a row without notifying anyone, like a change made while a
    /// subscriber was offline
    pub fn insert_row_unannounced(&self, bookmark: Bookmark) {
        self.lock().rows.push(bookmark);
    }

    /// Delete a row directly, as another device would
    pub fn delete_row(&self, id: &BookmarkId) -> Option<Bookmark> {
        let mut state = self.lock();
        let idx = state.rows.iter().position(|b| &b.id == id)?;
        let removed = state.rows.remove(idx);
        let owner = removed.owner_id.clone();
        broadcast(
            &mut state,
            &owner,
            PushEvent::Delete {
                id: removed.id.clone(),
                owner_id: Some(owner.clone()),
            },
        );
        Some(removed)
    }

    /// Push an arbitrary event to every subscriber of `owner`
    pub fn emit(&self, owner: &OwnerId, event: PushEvent) {
        let mut state = self.lock();
        broadcast(&mut state, owner, event);
    }

    /// End every live stream, as a dropped connection would
    pub fn disconnect_all(&self) {
        self.lock().subscribers.clear();
    }

    pub fn fail_next_create(&self, message: &str) {
        self.lock().faults.create = Some(message.to_string());
    }

    pub fn fail_next_delete(&self, message: &str) {
        self.lock().faults.delete = Some(message.to_string());
    }

    pub fn fail_next_fetch(&self, message: &str) {
        self.lock().faults.fetch = Some(message.to_string());
    }

    /// Park the next create after it has been applied, before it responds
    pub fn pause_next_create(&self) -> Gate {
        let gate = Gate::new();
        self.lock().create_gate = Some(gate.clone());
        gate
    }

    /// Park the next delete before it is applied
    pub fn pause_next_delete(&self) -> Gate {
        let gate = Gate::new();
        self.lock().delete_gate = Some(gate.clone());
        gate
    }

    /// Rows for `owner`, newest first
    pub fn rows_for(&self, owner: &OwnerId) -> Vec<Bookmark> {
        let state = self.lock();
        newest_first(&state.rows, owner)
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Live subscriptions across all owners
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

fn newest_first(rows: &[Bookmark], owner: &OwnerId) -> Vec<Bookmark> {
    let mut mine: Vec<Bookmark> = rows
        .iter()
        .filter(|b| &b.owner_id == owner)
        .cloned()
        .collect();
    mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    mine
}

fn broadcast(state: &mut State, owner: &OwnerId, event: PushEvent) {
    state.subscribers.retain(|sub| !sub.events.is_closed());
    for sub in state.subscribers.iter().filter(|sub| &sub.owner == owner) {
        let _ = sub.events.try_send(event.clone());
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn create(&self, owner: &OwnerId, draft: &NewBookmark) -> Result<Bookmark, RemoteError> {
        let (created, gate) = {
            let mut state = self.lock();
            state.calls.creates += 1;
            if let Some(message) = state.faults.create.take() {
                return Err(RemoteError::new(message));
            }

            let id = BookmarkId::new(format!("{}{}", state.id_prefix, state.next_id));
            state.next_id += 1;
            let created_at = state.clock;
            state.clock += Duration::minutes(1);

            let created = Bookmark {
                id,
                url: draft.url.clone(),
                title: draft.title.clone(),
                owner_id: owner.clone(),
                created_at,
            };
            state.rows.push(created.clone());
            broadcast(&mut state, owner, PushEvent::Insert(created.clone()));
            (created, state.create_gate.take())
        };

        if let Some(gate) = gate {
            gate.pass().await?;
        }
        Ok(created)
    }

    async fn delete(&self, id: &BookmarkId, owner: &OwnerId) -> Result<(), RemoteError> {
        let gate = {
            let mut state = self.lock();
            state.calls.deletes += 1;
            state.delete_gate.take()
        };
        if let Some(gate) = gate {
            gate.pass().await?;
        }

        let mut state = self.lock();
        if let Some(message) = state.faults.delete.take() {
            return Err(RemoteError::new(message));
        }

        let idx = state
            .rows
            .iter()
            .position(|b| &b.id == id && &b.owner_id == owner);
        if let Some(idx) = idx {
            state.rows.remove(idx);
            broadcast(
                &mut state,
                owner,
                PushEvent::Delete {
                    id: id.clone(),
                    owner_id: Some(owner.clone()),
                },
            );
        }
        Ok(())
    }

    async fn fetch_all(&self, owner: &OwnerId) -> Result<Vec<Bookmark>, RemoteError> {
        let mut state = self.lock();
        state.calls.fetches += 1;
        if let Some(message) = state.faults.fetch.take() {
            return Err(RemoteError::new(message));
        }
        Ok(newest_first(&state.rows, owner))
    }

    async fn subscribe(&self, owner: &OwnerId) -> Result<Subscription, RemoteError> {
        let (tx, rx) = mpsc::channel(1024);
        let _ = tx.try_send(PushEvent::Status(Status::Connected));

        let key = {
            let mut state = self.lock();
            state.calls.subscribes += 1;
            let key = state.next_key;
            state.next_key += 1;
            state.subscribers.push(Subscriber {
                key,
                owner: owner.clone(),
                events: tx,
            });
            key
        };

        let state = self.state.clone();
        Ok(Subscription::new(rx, move || {
            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.subscribers.retain(|sub| sub.key != key);
        }))
    }
}
