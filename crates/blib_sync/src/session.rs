//! Signed-in session: one engine plus one live subscription.
//!
//! Opening a session subscribes before the initial fetch. Changes are only
//! delivered once the stream reports `Connected`, so unless that happened
//! before the fetch started, the first `Connected` triggers another resync.
//! Duplicates are absorbed by the engine's guards. Closing the session, or
//! dropping it, releases the subscription.

use crate::{
    engine::ReconciliationEngine,
    store::{IdentityContext, PushEvent, RemoteStore, Status, Subscription},
    SyncError,
};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub struct Session {
    engine: Arc<ReconciliationEngine>,
    status: watch::Receiver<Status>,
    shutdown: Option<oneshot::Sender<()>>,
    pump: Option<JoinHandle<()>>,
}

impl Session {
    /// Open a session for the identity's current user
    pub async fn open(
        identity: &dyn IdentityContext,
        store: Arc<dyn RemoteStore>,
    ) -> crate::Result<Self> {
        let owner = identity.current_user_id().ok_or(SyncError::NotSignedIn)?;
        tracing::info!(owner = %owner, "Opening session");

        let mut subscription = store
            .subscribe(&owner)
            .await
            .map_err(|e| SyncError::Subscription(e.message))?;

        // changes queued so far committed before the fetch below starts
        let mut initial = Status::Connecting;
        while let Some(event) = subscription.try_next() {
            if let PushEvent::Status(status) = event {
                initial = status;
            }
        }

        let engine = Arc::new(ReconciliationEngine::new(owner, store));
        engine.resync().await?;

        let stale = initial != Status::Connected;
        if stale {
            tracing::debug!(status = %initial, "Stream not live yet, resync on connect");
        }

        let (status_tx, status) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_events(
            engine.clone(),
            subscription,
            status_tx,
            shutdown_rx,
            stale,
        ));

        Ok(Self {
            engine,
            status,
            shutdown: Some(shutdown_tx),
            pump: Some(pump),
        })
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Latest status of the live stream
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Error when the live stream is currently down
    pub fn ensure_live(&self) -> crate::Result<()> {
        match self.status() {
            Status::Disconnected => Err(SyncError::Subscription(
                "push stream disconnected".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Release the subscription and wait for the event pump to finish
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::warn!(error = %e, "Event pump ended abnormally");
            }
        }
        tracing::info!(owner = %self.engine.owner(), "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("owner", self.engine.owner())
            .field("status", &self.status())
            .finish()
    }
}

/// Apply push events to the engine until shutdown or end of stream
async fn pump_events(
    engine: Arc<ReconciliationEngine>,
    mut subscription: Subscription,
    status: watch::Sender<Status>,
    mut shutdown: oneshot::Receiver<()>,
    mut stale: bool,
) {

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = subscription.next() => match event {
                Some(PushEvent::Status(next)) => {
                    match next {
                        Status::Disconnected => {
                            tracing::warn!("Live updates disconnected");
                            stale = true;
                        }
                        Status::Connected if stale => {
                            stale = false;
                            // events may have been missed before the join
                            if let Err(e) = engine.resync().await {
                                tracing::warn!(error = %e, "Resync on connect failed");
                            }
                        }
                        _ => {}
                    }
                    status.send_replace(next);
                }
                Some(event) => {
                    engine.apply(event);
                }
                None => {
                    tracing::warn!("Push stream ended");
                    status.send_replace(Status::Disconnected);
                    break;
                }
            }
        }
    }

    subscription.unsubscribe();
}
