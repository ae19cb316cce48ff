//! # B-Lib Sync Engine
//!
//! Keeps a local, in-memory bookmark collection consistent with a remote
//! store while the user mutates it optimistically and the store pushes
//! change notifications for the same rows.
//!
//! ## Architecture
//!
//! - **Engine**: [`ReconciliationEngine`] owns the collection; every insert
//!   path is guarded by an id-existence check and every delete path by a
//!   presence check, so request responses and push events may arrive in any
//!   order.
//! - **Recovery**: a failed delete triggers a full resync from the store.
//! - **Session**: [`Session`] ties the live subscription to sign-in and
//!   sign-out.
//! - **Transport**: [`HostedStore`] speaks REST for mutations and a Phoenix
//!   websocket channel for push events.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blib_sync::{HostedStore, Session, StaticIdentity, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig {
//!         project_url: "https://abc.supabase.co".to_string(),
//!         api_key: "anon-key".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let store = Arc::new(HostedStore::new(config)?);
//!     let session = Session::open(&StaticIdentity::signed_in("user-123"), store).await?;
//!     session.engine().add("https://example.com", "Example").await?;
//!     session.close().await;
//!
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod engine;
pub mod hosted;
pub mod pending;
pub mod protocol;
pub mod realtime;
pub mod session;
pub mod store;

pub use collection::Collection;
pub use config::SyncConfig;
pub use engine::{DeleteOutcome, ReconciliationEngine};
pub use hosted::HostedStore;
pub use pending::PendingDelete;
pub use protocol::PhoenixMessage;
pub use session::Session;
pub use store::{IdentityContext, PushEvent, RemoteStore, StaticIdentity, Status, Subscription};

use blib_common::RemoteError;

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Live updates unavailable: {0}")]
    Subscription(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::WebSocket(Box::new(e))
    }
}

impl SyncError {
    /// Message safe to hand back through a [`RemoteError`]
    pub(crate) fn into_remote(self) -> RemoteError {
        match self {
            SyncError::Remote(e) => e,
            other => RemoteError::new(blib_common::sanitizer::sanitize(&other.to_string())),
        }
    }
}
