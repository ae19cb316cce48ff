//! Hosted remote store: REST for mutations and fetches, realtime websocket
//! for the change stream.

use crate::{config::SyncConfig, realtime, store::RemoteStore, store::Subscription, SyncError};
use async_trait::async_trait;
use blib_common::{sanitizer::sanitize, Bookmark, BookmarkId, NewBookmark, OwnerId, RemoteError};
use reqwest::{header, Client, Request, StatusCode};
use serde::Serialize;
use url::Url;

/// Accept header asking for a single object instead of a one-element array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Serialize)]
struct InsertRow<'a> {
    url: &'a str,
    title: &'a str,
    user_id: &'a str,
}

/// Remote store backed by a hosted Postgres REST API
pub struct HostedStore {
    config: SyncConfig,
    endpoint: Url,
    http: Client,
}

impl HostedStore {
    pub fn new(config: SyncConfig) -> crate::Result<Self> {
        config.validate()?;
        let endpoint = config.rest_endpoint()?;
        let http = Client::builder()
            .user_agent(concat!("blib/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            endpoint,
            http,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
    }

    pub fn create_request(&self, owner: &OwnerId, draft: &NewBookmark) -> crate::Result<Request> {
        let row = InsertRow {
            url: &draft.url,
            title: &draft.title,
            user_id: owner.as_str(),
        };
        Ok(self
            .authorized(self.http.post(self.endpoint.clone()))
            .header("Prefer", "return=representation")
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(&row)
            .build()?)
    }

    pub fn delete_request(&self, id: &BookmarkId, owner: &OwnerId) -> crate::Result<Request> {
        Ok(self
            .authorized(self.http.delete(self.endpoint.clone()))
            .query(&[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", owner)),
            ])
            .build()?)
    }

    pub fn fetch_request(&self, owner: &OwnerId) -> crate::Result<Request> {
        Ok(self
            .authorized(self.http.get(self.endpoint.clone()))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", owner)),
                ("order", "created_at.desc".to_string()),
            ])
            .build()?)
    }

    /// Execute and return the body of a successful response
    async fn execute(&self, request: Request) -> crate::Result<String> {
        let method = request.method().clone();
        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            tracing::debug!(%method, %status, "Store request succeeded");
            Ok(body)
        } else {
            tracing::warn!(%method, %status, body = %sanitize(&body), "Store request failed");
            Err(SyncError::Remote(remote_error(status, &body)))
        }
    }

    async fn create_inner(&self, owner: &OwnerId, draft: &NewBookmark) -> crate::Result<Bookmark> {
        let body = self.execute(self.create_request(owner, draft)?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_inner(&self, owner: &OwnerId) -> crate::Result<Vec<Bookmark>> {
        let body = self.execute(self.fetch_request(owner)?).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Turn an error response into a user-facing message
pub fn remote_error(status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("request failed");
            format!("{} {}", status.as_u16(), reason)
        });
    RemoteError::new(message)
}

#[async_trait]
impl RemoteStore for HostedStore {
    async fn create(&self, owner: &OwnerId, draft: &NewBookmark) -> Result<Bookmark, RemoteError> {
        self.create_inner(owner, draft)
            .await
            .map_err(SyncError::into_remote)
    }

    async fn delete(&self, id: &BookmarkId, owner: &OwnerId) -> Result<(), RemoteError> {
        let request = self.delete_request(id, owner).map_err(SyncError::into_remote)?;
        self.execute(request)
            .await
            .map(|_| ())
            .map_err(SyncError::into_remote)
    }

    async fn fetch_all(&self, owner: &OwnerId) -> Result<Vec<Bookmark>, RemoteError> {
        self.fetch_inner(owner).await.map_err(SyncError::into_remote)
    }

    async fn subscribe(&self, owner: &OwnerId) -> Result<Subscription, RemoteError> {
        realtime::subscribe(&self.config, owner).map_err(SyncError::into_remote)
    }
}
