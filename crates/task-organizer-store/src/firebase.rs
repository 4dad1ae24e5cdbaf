//! Client for a Firebase Realtime Database over its REST and streaming API.

mod events;
mod tree;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use task_organizer_core::{RecordPatch, Snapshot, TaskId, TaskRecord};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{RecordStore, StoreError, Subscription, validate_collection, validate_key};
use events::EventParser;

/// Pause before the feed reconnects after the stream dropped.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Realtime Database REST client. Clones share one HTTP connection pool.
#[derive(Clone, Debug)]
pub struct FirebaseStore {
    client: Client,
    base_url: Arc<str>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Deserialize)]
struct FeedMessage {
    path: String,
    data: Value,
}

enum FeedEnd {
    /// Connection closed; reconnect.
    Closed,
    /// Server revoked the listener; stop.
    Cancelled,
}

impl FirebaseStore {
    /// Create a client for the database at `url`, e.g. `https://example.firebaseio.com`.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidUrl`] when the URL is not http(s).
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let base_url = url.trim().trim_end_matches('/');
        let has_host = base_url
            .strip_prefix("https://")
            .or_else(|| base_url.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(StoreError::InvalidUrl(url.to_owned()));
        }
        Ok(Self {
            client: Client::new(),
            base_url: Arc::from(base_url),
        })
    }

    /// Database root URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn node_url(&self, collection: &str, key: Option<&TaskId>) -> String {
        match key {
            Some(key) => format!("{}/{collection}/{key}.json", self.base_url),
            None => format!("{}/{collection}.json", self.base_url),
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

impl RecordStore for FirebaseStore {
    async fn create_record(&self, collection: &str, record: TaskRecord) -> Result<TaskId, StoreError> {
        validate_collection(collection)?;
        let response = self
            .client
            .post(self.node_url(collection, None))
            .json(&record)
            .send()
            .await?;
        let pushed: PushResponse = ensure_success(response).await?.json().await?;
        let key = TaskId::new(pushed.name);
        info!(collection, %key, number = record.number, "Created record");
        Ok(key)
    }

    async fn set_record_fields(
        &self,
        collection: &str,
        key: &TaskId,
        patch: RecordPatch,
    ) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(key)?;
        let response = self
            .client
            .patch(self.node_url(collection, Some(key)))
            .json(&patch)
            .send()
            .await?;
        ensure_success(response).await?;
        info!(collection, %key, "Updated record");
        Ok(())
    }

    async fn delete_record(&self, collection: &str, key: &TaskId) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(key)?;
        let response = self
            .client
            .delete(self.node_url(collection, Some(key)))
            .send()
            .await?;
        ensure_success(response).await?;
        info!(collection, %key, "Deleted record");
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        validate_collection(collection)?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let (sender, receiver) = watch::channel(None);
        let client = self.client.clone();
        let url = self.node_url(collection, None);
        let feed = runtime.spawn(run_feed(client, url, sender));
        Ok(Subscription::new(collection, receiver).with_feed(feed.abort_handle()))
    }
}

async fn run_feed(client: Client, url: String, sender: watch::Sender<Option<Snapshot>>) {
    loop {
        match stream_once(&client, &url, &sender).await {
            Ok(FeedEnd::Cancelled) => {
                warn!(%url, "Database cancelled the listener");
                return;
            }
            Ok(FeedEnd::Closed) => debug!(%url, "Event stream closed; reconnecting"),
            Err(err) => warn!(%url, error = %err, "Event stream failed; reconnecting"),
        }
        if sender.is_closed() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn stream_once(
    client: &Client,
    url: &str,
    sender: &watch::Sender<Option<Snapshot>>,
) -> Result<FeedEnd, StoreError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    let mut response = ensure_success(response).await?;
    debug!(%url, "Event stream connected");

    let mut parser = EventParser::default();
    let mut mirror = Value::Null;
    while let Some(chunk) = response.chunk().await? {
        for event in parser.feed(&chunk) {
            match event.name.as_str() {
                "put" | "patch" => {
                    let message: FeedMessage = serde_json::from_str(&event.data)?;
                    if event.name == "put" {
                        tree::put(&mut mirror, &message.path, message.data);
                    } else {
                        tree::patch(&mut mirror, &message.path, message.data);
                    }
                    publish(&mirror, sender);
                }
                "keep-alive" => {}
                "cancel" | "auth_revoked" => return Ok(FeedEnd::Cancelled),
                other => debug!(event = other, "Ignoring unknown stream event"),
            }
        }
    }
    Ok(FeedEnd::Closed)
}

fn publish(mirror: &Value, sender: &watch::Sender<Option<Snapshot>>) {
    let (snapshot, rejected) = Snapshot::from_json(mirror);
    if !rejected.is_empty() {
        warn!(rejected = rejected.len(), "Skipping malformed records");
    }
    debug!(records = snapshot.len(), "Publishing snapshot");
    sender.send_replace(Some(snapshot));
}
