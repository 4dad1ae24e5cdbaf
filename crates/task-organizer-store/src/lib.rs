//! Realtime record stores for task-organizer.
//!
//! Every backend exposes the same four primitives: create a record, merge fields
//! into a record, delete a record, and subscribe to full snapshots of a collection.

mod collections;
/// Store error type.
pub mod error;
/// File-backed store.
pub mod file;
/// Firebase Realtime Database client.
pub mod firebase;
/// In-process store.
pub mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use task_organizer_core::{RecordPatch, Snapshot, TaskId, TaskRecord};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

/// Primitive operations of a hosted realtime record store.
///
/// Writes resolve once the store acknowledged them. Subscriptions deliver full
/// snapshots, never deltas.
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Create a record under `collection` and return its generated key.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the path is invalid or the write fails.
    fn create_record(
        &self,
        collection: &str,
        record: TaskRecord,
    ) -> impl Future<Output = Result<TaskId, StoreError>> + Send;

    /// Merge the fields set in `patch` into the record stored under `key`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the path is invalid or the write fails.
    fn set_record_fields(
        &self,
        collection: &str,
        key: &TaskId,
        patch: RecordPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the record stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the path is invalid or the write fails.
    fn delete_record(
        &self,
        collection: &str,
        key: &TaskId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Start listening to `collection`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the path is invalid or the feed cannot start.
    fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;
}

/// Live listener on a collection. Dropping it releases the listener.
#[derive(Debug)]
pub struct Subscription {
    collection: String,
    receiver: watch::Receiver<Option<Snapshot>>,
    primed: bool,
    feed: Option<AbortHandle>,
}

impl Subscription {
    pub(crate) fn new(collection: &str, receiver: watch::Receiver<Option<Snapshot>>) -> Self {
        debug!(collection, "subscription opened");
        Self {
            collection: collection.to_owned(),
            receiver,
            primed: false,
            feed: None,
        }
    }

    /// Tie a background feed to this subscription; it is aborted on drop.
    pub(crate) fn with_feed(mut self, feed: AbortHandle) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Wait for the next snapshot.
    ///
    /// The first call yields the current state as soon as it is known. Returns
    /// `None` once the store stops publishing.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        if !self.primed {
            self.primed = true;
            let current = self.receiver.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            let current = self.receiver.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        debug!(collection = %self.collection, "subscription released");
    }
}

const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Check a collection name against the database key rules.
///
/// # Errors
/// Returns [`StoreError::InvalidPath`] for empty names or forbidden characters.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    validate_segment("collection", name)
}

pub(crate) fn validate_key(key: &TaskId) -> Result<(), StoreError> {
    validate_segment("record key", key.as_str())
}

fn validate_segment(kind: &'static str, value: &str) -> Result<(), StoreError> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.contains(FORBIDDEN_KEY_CHARS) {
        "must not contain '/', '.', '#', '$', '[' or ']'"
    } else if value.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidPath {
        kind,
        value: value.to_owned(),
        reason,
    })
}

pub(crate) fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_follow_key_rules() {
        assert!(validate_collection("tasks").is_ok());
        assert!(validate_collection("team-tasks_2").is_ok());
        for bad in ["", "a/b", "a.b", "a#b", "a$b", "a[b", "a]b", "a\nb"] {
            assert!(
                matches!(validate_collection(bad), Err(StoreError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn subscription_yields_current_state_first() {
        let (sender, receiver) = watch::channel(Some(Snapshot::absent()));
        let mut subscription = Subscription::new("tasks", receiver);

        let first = subscription.next_snapshot().await;
        assert_eq!(first, Some(Snapshot::absent()));

        drop(sender);
        assert_eq!(subscription.next_snapshot().await, None);
    }

    #[tokio::test]
    async fn subscription_waits_until_state_is_known() {
        let (sender, receiver) = watch::channel(None);
        let mut subscription = Subscription::new("tasks", receiver);

        sender.send_replace(Some(Snapshot::absent()));
        assert_eq!(subscription.next_snapshot().await, Some(Snapshot::absent()));
    }
}
