use std::sync::{Arc, Mutex};

use task_organizer_core::{RecordPatch, Snapshot, TaskId, TaskRecord};
use tracing::{debug, info};

use crate::collections::Collections;
use crate::{RecordStore, StoreError, Subscription, guard, validate_collection, validate_key};

/// In-process realtime store. Clones share the same collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of `collection`.
    pub fn snapshot(&self, collection: &str) -> Snapshot {
        guard(&self.inner).snapshot(collection)
    }
}

impl RecordStore for MemoryStore {
    async fn create_record(&self, collection: &str, record: TaskRecord) -> Result<TaskId, StoreError> {
        validate_collection(collection)?;
        let number = record.number;
        let key = guard(&self.inner).create(collection, record);
        info!(collection, %key, number, "Created record");
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
        guard(&self.inner).patch(collection, key, &patch);
        info!(collection, %key, "Updated record");
        Ok(())
    }

    async fn delete_record(&self, collection: &str, key: &TaskId) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(key)?;
        let existed = guard(&self.inner).delete(collection, key);
        if existed {
            info!(collection, %key, "Deleted record");
        } else {
            debug!(collection, %key, "Delete of missing record ignored");
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        validate_collection(collection)?;
        let receiver = guard(&self.inner).receiver(collection);
        Ok(Subscription::new(collection, receiver))
    }
}
