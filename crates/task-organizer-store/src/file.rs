use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use task_organizer_core::{RecordPatch, Snapshot, TaskId, TaskRecord};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::collections::Collections;
use crate::{RecordStore, StoreError, Subscription, guard, validate_collection, validate_key};

/// How often subscriptions look for writes made by other processes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Store persisted as a single JSON document shaped like a database export.
///
/// Every write re-reads the document under an exclusive lock on a sidecar
/// `.lock` file, so handles in other processes never drop each other's records.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    path: PathBuf,
    lock_path: PathBuf,
    state: Mutex<FileState>,
}

struct FileState {
    collections: Collections,
    modified: Option<SystemTime>,
}

/// Exclusive lock on the sidecar file; released when dropped.
struct DocumentLock {
    file: File,
}

impl DocumentLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(err) = fs2::FileExt::unlock(&self.file) {
            warn!(error = %err, "Failed to release document lock");
        }
    }
}

impl FileStore {
    /// Open the document at `path`. A missing file is an empty database.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let (document, modified) = read_document(&path)?;
        let collections = Collections::from_document(&document);
        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        debug!(path = %path.display(), "Opened file store");
        Ok(Self {
            inner: Arc::new(FileInner {
                path,
                lock_path: PathBuf::from(lock_path),
                state: Mutex::new(FileState {
                    collections,
                    modified,
                }),
            }),
        })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current contents of `collection` as last loaded by this handle.
    pub fn snapshot(&self, collection: &str) -> Snapshot {
        guard(&self.inner.state).collections.snapshot(collection)
    }

    /// Pick up writes made by other processes.
    ///
    /// Returns the number of collections whose contents changed.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read or parsed.
    pub fn reload(&self) -> Result<usize, StoreError> {
        self.inner.reload_if_changed()
    }

    async fn write<T, F>(&self, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Collections) -> T + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.mutate(apply)).await?
    }
}

impl FileInner {
    /// Read-modify-write against the document on disk. The cached state is only
    /// replaced, and subscribers only notified, once the new document is in place.
    fn mutate<T>(&self, apply: impl FnOnce(&mut Collections) -> T) -> Result<T, StoreError> {
        let _lock = DocumentLock::acquire(&self.lock_path)?;
        let mut state = guard(&self.state);
        let (current, _) = read_document(&self.path)?;
        let mut working = Collections::from_document(&current);
        let output = apply(&mut working);
        let document = working.to_document()?;
        state.modified = write_document(&self.path, &document)?;
        let changed = state.collections.replace_all(&document);
        debug!(path = %self.path.display(), changed, "Wrote file store");
        Ok(output)
    }

    fn reload_if_changed(&self) -> Result<usize, StoreError> {
        let modified = modified_time(&self.path)?;
        let mut state = guard(&self.state);
        if modified == state.modified {
            return Ok(0);
        }
        let (document, modified) = read_document(&self.path)?;
        state.modified = modified;
        let changed = state.collections.replace_all(&document);
        if changed > 0 {
            debug!(path = %self.path.display(), changed, "Reloaded file store");
        }
        Ok(changed)
    }
}

fn modified_time(path: &Path) -> Result<Option<SystemTime>, StoreError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.modified().ok()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_document(path: &Path) -> Result<(Value, Option<SystemTime>), StoreError> {
    let modified = modified_time(path)?;
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok((Value::Null, None)),
        Err(err) => return Err(err.into()),
    };
    if contents.trim().is_empty() {
        return Ok((Value::Null, modified));
    }
    Ok((serde_json::from_str(&contents)?, modified))
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_document(path: &Path, document: &Value) -> Result<Option<SystemTime>, StoreError> {
    ensure_parent(path)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
    fs::rename(&tmp, path)?;
    modified_time(path)
}

impl RecordStore for FileStore {
    async fn create_record(&self, collection: &str, record: TaskRecord) -> Result<TaskId, StoreError> {
        validate_collection(collection)?;
        let number = record.number;
        let name = collection.to_owned();
        let key = self
            .write(move |collections| collections.create(&name, record))
            .await?;
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
        let name = collection.to_owned();
        let target = key.clone();
        self.write(move |collections| collections.patch(&name, &target, &patch))
            .await?;
        info!(collection, %key, "Updated record");
        Ok(())
    }

    async fn delete_record(&self, collection: &str, key: &TaskId) -> Result<(), StoreError> {
        validate_collection(collection)?;
        validate_key(key)?;
        let name = collection.to_owned();
        let target = key.clone();
        if self
            .write(move |collections| collections.delete(&name, &target))
            .await?
        {
            info!(collection, %key, "Deleted record");
        } else {
            debug!(collection, %key, "Delete of missing record ignored");
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        validate_collection(collection)?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        let receiver = guard(&self.inner.state).collections.receiver(collection);

        let inner = Arc::clone(&self.inner);
        let poller = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let polled = Arc::clone(&inner);
                let reloaded = tokio::task::spawn_blocking(move || polled.reload_if_changed()).await;
                match reloaded {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        warn!(path = %inner.path.display(), error = %err, "Failed to poll file store");
                    }
                    Err(err) => {
                        warn!(path = %inner.path.display(), error = %err, "File store poll did not finish");
                    }
                }
            }
        });

        Ok(Subscription::new(collection, receiver).with_feed(poller.abort_handle()))
    }
}
