//! Application layer for task-organizer.
//!
//! [`ViewSyncStore`] mirrors a collection of a [`RecordStore`](task_organizer_store::RecordStore)
//! and derives the filtered task views; [`ProjectConfig`] picks the backend.

pub mod config;
pub mod notice;
pub mod sync_store;
pub mod toggle;

pub use config::{DEFAULT_CONFIG, ProjectConfig, StoreConfig};
pub use notice::{EMPTY_TASK_MESSAGE, NOTICE_TIMEOUT, Notice};
pub use sync_store::{SyncEvent, ViewModel, ViewState, ViewSyncStore};
pub use toggle::{ToggleConfirmation, ToggleFailure, ToggleOutcome};
