//! Types for the completion toggle, the one write that continues after it lands.

use task_organizer_core::TaskId;
use task_organizer_store::StoreError;
use thiserror::Error;

/// Proof that the `completed` write for a task was acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleConfirmation {
    /// Task that was toggled.
    pub id: TaskId,
    /// Value the store accepted.
    pub completed: bool,
}

/// The `completed` write was rejected; nothing follows.
#[derive(Debug, Error)]
#[error("failed to toggle task {id}: {source}")]
pub struct ToggleFailure {
    /// Task that was toggled.
    pub id: TaskId,
    /// Store error behind the failure.
    #[source]
    pub source: StoreError,
}

/// Result of the follow-up step once a toggle write resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Task ended up completed: deletion was requested and it left the list.
    Removed(TaskId),
    /// Task ended up not completed and stays listed.
    Reopened(TaskId),
    /// Task had already left the list; nothing to do.
    Gone(TaskId),
    /// The write failed; the list waits for the next snapshot.
    Failed(TaskId),
}

impl ToggleOutcome {
    /// Task the outcome refers to.
    pub const fn id(&self) -> &TaskId {
        match self {
            Self::Removed(id) | Self::Reopened(id) | Self::Gone(id) | Self::Failed(id) => id,
        }
    }
}

pub(crate) type ToggleResult = Result<ToggleConfirmation, ToggleFailure>;
