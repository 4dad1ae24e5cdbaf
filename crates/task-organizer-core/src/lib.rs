//! Domain types for task-organizer: tasks, record payloads and collection snapshots.

/// Record key type.
pub mod id;
/// Case-insensitive search.
pub mod text_matcher;
/// Filtered views over the task list.
pub mod view;

pub use crate::id::TaskId;
pub use crate::text_matcher::TextMatcher;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fields stored for each record in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Display text.
    #[serde(default)]
    pub text: String,
    /// Completion flag; `false` on creation.
    #[serde(default)]
    pub completed: bool,
    /// Display number assigned at creation time.
    #[serde(default)]
    pub number: u32,
}

impl TaskRecord {
    /// Payload for a freshly added task.
    pub fn new(text: impl Into<String>, number: u32) -> Self {
        Self {
            text: text.into(),
            completed: false,
            number,
        }
    }

    /// Attach the key the record is stored under.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            number: self.number,
            text: self.text,
            completed: self.completed,
        }
    }
}

/// Partial record update; unset fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Replacement text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Replacement completion flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Replacement display number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

impl RecordPatch {
    /// Patch that only touches `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Patch that only touches `completed`.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// True when the patch carries no field.
    pub const fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.number.is_none()
    }

    /// Merge the set fields into `record`.
    pub fn apply_to(&self, record: &mut TaskRecord) {
        if let Some(text) = &self.text {
            record.text.clone_from(text);
        }
        if let Some(completed) = self.completed {
            record.completed = completed;
        }
        if let Some(number) = self.number {
            record.number = number;
        }
    }
}

/// A task as seen by the view layer: a record plus its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Record key.
    pub id: TaskId,
    /// Display number.
    pub number: u32,
    /// Display text.
    pub text: String,
    /// Completion flag.
    pub completed: bool,
}

/// Full contents of a collection at one instant.
///
/// `None` mirrors an absent collection node, which the view treats as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Option<BTreeMap<TaskId, TaskRecord>>,
}

impl Snapshot {
    /// Snapshot of an absent collection.
    pub const fn absent() -> Self {
        Self { entries: None }
    }

    /// Snapshot from collection entries; an empty map is reported as absent.
    pub fn from_entries(entries: BTreeMap<TaskId, TaskRecord>) -> Self {
        if entries.is_empty() {
            Self::absent()
        } else {
            Self {
                entries: Some(entries),
            }
        }
    }

    /// Decode a JSON collection node, skipping children that are not records.
    ///
    /// Returns the snapshot together with the keys that were dropped.
    pub fn from_json(node: &Value) -> (Self, Vec<TaskId>) {
        let Some(children) = node.as_object() else {
            return (Self::absent(), Vec::new());
        };
        let mut entries = BTreeMap::new();
        let mut rejected = Vec::new();
        for (key, value) in children {
            match TaskRecord::deserialize(value) {
                Ok(record) if value.is_object() => {
                    entries.insert(TaskId::new(key.as_str()), record);
                }
                _ => rejected.push(TaskId::new(key.as_str())),
            }
        }
        (Self::from_entries(entries), rejected)
    }

    /// True when the collection node does not exist.
    pub const fn is_absent(&self) -> bool {
        self.entries.is_none()
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, BTreeMap::len)
    }

    /// True when the snapshot holds no record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw entries.
    pub const fn entries(&self) -> Option<&BTreeMap<TaskId, TaskRecord>> {
        self.entries.as_ref()
    }

    /// Convert into the display list, sorted by ascending `number`.
    #[must_use]
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .entries
            .unwrap_or_default()
            .into_iter()
            .map(|(id, record)| record.into_task(id))
            .collect();
        // Stable sort keeps key order for duplicated numbers.
        tasks.sort_by_key(|task| task.number);
        tasks
    }
}

/// Rejection reasons for new task text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskTextError {
    /// Text is empty or whitespace only.
    #[error("task text must not be blank")]
    Blank,
}

/// Validate text submitted for a new task. Edits are not re-validated.
///
/// # Errors
/// Returns [`TaskTextError::Blank`] when `text` trims to nothing.
pub fn validate_text(text: &str) -> Result<(), TaskTextError> {
    if text.trim().is_empty() {
        return Err(TaskTextError::Blank);
    }
    Ok(())
}

/// Display number for a task created while `count` tasks are listed.
///
/// The count is client-local, so concurrent clients may hand out the same number.
pub fn next_number(count: usize) -> u32 {
    u32::try_from(count).map_or(u32::MAX, |count| count.saturating_add(1))
}
