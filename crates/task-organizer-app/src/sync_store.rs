//! View-sync store: the in-memory task list mirrored from a record store.

use std::future::Future;

use serde::Serialize;
use task_organizer_core::view::{visible_completed_tasks, visible_tasks};
use task_organizer_core::{
    RecordPatch, Snapshot, Task, TaskId, TaskRecord, TaskTextError, next_number, validate_text,
};
use task_organizer_store::{RecordStore, StoreError, Subscription};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::notice::Notice;
use crate::toggle::{ToggleConfirmation, ToggleFailure, ToggleOutcome, ToggleResult};

/// UI state owned by the store. Only [`ViewSyncStore`] methods mutate it.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    tasks: Vec<Task>,
    search_query: String,
    draft_text: String,
    editing_task: Option<Task>,
    notice: Option<Notice>,
}

impl ViewState {
    fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }
}

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A snapshot replaced the task list.
    TasksReplaced {
        /// Number of tasks now listed.
        count: usize,
    },
    /// A completion toggle resolved.
    ToggleFinished(ToggleOutcome),
    /// The validation notice timed out.
    NoticeCleared,
    /// The store stopped publishing snapshots.
    SubscriptionClosed,
}

/// Owned render model for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    /// Tasks matching the search query.
    pub tasks: Vec<Task>,
    /// Completed tasks matching the search query.
    pub completed_tasks: Vec<Task>,
    /// Current search query.
    pub search_query: String,
    /// Contents of the add box.
    pub draft_text: String,
    /// Task open in the edit surface.
    pub editing_task: Option<Task>,
    /// Active notice text.
    pub notice: Option<String>,
}

enum Wake {
    Snapshot(Option<Snapshot>),
    Toggle(ToggleResult),
    NoticeExpired,
}

/// Mirrors one collection and derives the filtered views shown to the user.
///
/// Writes are detached tasks: the caller never waits for them and failures are
/// only logged. The completion toggle is the exception; its confirmation comes
/// back through [`next_change`](Self::next_change) or [`settle`](Self::settle)
/// and is finished by [`finish_toggle`](Self::finish_toggle).
pub struct ViewSyncStore<S> {
    store: S,
    collection: String,
    state: ViewState,
    subscription: Option<Subscription>,
    subscribed: bool,
    writes: Vec<JoinHandle<()>>,
    toggle_tx: mpsc::UnboundedSender<ToggleResult>,
    toggle_rx: mpsc::UnboundedReceiver<ToggleResult>,
    pending_toggles: usize,
}

impl<S> ViewSyncStore<S> {
    /// Current task list, sorted by number.
    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    /// Current search query.
    pub fn search_query(&self) -> &str {
        &self.state.search_query
    }

    /// Contents of the add box.
    pub fn draft_text(&self) -> &str {
        &self.state.draft_text
    }

    /// Task open in the edit surface, if any.
    pub const fn editing_task(&self) -> Option<&Task> {
        self.state.editing_task.as_ref()
    }

    /// Whether the edit surface is open.
    pub const fn is_editing(&self) -> bool {
        self.state.editing_task.is_some()
    }

    /// Active validation notice; expired notices are never returned.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        let now = Instant::now();
        self.state
            .notice
            .as_ref()
            .filter(|notice| !notice.is_expired(now))
    }

    /// Tasks whose text contains the search query, ignoring case.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<&Task> {
        visible_tasks(&self.state.tasks, &self.state.search_query)
    }

    /// Completed tasks among [`visible_tasks`](Self::visible_tasks).
    #[must_use]
    pub fn visible_completed_tasks(&self) -> Vec<&Task> {
        visible_completed_tasks(&self.state.tasks, &self.state.search_query)
    }

    /// Snapshot of everything a renderer needs.
    #[must_use]
    pub fn view_model(&self) -> ViewModel {
        ViewModel {
            tasks: self.visible_tasks().into_iter().cloned().collect(),
            completed_tasks: self.visible_completed_tasks().into_iter().cloned().collect(),
            search_query: self.state.search_query.clone(),
            draft_text: self.state.draft_text.clone(),
            editing_task: self.state.editing_task.clone(),
            notice: self.notice().map(|notice| notice.message().to_owned()),
        }
    }

    /// Name of the mirrored collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether a subscription is live.
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Replace the search query; views follow on next read.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.state.search_query = query.into();
    }

    /// Replace the add-box contents.
    pub fn set_draft_text(&mut self, text: impl Into<String>) {
        self.state.draft_text = text.into();
    }

    /// Open the edit surface on a copy of `task`.
    pub fn begin_edit(&mut self, task: &Task) {
        self.state.editing_task = Some(task.clone());
    }

    /// Update the text in the edit surface. Ignored when nothing is being edited.
    pub fn update_edit_text(&mut self, text: impl Into<String>) {
        if let Some(task) = self.state.editing_task.as_mut() {
            task.text = text.into();
        }
    }

    /// Close the edit surface without writing.
    pub fn cancel_edit(&mut self) {
        self.state.editing_task = None;
    }

    /// Replace the list with a snapshot, sorted by number.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.state.tasks = snapshot.into_tasks();
        debug!(collection = %self.collection, count = self.state.tasks.len(), "Applied snapshot");
    }

    /// Drop the live subscription, releasing the listener.
    pub fn unsubscribe(&mut self) {
        if self.subscription.take().is_some() {
            debug!(collection = %self.collection, "Unsubscribed");
        }
    }
}

impl<S: RecordStore> ViewSyncStore<S> {
    /// Create a store mirroring `collection` of `store`. Call
    /// [`subscribe`](Self::subscribe) to start receiving snapshots.
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        let (toggle_tx, toggle_rx) = mpsc::unbounded_channel();
        Self {
            store,
            collection: collection.into(),
            state: ViewState::default(),
            subscription: None,
            subscribed: false,
            writes: Vec::new(),
            toggle_tx,
            toggle_rx,
            pending_toggles: 0,
        }
    }

    /// Start the standing subscription. Only the first call has an effect.
    ///
    /// # Errors
    /// Returns the store error when the listener cannot be established.
    pub fn subscribe(&mut self) -> Result<(), StoreError> {
        if self.subscribed {
            debug!(collection = %self.collection, "Already subscribed");
            return Ok(());
        }
        self.subscription = Some(self.store.subscribe(&self.collection)?);
        self.subscribed = true;
        Ok(())
    }

    /// Request creation of a task with the next display number.
    ///
    /// Blank text raises the validation notice and writes nothing. Otherwise the
    /// draft is cleared without waiting for the write.
    ///
    /// # Errors
    /// Returns [`TaskTextError::Blank`] when `text` trims to nothing.
    pub fn add_task(&mut self, text: &str) -> Result<u32, TaskTextError> {
        if let Err(err) = validate_text(text) {
            self.state.notice = Some(Notice::empty_task(Instant::now()));
            debug!(collection = %self.collection, "Rejected blank task");
            return Err(err);
        }
        let number = next_number(self.state.tasks.len());
        let record = TaskRecord::new(text, number);
        let store = self.store.clone();
        let collection = self.collection.clone();
        self.spawn_write("create", async move {
            let key = store.create_record(&collection, record).await?;
            debug!(%key, number, "Create acknowledged");
            Ok(())
        });
        self.state.draft_text.clear();
        info!(collection = %self.collection, number, "Requested task creation");
        Ok(number)
    }

    /// [`add_task`](Self::add_task) with the current draft.
    ///
    /// # Errors
    /// Returns [`TaskTextError::Blank`] when the draft trims to nothing.
    pub fn submit_draft(&mut self) -> Result<u32, TaskTextError> {
        let draft = self.state.draft_text.clone();
        self.add_task(&draft)
    }

    /// Request unconditional removal of a task. Unknown ids are fine.
    pub fn delete_task(&mut self, id: &TaskId) {
        self.spawn_delete(id);
        info!(collection = %self.collection, %id, "Requested task deletion");
    }

    /// Request a text-only update and close the edit surface, whatever the write does.
    pub fn commit_edit(&mut self, new_text: &str, id: &TaskId) {
        let store = self.store.clone();
        let collection = self.collection.clone();
        let key = id.clone();
        let patch = RecordPatch::text(new_text);
        self.spawn_write("update", async move {
            store.set_record_fields(&collection, &key, patch).await
        });
        self.state.editing_task = None;
        info!(collection = %self.collection, %id, "Requested task update");
    }

    /// Commit the task currently in the edit surface. Returns `false` when nothing
    /// is being edited.
    pub fn commit_editing(&mut self) -> bool {
        let Some(task) = self.state.editing_task.take() else {
            return false;
        };
        self.commit_edit(&task.text, &task.id);
        true
    }

    /// Request that `completed` flips from its in-memory value.
    ///
    /// The follow-up runs once the write confirms. Returns `false` when the task is
    /// not in the list, in which case nothing is written.
    pub fn toggle_complete(&mut self, id: &TaskId) -> bool {
        let Some(task) = self.state.find(id) else {
            warn!(collection = %self.collection, %id, "Cannot toggle a task that is not listed");
            return false;
        };
        let completed = !task.completed;
        let store = self.store.clone();
        let collection = self.collection.clone();
        let key = id.clone();
        let confirmations = self.toggle_tx.clone();
        self.pending_toggles += 1;
        self.track(tokio::spawn(async move {
            let written = store
                .set_record_fields(&collection, &key, RecordPatch::completed(completed))
                .await;
            let result = match written {
                Ok(()) => Ok(ToggleConfirmation { id: key, completed }),
                Err(source) => Err(ToggleFailure { id: key, source }),
            };
            if confirmations.send(result).is_err() {
                debug!("View store dropped before toggle confirmed");
            }
        }));
        info!(collection = %self.collection, %id, completed, "Requested completion toggle");
        true
    }

    /// Second step of a toggle: re-check the listed task and remove it if it is
    /// now completed.
    pub fn finish_toggle(&mut self, confirmation: ToggleConfirmation) -> ToggleOutcome {
        let ToggleConfirmation { id, completed } = confirmation;
        let Some(task) = self.state.tasks.iter_mut().find(|task| task.id == id) else {
            debug!(collection = %self.collection, %id, "Toggled task already left the list");
            return ToggleOutcome::Gone(id);
        };
        task.completed = completed;
        if !task.completed {
            return ToggleOutcome::Reopened(id);
        }
        self.spawn_delete(&id);
        self.state.tasks.retain(|task| task.id != id);
        info!(collection = %self.collection, %id, "Completed task removed");
        ToggleOutcome::Removed(id)
    }

    /// Wait for the next thing worth re-rendering for.
    ///
    /// Returns `None` when nothing can happen anymore: no subscription, no
    /// notice and no toggle in flight.
    pub async fn next_change(&mut self) -> Option<SyncEvent> {
        if self.subscription.is_none() && self.state.notice.is_none() && self.pending_toggles == 0 {
            return None;
        }
        let deadline = self.state.notice.as_ref().map(Notice::expires_at);
        let wake = tokio::select! {
            snapshot = next_snapshot(self.subscription.as_mut()) => Wake::Snapshot(snapshot),
            Some(result) = self.toggle_rx.recv() => Wake::Toggle(result),
            () = expire_at(deadline) => Wake::NoticeExpired,
        };
        let event = match wake {
            Wake::Snapshot(Some(snapshot)) => {
                self.apply_snapshot(snapshot);
                SyncEvent::TasksReplaced {
                    count: self.state.tasks.len(),
                }
            }
            Wake::Snapshot(None) => {
                warn!(collection = %self.collection, "Subscription closed by the store");
                self.subscription = None;
                SyncEvent::SubscriptionClosed
            }
            Wake::Toggle(result) => {
                self.pending_toggles = self.pending_toggles.saturating_sub(1);
                SyncEvent::ToggleFinished(self.resolve_toggle(result))
            }
            Wake::NoticeExpired => {
                self.state.notice = None;
                SyncEvent::NoticeCleared
            }
        };
        Some(event)
    }

    /// Drive every toggle in flight to its follow-up and wait for all detached
    /// writes, including the deletions those follow-ups issue.
    pub async fn settle(&mut self) -> Vec<ToggleOutcome> {
        let mut outcomes = Vec::new();
        loop {
            while let Ok(result) = self.toggle_rx.try_recv() {
                self.pending_toggles = self.pending_toggles.saturating_sub(1);
                outcomes.push(self.resolve_toggle(result));
            }
            if self.writes.is_empty() {
                break;
            }
            for handle in std::mem::take(&mut self.writes) {
                if let Err(err) = handle.await {
                    warn!(collection = %self.collection, error = %err, "Write task did not finish");
                }
            }
        }
        if self.pending_toggles > 0 {
            warn!(pending = self.pending_toggles, "Toggle confirmations were lost");
            self.pending_toggles = 0;
        }
        outcomes
    }

    /// Writes still running.
    pub fn pending_writes(&mut self) -> usize {
        self.writes.retain(|handle| !handle.is_finished());
        self.writes.len()
    }

    fn resolve_toggle(&mut self, result: ToggleResult) -> ToggleOutcome {
        match result {
            Ok(confirmation) => self.finish_toggle(confirmation),
            Err(failure) => {
                warn!(collection = %self.collection, error = %failure, "Dropped failed toggle");
                ToggleOutcome::Failed(failure.id)
            }
        }
    }

    fn spawn_delete(&mut self, id: &TaskId) {
        let store = self.store.clone();
        let collection = self.collection.clone();
        let key = id.clone();
        self.spawn_write("delete", async move {
            store.delete_record(&collection, &key).await
        });
    }

    fn spawn_write<F>(&mut self, action: &'static str, write: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let collection = self.collection.clone();
        self.track(tokio::spawn(async move {
            if let Err(err) = write.await {
                warn!(%collection, action, error = %err, "Dropped failed write");
            }
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.writes.retain(|write| !write.is_finished());
        self.writes.push(handle);
    }
}

async fn next_snapshot(subscription: Option<&mut Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(subscription) => subscription.next_snapshot().await,
        None => std::future::pending().await,
    }
}

async fn expire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;
    use task_organizer_store::MemoryStore;

    /// Memory store that can be told to reject writes and records what it saw.
    #[derive(Clone, Default)]
    struct MockStore {
        memory: MemoryStore,
        inner: Arc<MockStoreInner>,
    }

    #[derive(Default)]
    struct MockStoreInner {
        fail_writes: Mutex<bool>,
        patches: Mutex<Vec<(TaskId, RecordPatch)>>,
        deletes: Mutex<Vec<TaskId>>,
    }

    fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl MockStore {
        fn fail_writes(&self) {
            *guard(&self.inner.fail_writes) = true;
        }

        fn failing(&self) -> Result<(), StoreError> {
            if *guard(&self.inner.fail_writes) {
                return Err(StoreError::Status {
                    status: 401,
                    body: "Permission denied".into(),
                });
            }
            Ok(())
        }

        fn patches(&self) -> Vec<(TaskId, RecordPatch)> {
            guard(&self.inner.patches).clone()
        }

        fn deletes(&self) -> Vec<TaskId> {
            guard(&self.inner.deletes).clone()
        }
    }

    impl RecordStore for MockStore {
        async fn create_record(
            &self,
            collection: &str,
            record: TaskRecord,
        ) -> Result<TaskId, StoreError> {
            self.failing()?;
            self.memory.create_record(collection, record).await
        }

        async fn set_record_fields(
            &self,
            collection: &str,
            key: &TaskId,
            patch: RecordPatch,
        ) -> Result<(), StoreError> {
            guard(&self.inner.patches).push((key.clone(), patch.clone()));
            self.failing()?;
            self.memory.set_record_fields(collection, key, patch).await
        }

        async fn delete_record(&self, collection: &str, key: &TaskId) -> Result<(), StoreError> {
            guard(&self.inner.deletes).push(key.clone());
            self.failing()?;
            self.memory.delete_record(collection, key).await
        }

        fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
            self.memory.subscribe(collection)
        }
    }

    fn task(id: &str, number: u32, text: &str, completed: bool) -> Task {
        Task {
            id: TaskId::new(id),
            number,
            text: text.into(),
            completed,
        }
    }

    async fn seeded(texts: &[&str]) -> Result<(MockStore, ViewSyncStore<MockStore>), StoreError> {
        let store = MockStore::default();
        for (index, text) in texts.iter().enumerate() {
            store
                .memory
                .create_record("tasks", TaskRecord::new(*text, next_number(index)))
                .await?;
        }
        let mut view = ViewSyncStore::new(store.clone(), "tasks");
        view.subscribe()?;
        view.next_change().await;
        Ok((store, view))
    }

    #[tokio::test]
    async fn first_snapshot_fills_the_list_sorted_by_number() -> Result<(), StoreError> {
        let (_store, view) = seeded(&["one", "two", "three"]).await?;
        let numbers: Vec<u32> = view.tasks().iter().map(|task| task.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_runs_once() -> Result<(), StoreError> {
        let (_store, mut view) = seeded(&["one"]).await?;
        view.subscribe()?;
        assert!(view.is_subscribed());

        view.unsubscribe();
        view.subscribe()?;
        assert!(!view.is_subscribed());
        Ok(())
    }

    #[tokio::test]
    async fn add_task_numbers_after_current_count() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["one", "two"]).await?;
        view.set_draft_text("Buy milk");

        assert_eq!(view.submit_draft(), Ok(3));
        assert_eq!(view.draft_text(), "");
        view.settle().await;

        let tasks = store.memory.snapshot("tasks").into_tasks();
        let created = tasks
            .iter()
            .find(|task| task.text == "Buy milk")
            .unwrap_or_else(|| panic!("created task must be stored"));
        assert_eq!(created.number, 3);
        assert!(!created.completed);
        Ok(())
    }

    #[tokio::test]
    async fn add_task_does_not_wait_for_the_write() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&[]).await?;
        view.set_draft_text("Write report");
        assert!(view.submit_draft().is_ok());

        assert_eq!(view.draft_text(), "");
        assert!(store.memory.snapshot("tasks").is_absent());
        assert_eq!(view.pending_writes(), 1);

        view.settle().await;
        assert_eq!(store.memory.snapshot("tasks").len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn blank_task_raises_one_notice_and_writes_nothing() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&[]).await?;
        view.set_draft_text("  ");

        assert_eq!(view.submit_draft(), Err(TaskTextError::Blank));
        assert_eq!(view.draft_text(), "  ");
        assert_eq!(view.pending_writes(), 0);
        let notice = view
            .notice()
            .unwrap_or_else(|| panic!("blank task must raise a notice"));
        assert_eq!(notice.message(), "Please enter a task!");

        view.settle().await;
        assert!(store.memory.snapshot("tasks").is_absent());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn notice_clears_itself_after_two_seconds() {
        let mut view = ViewSyncStore::new(MockStore::default(), "tasks");
        let started = Instant::now();
        assert!(view.add_task("").is_err());

        assert_eq!(view.next_change().await, Some(SyncEvent::NoticeCleared));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(view.notice().is_none());
        assert_eq!(view.next_change().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_notice_is_hidden_before_the_pump_runs() {
        let mut view = ViewSyncStore::new(MockStore::default(), "tasks");
        assert!(view.add_task("\t").is_err());
        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert!(view.notice().is_none());
        assert!(view.view_model().notice.is_none());
    }

    #[tokio::test]
    async fn commit_edit_only_touches_text() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["draft"]).await?;
        let original = view.tasks()[0].clone();

        view.begin_edit(&original);
        view.update_edit_text("final");
        assert_eq!(view.editing_task().map(|task| task.text.as_str()), Some("final"));
        assert!(view.commit_editing());
        assert!(!view.is_editing());
        view.settle().await;

        assert_eq!(store.patches(), vec![(original.id.clone(), RecordPatch::text("final"))]);
        let stored = store.memory.snapshot("tasks").into_tasks();
        assert_eq!(stored[0].text, "final");
        assert_eq!(stored[0].number, original.number);
        assert_eq!(stored[0].completed, original.completed);
        Ok(())
    }

    #[tokio::test]
    async fn commit_edit_closes_editor_even_when_write_fails() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["draft"]).await?;
        let original = view.tasks()[0].clone();
        store.fail_writes();

        view.begin_edit(&original);
        view.commit_edit("", &original.id);
        assert!(view.editing_task().is_none());
        view.settle().await;

        assert_eq!(store.memory.snapshot("tasks").into_tasks()[0].text, "draft");
        Ok(())
    }

    #[tokio::test]
    async fn cancel_edit_writes_nothing() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["draft"]).await?;
        let original = view.tasks()[0].clone();

        view.begin_edit(&original);
        view.update_edit_text("changed");
        view.cancel_edit();
        view.settle().await;

        assert!(view.editing_task().is_none());
        assert!(store.patches().is_empty());
        assert!(!view.commit_editing());
        Ok(())
    }

    #[tokio::test]
    async fn deleting_unknown_id_leaves_list_unchanged() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["one", "two"]).await?;
        let before = view.tasks().to_vec();

        view.delete_task(&TaskId::new("missing"));
        view.settle().await;

        assert_eq!(store.deletes(), vec![TaskId::new("missing")]);
        assert_eq!(store.memory.snapshot("tasks").into_tasks(), before);
        assert_eq!(view.tasks(), before.as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn completing_a_task_removes_it_after_confirmation() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["one", "two"]).await?;
        let target = view.tasks()[0].id.clone();

        assert!(view.toggle_complete(&target));
        assert!(view.tasks().iter().any(|task| task.id == target));

        let outcomes = view.settle().await;
        assert_eq!(outcomes, vec![ToggleOutcome::Removed(target.clone())]);
        assert!(view.tasks().iter().all(|task| task.id != target));
        assert_eq!(store.patches(), vec![(target.clone(), RecordPatch::completed(true))]);
        assert_eq!(store.deletes(), vec![target]);
        assert_eq!(store.memory.snapshot("tasks").len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn reopening_a_completed_task_keeps_it() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["one"]).await?;
        let id = view.tasks()[0].id.clone();
        store
            .memory
            .set_record_fields("tasks", &id, RecordPatch::completed(true))
            .await?;
        view.next_change().await;
        assert_eq!(view.visible_completed_tasks().len(), 1);

        assert!(view.toggle_complete(&id));
        let outcomes = view.settle().await;

        assert_eq!(outcomes, vec![ToggleOutcome::Reopened(id)]);
        assert!(store.deletes().is_empty());
        assert!(view.visible_completed_tasks().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_toggle_write_is_dropped() -> Result<(), StoreError> {
        let (store, mut view) = seeded(&["one"]).await?;
        let id = view.tasks()[0].id.clone();
        store.fail_writes();

        assert!(view.toggle_complete(&id));
        let outcomes = view.settle().await;

        assert_eq!(outcomes, vec![ToggleOutcome::Failed(id)]);
        assert!(store.deletes().is_empty());
        assert_eq!(view.tasks().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn toggling_unknown_task_writes_nothing() {
        let store = MockStore::default();
        let mut view = ViewSyncStore::new(store.clone(), "tasks");
        assert!(!view.toggle_complete(&TaskId::new("missing")));
        assert!(view.settle().await.is_empty());
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn finish_toggle_for_vanished_task_is_a_no_op() {
        let store = MockStore::default();
        let mut view = ViewSyncStore::new(store.clone(), "tasks");
        let outcome = view.finish_toggle(ToggleConfirmation {
            id: TaskId::new("gone"),
            completed: true,
        });
        assert_eq!(outcome, ToggleOutcome::Gone(TaskId::new("gone")));
        view.settle().await;
        assert!(store.deletes().is_empty());
    }

    #[test]
    fn search_query_drives_both_views() {
        let store = MockStore::default();
        let mut view = ViewSyncStore::new(store, "tasks");
        let mut entries = std::collections::BTreeMap::new();
        for item in [
            task("a", 1, "Buy milk", false),
            task("b", 2, "Buy bread", true),
            task("c", 3, "Call plumber", false),
        ] {
            entries.insert(
                item.id.clone(),
                TaskRecord {
                    text: item.text,
                    completed: item.completed,
                    number: item.number,
                },
            );
        }
        view.apply_snapshot(Snapshot::from_entries(entries));

        view.set_search_query("buy");
        assert_eq!(view.search_query(), "buy");
        assert_eq!(view.visible_tasks().len(), 2);
        assert_eq!(view.visible_completed_tasks().len(), 1);

        view.set_search_query("");
        let model = view.view_model();
        assert_eq!(model.tasks.len(), 3);
        assert_eq!(model.completed_tasks, vec![task("b", 2, "Buy bread", true)]);

        view.apply_snapshot(Snapshot::absent());
        assert!(view.visible_tasks().is_empty());
    }
}
