use anyhow::{Context, Result, bail};
use task_organizer_app::{SyncEvent, ViewSyncStore};
use task_organizer_store::RecordStore;
use tracing::debug;

use crate::{Command, FIRST_SNAPSHOT_TIMEOUT};

mod handlers;

/// Run one command against a freshly subscribed view of `collection`.
pub async fn run<S: RecordStore>(command: Command, store: S, collection: &str) -> Result<()> {
    let mut view = ViewSyncStore::new(store, collection);
    view.subscribe()
        .with_context(|| format!("failed to subscribe to '{collection}'"))?;
    wait_for_first_snapshot(&mut view).await?;

    match command {
        Command::Add { text } => handlers::handle_add(&mut view, &text).await,
        Command::Ls { search, format } => handlers::handle_ls(&mut view, search, format),
        Command::Edit { task, text } => handlers::handle_edit(&mut view, &task, &text).await,
        Command::Rm { task } => handlers::handle_rm(&mut view, &task).await,
        Command::Done { task } => handlers::handle_done(&mut view, &task).await,
        Command::Watch { search } => handlers::handle_watch(&mut view, search).await,
        Command::Init { .. } => bail!("init does not need a store"),
    }
}

async fn wait_for_first_snapshot<S: RecordStore>(view: &mut ViewSyncStore<S>) -> Result<()> {
    let first = tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, view.next_change())
        .await
        .with_context(|| format!("timed out waiting for '{}'", view.collection()))?;
    match first {
        Some(SyncEvent::TasksReplaced { count }) => {
            debug!(count, "Loaded task list");
            Ok(())
        }
        Some(SyncEvent::SubscriptionClosed) | None => {
            bail!("store closed '{}' before sending it", view.collection())
        }
        Some(other) => {
            debug!(?other, "Unexpected first event");
            Ok(())
        }
    }
}
