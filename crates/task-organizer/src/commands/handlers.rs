use anyhow::{Result, anyhow, bail};
use task_organizer_app::{Notice, SyncEvent, ToggleOutcome, ViewSyncStore};
use task_organizer_core::TaskId;
use task_organizer_store::RecordStore;
use tracing::info;

use crate::ListFormat;
use crate::view::{TaskRef, render_text};

pub async fn handle_add<S: RecordStore>(view: &mut ViewSyncStore<S>, text: &str) -> Result<()> {
    view.set_draft_text(text);
    let submitted = view.submit_draft();
    view.settle().await;
    match submitted {
        Ok(number) => {
            println!("added task #{number}");
            Ok(())
        }
        Err(_) => {
            let message = view.notice().map_or("task text is blank", Notice::message);
            bail!("{message}")
        }
    }
}

pub fn handle_ls<S>(
    view: &mut ViewSyncStore<S>,
    search: Option<String>,
    format: ListFormat,
) -> Result<()> {
    view.set_search_query(search.unwrap_or_default());
    let model = view.view_model();
    match format {
        ListFormat::Text => print!("{}", render_text(&model)),
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&model)?),
    }
    Ok(())
}

pub async fn handle_edit<S: RecordStore>(
    view: &mut ViewSyncStore<S>,
    task: &TaskRef,
    text: &str,
) -> Result<()> {
    let target = task
        .resolve(view.tasks())
        .cloned()
        .ok_or_else(|| anyhow!("task {task} not found"))?;
    view.begin_edit(&target);
    view.update_edit_text(text);
    view.commit_editing();
    view.settle().await;
    println!("updated task #{}", target.number);
    Ok(())
}

pub async fn handle_rm<S: RecordStore>(view: &mut ViewSyncStore<S>, task: &TaskRef) -> Result<()> {
    let id = resolve_id(view, task)?;
    view.delete_task(&id);
    view.settle().await;
    println!("removed task {id}");
    Ok(())
}

pub async fn handle_done<S: RecordStore>(
    view: &mut ViewSyncStore<S>,
    task: &TaskRef,
) -> Result<()> {
    let id = resolve_id(view, task)?;
    if !view.toggle_complete(&id) {
        bail!("task {task} not found");
    }
    for outcome in view.settle().await {
        match outcome {
            ToggleOutcome::Removed(id) => println!("completed and removed task {id}"),
            ToggleOutcome::Reopened(id) => println!("reopened task {id}"),
            ToggleOutcome::Gone(id) => println!("task {id} left the list"),
            ToggleOutcome::Failed(id) => bail!("failed to toggle task {id}"),
        }
    }
    Ok(())
}

pub async fn handle_watch<S: RecordStore>(
    view: &mut ViewSyncStore<S>,
    search: Option<String>,
) -> Result<()> {
    view.set_search_query(search.unwrap_or_default());
    print!("{}", render_text(&view.view_model()));
    while let Some(event) = view.next_change().await {
        match event {
            SyncEvent::TasksReplaced { count } => {
                info!(count, "Task list changed");
                println!();
                print!("{}", render_text(&view.view_model()));
            }
            SyncEvent::SubscriptionClosed => break,
            SyncEvent::ToggleFinished(_) | SyncEvent::NoticeCleared => {}
        }
    }
    Ok(())
}

/// Key refs pass through unchecked so unknown ids can still be targeted.
fn resolve_id<S>(view: &ViewSyncStore<S>, task: &TaskRef) -> Result<TaskId> {
    match task {
        TaskRef::Key(id) => Ok(id.clone()),
        TaskRef::Number(_) => task
            .resolve(view.tasks())
            .map(|found| found.id.clone())
            .ok_or_else(|| anyhow!("task {task} not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_organizer_core::TaskRecord;
    use task_organizer_store::MemoryStore;

    async fn seeded(texts: &[&str]) -> Result<(MemoryStore, ViewSyncStore<MemoryStore>)> {
        let store = MemoryStore::new();
        for (index, text) in texts.iter().enumerate() {
            let number = u32::try_from(index + 1)?;
            store
                .create_record("tasks", TaskRecord::new(*text, number))
                .await?;
        }
        let mut view = ViewSyncStore::new(store.clone(), "tasks");
        view.subscribe()?;
        view.next_change().await;
        Ok((store, view))
    }

    #[tokio::test]
    async fn add_rejects_blank_text_with_the_notice() -> Result<()> {
        let (store, mut view) = seeded(&[]).await?;
        let Err(err) = handle_add(&mut view, "   ").await else {
            panic!("blank add should fail");
        };
        assert_eq!(err.to_string(), "Please enter a task!");
        assert!(store.snapshot("tasks").is_absent());
        Ok(())
    }

    #[tokio::test]
    async fn edit_by_number_rewrites_text() -> Result<()> {
        let (store, mut view) = seeded(&["one", "two"]).await?;
        handle_edit(&mut view, &TaskRef::Number(2), "second").await?;

        let tasks = store.snapshot("tasks").into_tasks();
        assert_eq!(tasks[1].text, "second");
        assert_eq!(tasks[1].number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn edit_unknown_number_fails() -> Result<()> {
        let (_store, mut view) = seeded(&["one"]).await?;
        let Err(err) = handle_edit(&mut view, &TaskRef::Number(7), "x").await else {
            panic!("unknown task should fail");
        };
        assert_eq!(err.to_string(), "task #7 not found");
        Ok(())
    }

    #[tokio::test]
    async fn rm_accepts_unknown_keys() -> Result<()> {
        let (store, mut view) = seeded(&["one"]).await?;
        handle_rm(&mut view, &TaskRef::Key(TaskId::new("missing"))).await?;
        assert_eq!(store.snapshot("tasks").len(), 1);

        handle_rm(&mut view, &TaskRef::Number(1)).await?;
        assert!(store.snapshot("tasks").is_absent());
        Ok(())
    }

    #[tokio::test]
    async fn done_removes_the_task() -> Result<()> {
        let (store, mut view) = seeded(&["one", "two"]).await?;
        handle_done(&mut view, &TaskRef::Number(1)).await?;

        let remaining = store.snapshot("tasks").into_tasks();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text, "two");
        assert!(handle_done(&mut view, &TaskRef::Number(1)).await.is_err());
        Ok(())
    }
}
