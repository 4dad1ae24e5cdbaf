//! Plain-text rendering and task references for the CLI.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use task_organizer_app::ViewModel;
use task_organizer_core::{Task, TaskId};
use thiserror::Error;

/// How a command names a task: by record key or by `#N` display number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskRef {
    Key(TaskId),
    Number(u32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskRefError {
    #[error("task reference must not be empty")]
    Empty,
    #[error("'{0}' is not a display number; use #N or a record key")]
    BadNumber(String),
}

impl FromStr for TaskRef {
    type Err = TaskRefError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TaskRefError::Empty);
        }
        match raw.strip_prefix('#') {
            Some(digits) => digits
                .parse()
                .map(Self::Number)
                .map_err(|_| TaskRefError::BadNumber(raw.to_owned())),
            None => Ok(Self::Key(TaskId::new(raw))),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(id) => write!(f, "{id}"),
            Self::Number(number) => write!(f, "#{number}"),
        }
    }
}

impl TaskRef {
    /// First listed task this reference points at.
    pub fn resolve<'a>(&self, tasks: &'a [Task]) -> Option<&'a Task> {
        tasks.iter().find(|task| match self {
            Self::Key(id) => &task.id == id,
            Self::Number(number) => task.number == *number,
        })
    }
}

fn render_row(task: &Task) -> String {
    format!("{}. {}  [{}]", task.number, task.text, task.id)
}

/// Both sections of the list as printed by `ls` and `watch`.
pub fn render_text(model: &ViewModel) -> String {
    let mut out = String::new();
    render_section(&mut out, "Tasks", &model.tasks);
    out.push('\n');
    render_section(&mut out, "Completed Tasks", &model.completed_tasks);
    out
}

fn render_section(out: &mut String, title: &str, tasks: &[Task]) {
    let _ = writeln!(out, "{title}");
    if tasks.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for task in tasks {
        let _ = writeln!(out, "{}", render_row(task));
    }
}
