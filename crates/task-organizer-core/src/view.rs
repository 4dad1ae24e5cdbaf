//! Pure view derivation over the synced task list.
//!
//! Views are recomputed on every call; nothing here caches.

use crate::Task;
use crate::text_matcher::TextMatcher;

/// Every task whose text contains `query`, ignoring case, in list order.
pub fn visible_tasks<'a>(tasks: &'a [Task], query: &str) -> Vec<&'a Task> {
    let matcher = TextMatcher::new(query);
    tasks.iter().filter(|task| matcher.matches(task)).collect()
}

/// The completed subset of [`visible_tasks`].
pub fn visible_completed_tasks<'a>(tasks: &'a [Task], query: &str) -> Vec<&'a Task> {
    visible_tasks(tasks, query)
        .into_iter()
        .filter(|task| task.completed)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskId;

    fn sample() -> Vec<Task> {
        vec![
            Task {
                id: TaskId::new("a"),
                number: 1,
                text: "Buy milk".into(),
                completed: false,
            },
            Task {
                id: TaskId::new("b"),
                number: 2,
                text: "Buy bread".into(),
                completed: true,
            },
            Task {
                id: TaskId::new("c"),
                number: 3,
                text: "Call plumber".into(),
                completed: true,
            },
        ]
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.id.to_string()).collect()
    }

    #[test]
    fn empty_query_shows_all_tasks() {
        let tasks = sample();
        assert_eq!(ids(&visible_tasks(&tasks, "")), vec!["a", "b", "c"]);
        assert_eq!(ids(&visible_completed_tasks(&tasks, "")), vec!["b", "c"]);
    }

    #[test]
    fn query_filters_both_views() {
        let tasks = sample();
        assert_eq!(ids(&visible_tasks(&tasks, "BUY")), vec!["a", "b"]);
        assert_eq!(ids(&visible_completed_tasks(&tasks, "BUY")), vec!["b"]);
        assert!(visible_tasks(&tasks, "dentist").is_empty());
    }

    #[test]
    fn completed_view_is_a_subset_of_visible_view() {
        let tasks = sample();
        for query in ["", "b", "BU", "plumber", "zzz", " "] {
            let visible = visible_tasks(&tasks, query);
            let completed = visible_completed_tasks(&tasks, query);
            for task in &completed {
                assert!(task.completed);
                assert!(visible.iter().any(|candidate| candidate.id == task.id));
            }
        }
    }

    #[test]
    fn membership_matches_lowercase_substring() {
        let tasks = sample();
        for query in ["", "Milk", "bREAD", "ll", "x", "buy "] {
            let visible = visible_tasks(&tasks, query);
            for task in &tasks {
                let expected = task.text.to_lowercase().contains(&query.to_lowercase());
                let present = visible.iter().any(|candidate| candidate.id == task.id);
                assert_eq!(present, expected, "query {query:?} task {:?}", task.text);
            }
        }
    }
}
