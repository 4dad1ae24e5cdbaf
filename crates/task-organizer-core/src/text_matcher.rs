use crate::Task;

/// Case-insensitive substring matcher for task text.
///
/// Unlike a filter bar, a blank query is not special: the empty string is a
/// substring of every text, so it matches everything.
#[derive(Debug, Clone, Default)]
pub struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    /// Build a matcher for the raw search query.
    pub fn new(query: &str) -> Self {
        Self {
            needle: query.to_lowercase(),
        }
    }

    /// True when the query is empty and every task matches.
    pub const fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Determine whether the task text contains the query.
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_text(&task.text)
    }

    /// Determine whether `value` contains the query, ignoring case.
    pub fn matches_text(&self, value: &str) -> bool {
        self.is_empty() || value.to_lowercase().contains(&self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskId;

    fn task(text: &str) -> Task {
        Task {
            id: TaskId::generate(),
            number: 1,
            text: text.into(),
            completed: false,
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let matcher = TextMatcher::new("");
        assert!(matcher.is_empty());
        assert!(matcher.matches(&task("Buy milk")));
        assert!(matcher.matches(&task("")));
    }

    #[test]
    fn whitespace_query_is_taken_literally() {
        let matcher = TextMatcher::new(" ");
        assert!(matcher.matches(&task("Buy milk")));
        assert!(!matcher.matches(&task("milk")));
    }

    #[test]
    fn matcher_ignores_case_on_both_sides() {
        let item = task("Write Quarterly REPORT");

        assert!(TextMatcher::new("report").matches(&item));
        assert!(TextMatcher::new("QUARTERLY").matches(&item));
        assert!(TextMatcher::new("te qu").matches(&item));
        assert!(!TextMatcher::new("reports").matches(&item));
    }

    #[test]
    fn matcher_lowercases_non_ascii_text() {
        let item = task("Überweisung prüfen");
        assert!(TextMatcher::new("ÜBERWEISUNG").matches(&item));
        assert!(TextMatcher::new("PRÜFEN").matches(&item));
    }
}
