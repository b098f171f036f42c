//! The authoritative tag set and the delta between two sets.

use std::collections::HashSet;
use tagbridge_model::Tag;

/// Tags currently associated with the host record, unique by key.
///
/// Order is kept as given (first occurrence wins on duplicates) so the
/// encoded output lists keys the way the user arranged them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    tags: Vec<Tag>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .filter(|tag| seen.insert(tag.key.clone()))
            .collect();
        Self { tags }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn into_tags(self) -> Vec<Tag> {
        self.tags
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Same key set, ignoring order.
    pub fn same_keys(&self, other: &SelectionState) -> bool {
        let mine: HashSet<&str> = self.keys().collect();
        let theirs: HashSet<&str> = other.keys().collect();
        mine == theirs
    }
}

/// Minimal changes turning one selection into another.
///
/// Additions and removals are disjoint by key: a key is either in the
/// desired set or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub additions: Vec<Tag>,
    pub removals: Vec<Tag>,
}

impl SelectionDiff {
    pub fn between(current: &SelectionState, desired: &SelectionState) -> Self {
        let current_keys: HashSet<&str> = current.keys().collect();
        let desired_keys: HashSet<&str> = desired.keys().collect();

        let additions = desired
            .tags()
            .iter()
            .filter(|t| !current_keys.contains(t.key.as_str()))
            .cloned()
            .collect();
        let removals = current
            .tags()
            .iter()
            .filter(|t| !desired_keys.contains(t.key.as_str()))
            .cloned()
            .collect();

        Self {
            additions,
            removals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(keys: &[&str]) -> SelectionState {
        SelectionState::from_tags(keys.iter().map(|k| Tag::new(*k, k.to_uppercase())))
    }

    fn keys(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.key.as_str()).collect()
    }

    #[test]
    fn test_diff_one_in_one_out() {
        let diff = SelectionDiff::between(&state(&["A", "B", "C"]), &state(&["B", "C", "D"]));
        assert_eq!(keys(&diff.additions), vec!["D"]);
        assert_eq!(keys(&diff.removals), vec!["A"]);
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let diff = SelectionDiff::between(&state(&["A", "B"]), &state(&["B", "A"]));
        assert!(diff.is_empty());
        assert!(state(&["A", "B"]).same_keys(&state(&["B", "A"])));
    }

    #[test]
    fn test_duplicates_collapse_to_first() {
        let selection = SelectionState::from_tags(vec![
            Tag::new("a", "first"),
            Tag::new("b", "b"),
            Tag::new("a", "second"),
        ]);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.tags()[0].name, "first");
    }
}
