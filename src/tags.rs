//! Tag utilities (C2) — free functions over [`crate::model::Tag`].

use crate::model::Tag;

/// True iff at least one pattern matches at least one item tag.
pub fn tags_match_any(item_tags: &[Tag], pattern_tags: &[Tag]) -> bool {
    pattern_tags
        .iter()
        .any(|pattern| item_tags.iter().any(|item| pattern.matches(item)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patterns_never_match() {
        assert!(!tags_match_any(&[Tag::new("lane")], &[]));
    }

    #[test]
    fn test_empty_item_tags_never_match() {
        assert!(!tags_match_any(&[], &[Tag::new("lane")]));
    }

    #[test]
    fn test_matches_on_key_only_pattern() {
        let items = vec![Tag::with_value("lane", "task")];
        let patterns = vec![Tag::new("lane")];
        assert!(tags_match_any(&items, &patterns));
    }

    #[test]
    fn test_matches_on_key_and_value() {
        let items = vec![Tag::with_value("lane", "legal")];
        let patterns = vec![Tag::with_value("lane", "task")];
        assert!(!tags_match_any(&items, &patterns));

        let patterns2 = vec![Tag::with_value("lane", "legal")];
        assert!(tags_match_any(&items, &patterns2));
    }

    #[test]
    fn test_any_pattern_matching_any_item_is_enough() {
        let items = vec![Tag::new("other"), Tag::with_value("lane", "task")];
        let patterns = vec![Tag::with_value("lane", "task"), Tag::new("unused")];
        assert!(tags_match_any(&items, &patterns));
    }
}
