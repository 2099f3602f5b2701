//! Subject query predicates

use serde::Serialize;
use std::collections::HashSet;

use crate::model::{MatchMode, Tag, TagId};
use crate::usecases::Resolution;

/// Filter over a subject's associations, evaluated by the store's query layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScopePredicate {
    /// An association exists for every id, each checked independently
    All {
        tag_ids: Vec<TagId>,
        group: Option<String>,
    },
    /// An association exists for at least one id
    Any {
        tag_ids: Vec<TagId>,
        group: Option<String>,
    },
    /// No association exists for any id
    None {
        tag_ids: Vec<TagId>,
        group: Option<String>,
    },
    /// The subject has no associations at all
    WithoutAny,
    /// Matches no subject
    Nothing,
}

impl ScopePredicate {
    /// Build a predicate from a read-only resolution.
    ///
    /// `All` with an unresolved name or an empty resolved set matches nothing.
    pub fn build(mode: MatchMode, resolution: &Resolution, group: Option<String>) -> Self {
        let tag_ids = resolution.ids.clone();
        match mode {
            MatchMode::All if !resolution.unresolved.is_empty() || tag_ids.is_empty() => {
                ScopePredicate::Nothing
            }
            MatchMode::All => ScopePredicate::All { tag_ids, group },
            MatchMode::Any if tag_ids.is_empty() => ScopePredicate::Nothing,
            MatchMode::Any => ScopePredicate::Any { tag_ids, group },
            MatchMode::None => ScopePredicate::None { tag_ids, group },
            MatchMode::WithoutAny => ScopePredicate::WithoutAny,
        }
    }

    /// Evaluate against the live tags currently attached to one subject
    pub fn matches(&self, subject_tags: &[Tag]) -> bool {
        let held = |group: &Option<String>| -> HashSet<TagId> {
            subject_tags
                .iter()
                .filter(|tag| tag.in_group(group.as_deref()))
                .map(|tag| tag.id)
                .collect()
        };

        match self {
            ScopePredicate::All { tag_ids, group } => {
                let held = held(group);
                !tag_ids.is_empty() && tag_ids.iter().all(|id| held.contains(id))
            }
            ScopePredicate::Any { tag_ids, group } => {
                let held = held(group);
                tag_ids.iter().any(|id| held.contains(id))
            }
            ScopePredicate::None { tag_ids, group } => {
                let held = held(group);
                !tag_ids.iter().any(|id| held.contains(id))
            }
            ScopePredicate::WithoutAny => subject_tags.is_empty(),
            ScopePredicate::Nothing => false,
        }
    }

    /// Whether the predicate can be answered without consulting the store
    pub fn is_nothing(&self) -> bool {
        matches!(self, ScopePredicate::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn tag(id: i64, group: Option<&str>) -> Tag {
        Tag {
            id: TagId(id),
            slug: format!("t{}", id),
            name: [("en".to_string(), format!("t{}", id))].into_iter().collect(),
            description: None,
            group: group.map(str::to_string),
            sort_order: id,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            deleted_at: None,
        }
    }

    fn resolved(ids: &[i64], unresolved: &[&str]) -> Resolution {
        Resolution {
            ids: ids.iter().copied().map(TagId).collect(),
            created: vec![],
            unresolved: unresolved.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_all_requires_every_tag() {
        let predicate = ScopePredicate::build(MatchMode::All, &resolved(&[1, 2], &[]), None);
        assert!(predicate.matches(&[tag(1, None), tag(2, None), tag(3, None)]));
        assert!(!predicate.matches(&[tag(1, None)]));
    }

    #[test]
    fn test_all_with_unresolved_name_matches_nothing() {
        let predicate =
            ScopePredicate::build(MatchMode::All, &resolved(&[1], &["nonexistent"]), None);
        assert_eq!(predicate, ScopePredicate::Nothing);
        assert!(!predicate.matches(&[tag(1, None)]));
    }

    #[test]
    fn test_all_with_empty_set_matches_nothing() {
        let predicate = ScopePredicate::build(MatchMode::All, &resolved(&[], &[]), None);
        assert!(predicate.is_nothing());
    }

    #[test]
    fn test_any_and_none_are_complements() {
        let any = ScopePredicate::build(MatchMode::Any, &resolved(&[1, 5], &[]), None);
        let none = ScopePredicate::build(MatchMode::None, &resolved(&[1, 5], &[]), None);

        for tags in [vec![tag(1, None)], vec![tag(2, None)], vec![]] {
            assert_ne!(any.matches(&tags), none.matches(&tags));
        }
    }

    #[test]
    fn test_none_with_empty_set_matches_everything() {
        let none = ScopePredicate::build(MatchMode::None, &resolved(&[], &["ghost"]), None);
        assert!(none.matches(&[tag(1, None)]));
        assert!(none.matches(&[]));
    }

    #[test]
    fn test_group_narrows_tag_side() {
        let predicate = ScopePredicate::build(
            MatchMode::Any,
            &resolved(&[1], &[]),
            Some("colors".to_string()),
        );
        assert!(predicate.matches(&[tag(1, Some("colors"))]));
        assert!(!predicate.matches(&[tag(1, Some("flags"))]));
    }

    #[test]
    fn test_without_any_ignores_references() {
        let predicate = ScopePredicate::build(MatchMode::WithoutAny, &resolved(&[1], &[]), None);
        assert!(predicate.matches(&[]));
        assert!(!predicate.matches(&[tag(2, None)]));
    }
}
