//! Slug derivation

use regex::Regex;
use std::sync::LazyLock;

use crate::model::Localized;
use crate::policy::{FieldPolicy, ValidationError};

/// Anything that is not a letter, combining mark or digit
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{M}\p{N}]+").expect("Valid regex"));

/// Lowercase, map every separator run to a single `-`, trim the ends
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    SEPARATORS
        .split(&lowered)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Derives the slug of a new tag from its default-locale name.
///
/// Collisions are not suffixed; the store's unique constraint decides.
#[derive(Debug, Clone)]
pub struct SlugAssigner {
    default_locale: String,
    policy: FieldPolicy,
}

impl SlugAssigner {
    pub fn new(default_locale: impl Into<String>, policy: FieldPolicy) -> Self {
        Self {
            default_locale: default_locale.into(),
            policy,
        }
    }

    /// Slug for a name map, using the first locale present when the default is missing
    pub fn assign(&self, name: &Localized) -> Result<String, ValidationError> {
        let source = name
            .get(&self.default_locale)
            .or_else(|| name.values().next())
            .ok_or_else(|| ValidationError::new("name", "at least one locale is required"))?;

        let slug = slugify(source);
        self.policy.validate_slug(&slug)?;
        Ok(slug)
    }

    /// Normalize a caller-supplied slug
    pub fn normalize(&self, slug: &str) -> Result<String, ValidationError> {
        let slug = slugify(slug);
        self.policy.validate_slug(&slug)?;
        Ok(slug)
    }
}

/// Normalize a group to slug form; blank groups become `None`
pub fn normalize_group(group: Option<&str>) -> Option<String> {
    group.map(slugify).filter(|g| !g.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner() -> SlugAssigner {
        SlugAssigner::new("en", FieldPolicy::default())
    }

    fn names(pairs: &[(&str, &str)]) -> Localized {
        pairs
            .iter()
            .map(|(l, v)| (l.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("  --Rust  &  Go--  "), "rust-go");
        assert_eq!(slugify("snake_case_name"), "snake-case-name");
        assert_eq!(slugify("Café Crème"), "café-crème");
    }

    #[test]
    fn test_slugify_keeps_combining_marks() {
        assert_eq!(slugify("हिन्दी"), "हिन्दी");
        assert_eq!(slugify("தமிழ் மொழி"), "தமிழ்-மொழி");
    }

    #[test]
    fn test_assign_accepts_indic_names() {
        let slug = SlugAssigner::new("hi", FieldPolicy::default())
            .assign(&names(&[("hi", "हिन्दी")]))
            .unwrap();
        assert_eq!(slug, "हिन्दी");
    }

    #[test]
    fn test_slugify_of_punctuation_is_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_assign_prefers_default_locale() {
        let slug = assigner()
            .assign(&names(&[("de", "Hallo Welt"), ("en", "Hello World!")]))
            .unwrap();
        assert_eq!(slug, "hello-world");
    }

    #[test]
    fn test_assign_falls_back_to_first_locale() {
        let slug = assigner().assign(&names(&[("fr", "Bonjour")])).unwrap();
        assert_eq!(slug, "bonjour");
    }

    #[test]
    fn test_assign_rejects_unsluggable_names() {
        let err = assigner().assign(&names(&[("en", "???")])).unwrap_err();
        assert_eq!(err.field, "slug");
    }

    #[test]
    fn test_normalize_group() {
        assert_eq!(
            normalize_group(Some("Programming Languages")).as_deref(),
            Some("programming-languages")
        );
        assert_eq!(normalize_group(Some("  ")), None);
        assert_eq!(normalize_group(None), None);
    }
}
