//! Field constraints for tag writes

use regex::Regex;

use crate::model::Localized;

/// Constraint limits applied before anything reaches the store
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub max_slug_length: usize,
    pub max_name_length: usize,
    pub max_description_length: usize,
    pub max_group_length: usize,
    pub max_sort_order: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_slug_length: 150,
            max_name_length: 150,
            max_description_length: 10_000,
            max_group_length: 150,
            max_sort_order: 10_000_000,
        }
    }
}

/// Validator for tag fields
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    config: PolicyConfig,
    slug_pattern: Regex,
    locale_pattern: Regex,
}

impl FieldPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            slug_pattern: Regex::new(r"^[\p{L}\p{M}\p{N}_-]+$").expect("Valid regex"),
            locale_pattern: Regex::new(r"^[A-Za-z]{2,3}([_-][A-Za-z0-9]{2,8})*$")
                .expect("Valid regex"),
        }
    }

    pub fn validate_slug(&self, slug: &str) -> Result<(), ValidationError> {
        if slug.is_empty() {
            return Err(ValidationError::new("slug", "must not be empty"));
        }
        if slug.chars().count() > self.config.max_slug_length {
            return Err(ValidationError::too_long("slug", self.config.max_slug_length));
        }
        if !self.slug_pattern.is_match(slug) {
            return Err(ValidationError::new(
                "slug",
                format!("'{}' may only contain letters, marks, digits, dashes and underscores", slug),
            ));
        }
        Ok(())
    }

    pub fn validate_locale(&self, locale: &str) -> Result<(), ValidationError> {
        if !self.locale_pattern.is_match(locale) {
            return Err(ValidationError::new(
                "locale",
                format!("'{}' is not a locale code", locale),
            ));
        }
        Ok(())
    }

    /// Check a localized name map: non-empty, valid locales, bounded values
    pub fn validate_name(&self, name: &Localized) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::new("name", "at least one locale is required"));
        }
        for (locale, value) in name {
            self.validate_locale(locale)?;
            if value.trim().is_empty() {
                return Err(ValidationError::new(
                    "name",
                    format!("value for locale '{}' must not be empty", locale),
                ));
            }
            if value.chars().count() > self.config.max_name_length {
                return Err(ValidationError::too_long("name", self.config.max_name_length));
            }
        }
        Ok(())
    }

    pub fn validate_description(&self, description: &Localized) -> Result<(), ValidationError> {
        for (locale, value) in description {
            self.validate_locale(locale)?;
            if value.chars().count() > self.config.max_description_length {
                return Err(ValidationError::too_long(
                    "description",
                    self.config.max_description_length,
                ));
            }
        }
        Ok(())
    }

    /// Check an already slug-normalized group
    pub fn validate_group(&self, group: &str) -> Result<(), ValidationError> {
        if group.chars().count() > self.config.max_group_length {
            return Err(ValidationError::too_long("group", self.config.max_group_length));
        }
        Ok(())
    }

    pub fn validate_sort_order(&self, sort_order: i64) -> Result<(), ValidationError> {
        if !(0..=self.config.max_sort_order).contains(&sort_order) {
            return Err(ValidationError::new(
                "sort_order",
                format!("must be between 0 and {}", self.config.max_sort_order),
            ));
        }
        Ok(())
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

/// A field that failed its constraints
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    fn too_long(field: &'static str, max: usize) -> Self {
        Self::new(field, format!("must be at most {} characters", max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(&str, &str)]) -> Localized {
        pairs
            .iter()
            .map(|(l, v)| (l.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_slug_rejects_punctuation() {
        let policy = FieldPolicy::default();
        assert!(policy.validate_slug("hello-world_2").is_ok());
        assert!(policy.validate_slug("grüße").is_ok());
        assert!(policy.validate_slug("हिन्दी").is_ok());
        let err = policy.validate_slug("hello world!").unwrap_err();
        assert_eq!(err.field, "slug");
    }

    #[test]
    fn test_slug_length_limit() {
        let policy = FieldPolicy::new(PolicyConfig {
            max_slug_length: 5,
            ..Default::default()
        });
        assert!(policy.validate_slug("abcde").is_ok());
        assert!(policy.validate_slug("abcdef").is_err());
    }

    #[test]
    fn test_name_requires_a_locale() {
        let policy = FieldPolicy::default();
        assert!(policy.validate_name(&Localized::new()).is_err());
        assert!(policy.validate_name(&names(&[("en", "Rust")])).is_ok());
    }

    #[test]
    fn test_name_rejects_blank_and_oversized_values() {
        let policy = FieldPolicy::default();
        assert!(policy.validate_name(&names(&[("en", "   ")])).is_err());

        let long = "x".repeat(151);
        let err = policy.validate_name(&names(&[("en", &long)])).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_locale_codes() {
        let policy = FieldPolicy::default();
        assert!(policy.validate_locale("en").is_ok());
        assert!(policy.validate_locale("pt_BR").is_ok());
        assert!(policy.validate_locale("zh-Hant").is_ok());
        assert!(policy.validate_locale("en\"").is_err());
        assert!(policy.validate_locale("").is_err());
    }

    #[test]
    fn test_sort_order_bounds() {
        let policy = FieldPolicy::default();
        assert!(policy.validate_sort_order(0).is_ok());
        assert!(policy.validate_sort_order(10_000_000).is_ok());
        assert!(policy.validate_sort_order(-1).is_err());
        assert!(policy.validate_sort_order(10_000_001).is_err());
    }
}
