//! Subject type registry
//!
//! Maps the type names callers use (`post`, `article`) to the discriminator
//! stored in the association table (`posts`, `blog_articles`).

use std::collections::BTreeMap;

use crate::error::TagError;
use crate::model::SubjectRef;

#[derive(Debug, Clone, Default)]
pub struct SubjectRegistry {
    types: BTreeMap<String, String>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(types: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    pub fn register(
        mut self,
        type_name: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        self.types.insert(type_name.into(), discriminator.into());
        self
    }

    /// Stored discriminator for a type name
    pub fn discriminator(&self, type_name: &str) -> Result<&str, TagError> {
        self.types
            .get(type_name)
            .map(String::as_str)
            .ok_or_else(|| TagError::UnknownSubjectType(type_name.to_string()))
    }

    /// Build a subject reference for a registered type
    pub fn subject(
        &self,
        type_name: &str,
        subject_id: impl Into<String>,
    ) -> Result<SubjectRef, TagError> {
        let discriminator = self.discriminator(type_name)?;
        Ok(SubjectRef::new(discriminator, subject_id))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_type_maps_to_discriminator() {
        let registry = SubjectRegistry::new().register("post", "blog_posts");
        let subject = registry.subject("post", "42").unwrap();
        assert_eq!(subject, SubjectRef::new("blog_posts", "42"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let registry = SubjectRegistry::new();
        assert!(matches!(
            registry.subject("post", "1"),
            Err(TagError::UnknownSubjectType(name)) if name == "post"
        ));
    }
}
