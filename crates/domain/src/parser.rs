//! Tag reference parsing
//!
//! Callers hand tags over in many shapes: a delimited string, a bare name, a
//! numeric id, a tag they already hold, or a list of any of those. Everything
//! is normalized here into typed [`TagRef`]s before the rest of the engine sees it.

use std::collections::HashSet;

use crate::model::{Tag, TagId};

/// A single typed reference to a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRef {
    Name(String),
    Id(TagId),
}

/// Raw tag input as accepted at the engine boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInput {
    /// A numeric id
    Id(TagId),
    /// A name, a numeric-looking id, or a delimited list when top-level
    Text(String),
    /// A tag record the caller already holds
    Handle(TagId),
    /// A sequence; elements are never split on the delimiter
    List(Vec<TagInput>),
}

impl TagInput {
    /// An empty reference list
    pub fn none() -> Self {
        TagInput::List(Vec::new())
    }
}

impl From<TagId> for TagInput {
    fn from(id: TagId) -> Self {
        TagInput::Id(id)
    }
}

impl From<i64> for TagInput {
    fn from(id: i64) -> Self {
        TagInput::Id(TagId(id))
    }
}

impl From<&str> for TagInput {
    fn from(text: &str) -> Self {
        TagInput::Text(text.to_string())
    }
}

impl From<String> for TagInput {
    fn from(text: String) -> Self {
        TagInput::Text(text)
    }
}

impl From<&String> for TagInput {
    fn from(text: &String) -> Self {
        TagInput::Text(text.clone())
    }
}

impl From<&Tag> for TagInput {
    fn from(tag: &Tag) -> Self {
        TagInput::Handle(tag.id)
    }
}

impl From<Tag> for TagInput {
    fn from(tag: Tag) -> Self {
        TagInput::Handle(tag.id)
    }
}

impl<T: Into<TagInput>> From<Vec<T>> for TagInput {
    fn from(items: Vec<T>) -> Self {
        TagInput::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TagInput>, const N: usize> From<[T; N]> for TagInput {
    fn from(items: [T; N]) -> Self {
        TagInput::List(items.into_iter().map(Into::into).collect())
    }
}

/// Parsed references, split into names and ids, each deduplicated in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRefs {
    pub names: Vec<String>,
    pub ids: Vec<TagId>,
}

impl ParsedRefs {
    pub fn from_refs(refs: impl IntoIterator<Item = TagRef>) -> Self {
        let mut parsed = ParsedRefs::default();
        let mut seen_names = HashSet::new();
        let mut seen_ids = HashSet::new();

        for tag_ref in refs {
            match tag_ref {
                TagRef::Name(name) => {
                    if seen_names.insert(name.clone()) {
                        parsed.names.push(name);
                    }
                }
                TagRef::Id(id) => {
                    if seen_ids.insert(id) {
                        parsed.ids.push(id);
                    }
                }
            }
        }

        parsed
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.ids.len()
    }

    /// Ids first, then names
    pub fn refs(&self) -> impl Iterator<Item = TagRef> + '_ {
        self.ids
            .iter()
            .map(|id| TagRef::Id(*id))
            .chain(self.names.iter().cloned().map(TagRef::Name))
    }
}

/// Normalizes [`TagInput`] into [`ParsedRefs`]
#[derive(Debug, Clone)]
pub struct TagRefParser {
    delimiter: String,
}

impl TagRefParser {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Parse with this parser's delimiter
    pub fn parse(&self, input: &TagInput) -> ParsedRefs {
        let mut refs = Vec::new();
        match input {
            TagInput::Text(text) => {
                refs.extend(self.split(text).filter_map(classify));
            }
            other => flatten(other, &mut refs),
        }
        ParsedRefs::from_refs(refs)
    }

    /// Parse with a one-off delimiter
    pub fn parse_with(&self, input: &TagInput, delimiter: &str) -> ParsedRefs {
        TagRefParser::new(delimiter).parse(input)
    }

    fn split<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        if self.delimiter.is_empty() {
            Box::new(std::iter::once(text))
        } else {
            Box::new(text.split(self.delimiter.as_str()))
        }
    }
}

impl Default for TagRefParser {
    fn default() -> Self {
        Self::new(",")
    }
}

fn flatten(input: &TagInput, refs: &mut Vec<TagRef>) {
    match input {
        TagInput::Id(id) | TagInput::Handle(id) => refs.push(TagRef::Id(*id)),
        TagInput::Text(text) => refs.extend(classify(text)),
        TagInput::List(items) => {
            for item in items {
                flatten(item, refs);
            }
        }
    }
}

/// Trim, drop empties, and treat integer-looking text as an id
fn classify(raw: &str) -> Option<TagRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(id) => Some(TagRef::Id(TagId(id))),
        Err(_) => Some(TagRef::Name(trimmed.to_string())),
    }
}
