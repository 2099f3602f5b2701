//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Locale code -> display string
pub type Localized = BTreeMap<String, String>;

/// Store-assigned tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TagId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(TagId)
    }
}

impl From<i64> for TagId {
    fn from(value: i64) -> Self {
        TagId(value)
    }
}

/// A canonical, uniquely-slugged, localized label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Store-assigned identifier
    pub id: TagId,
    /// URL-safe unique key, fixed at creation
    pub slug: String,
    /// Display name per locale (at least one entry)
    pub name: Localized,
    /// Optional description per locale
    pub description: Option<Localized>,
    /// Classification namespace, stored in slug form
    pub group: Option<String>,
    /// Default list position
    pub sort_order: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Set when the tag is soft-deleted
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Tag {
    /// Name in the given locale, if one is set
    pub fn name_in(&self, locale: &str) -> Option<&str> {
        self.name.get(locale).map(String::as_str)
    }

    /// Name in the given locale, falling back to any available locale
    pub fn display_name(&self, locale: &str) -> &str {
        self.name_in(locale)
            .or_else(|| self.name.values().next().map(String::as_str))
            .unwrap_or(&self.slug)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn in_group(&self, group: Option<&str>) -> bool {
        match group {
            Some(group) => self.group.as_deref() == Some(group),
            None => true,
        }
    }
}

/// Caller request to create a tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    /// Explicit slug; derived from the name when absent
    pub slug: Option<String>,
    pub name: Localized,
    pub description: Option<Localized>,
    pub group: Option<String>,
    /// Explicit position; appended after existing tags when absent
    pub sort_order: Option<i64>,
}

impl NewTag {
    /// A tag with a single localized name
    pub fn named(locale: impl Into<String>, name: impl Into<String>) -> Self {
        let mut names = Localized::new();
        names.insert(locale.into(), name.into());
        Self {
            name: names,
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// A validated tag record ready for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDraft {
    pub slug: String,
    pub name: Localized,
    pub description: Option<Localized>,
    pub group: Option<String>,
    pub sort_order: Option<i64>,
}

/// Partial update of a tag. Slugs are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    /// Locale entries to merge into the name
    pub name: Option<Localized>,
    /// `Some(None)` clears the description
    pub description: Option<Option<Localized>>,
    /// `Some(None)` clears the group
    pub group: Option<Option<String>>,
    pub sort_order: Option<i64>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.group.is_none()
            && self.sort_order.is_none()
    }

    /// Apply the patch to a tag snapshot
    pub fn apply_to(&self, tag: &mut Tag) {
        if let Some(name) = &self.name {
            for (locale, value) in name {
                tag.name.insert(locale.clone(), value.clone());
            }
        }
        if let Some(description) = &self.description {
            tag.description = description.clone();
        }
        if let Some(group) = &self.group {
            tag.group = group.clone();
        }
        if let Some(sort_order) = self.sort_order {
            tag.sort_order = sort_order;
        }
    }
}

/// Polymorphic owner of associations: `(subject_type, subject_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectRef {
    /// Discriminator as stored in the association table
    pub subject_type: String,
    pub subject_id: String,
}

impl SubjectRef {
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.subject_id)
    }
}

/// A single subject-tag link row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub tag_id: TagId,
    pub subject: SubjectRef,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Set operation applied when reconciling a subject's tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Final set equals the desired set
    Replace,
    /// Attach the desired set, never detach
    Union,
    /// Detach the desired set (everything when empty)
    Subtract,
}

/// Deltas produced by a reconcile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub attached: Vec<TagId>,
    pub detached: Vec<TagId>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

/// Membership mode for subject queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Has every referenced tag
    All,
    /// Has at least one referenced tag
    Any,
    /// Has none of the referenced tags
    None,
    /// Has no tags at all
    WithoutAny,
}

/// Optional group/locale narrowing for lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub group: Option<String>,
    pub locale: Option<String>,
}

impl ResolveOptions {
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Engine settings threaded explicitly into every component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggingConfig {
    /// Separator for a single delimited tag string
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Locale used when a call does not name one
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Physical table names, passed through to SQL stores
    #[serde(default = "default_tags_table")]
    pub tags_table: String,
    #[serde(default = "default_taggables_table")]
    pub taggables_table: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_tags_table() -> String {
    "tags".to_string()
}

fn default_taggables_table() -> String {
    "taggables".to_string()
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            default_locale: default_locale(),
            tags_table: default_tags_table(),
            taggables_table: default_taggables_table(),
        }
    }
}

impl TaggingConfig {
    /// The locale to use for a call, given an optional override
    pub fn locale_or_default<'a>(&'a self, locale: Option<&'a str>) -> &'a str {
        locale.unwrap_or(&self.default_locale)
    }
}
