//! Tag resolution: references -> canonical tag ids

use std::collections::HashSet;

use crate::error::TagError;
use crate::model::{Localized, ResolveOptions, Tag, TagDraft, TagId, TaggingConfig};
use crate::parser::ParsedRefs;
use crate::policy::FieldPolicy;
use crate::ports::{StoreError, StoreTx};
use crate::slug::{SlugAssigner, normalize_group};

/// Result of resolving a reference list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved ids, deduplicated: id references first, then names
    pub ids: Vec<TagId>,
    /// Tags created during this resolution, to announce after commit
    pub created: Vec<Tag>,
    /// Names with no matching tag (read-only resolution only)
    pub unresolved: Vec<String>,
}

impl Resolution {
    fn push_id(&mut self, seen: &mut HashSet<TagId>, id: TagId) {
        if seen.insert(id) {
            self.ids.push(id);
        }
    }
}

/// Maps parsed references onto tag ids inside a caller-supplied unit of work
#[derive(Debug, Clone)]
pub struct TagResolver {
    default_locale: String,
    policy: FieldPolicy,
    slugs: SlugAssigner,
}

impl TagResolver {
    pub fn new(config: &TaggingConfig, policy: FieldPolicy) -> Self {
        Self {
            default_locale: config.default_locale.clone(),
            slugs: SlugAssigner::new(config.default_locale.clone(), policy.clone()),
            policy,
        }
    }

    /// Look up references without creating anything; unknown names are dropped
    pub async fn resolve_for_read(
        &self,
        tx: &mut dyn StoreTx,
        refs: &ParsedRefs,
        opts: &ResolveOptions,
    ) -> Result<Resolution, TagError> {
        self.resolve(tx, refs, opts, false).await
    }

    /// Look up references, creating a tag for every name with no match
    pub async fn resolve_or_create(
        &self,
        tx: &mut dyn StoreTx,
        refs: &ParsedRefs,
        opts: &ResolveOptions,
    ) -> Result<Resolution, TagError> {
        self.resolve(tx, refs, opts, true).await
    }

    async fn resolve(
        &self,
        tx: &mut dyn StoreTx,
        refs: &ParsedRefs,
        opts: &ResolveOptions,
        create: bool,
    ) -> Result<Resolution, TagError> {
        let locale = opts.locale.as_deref().unwrap_or(&self.default_locale);
        self.policy.validate_locale(locale)?;
        let group = normalize_group(opts.group.as_deref());

        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        if !refs.ids.is_empty() {
            let existing: HashSet<TagId> = tx
                .find_by_ids(&refs.ids)
                .await?
                .into_iter()
                .map(|tag| tag.id)
                .collect();
            for id in &refs.ids {
                if existing.contains(id) {
                    resolution.push_id(&mut seen, *id);
                } else {
                    tracing::debug!(tag_id = %id, "Dropping reference to missing tag");
                }
            }
        }

        for name in &refs.names {
            if let Some(tag) = tx.find_by_name(locale, name, group.as_deref()).await? {
                resolution.push_id(&mut seen, tag.id);
                continue;
            }

            if !create {
                resolution.unresolved.push(name.clone());
                continue;
            }

            let (tag, created) = self
                .create_named(tx, name, group.as_deref(), locale)
                .await?;
            resolution.push_id(&mut seen, tag.id);
            if created {
                resolution.created.push(tag);
            }
        }

        Ok(resolution)
    }

    /// Insert a tag for `name`. On a unique-slug violation the concurrent
    /// winner is re-read instead; the flag reports whether we created it.
    async fn create_named(
        &self,
        tx: &mut dyn StoreTx,
        name: &str,
        group: Option<&str>,
        locale: &str,
    ) -> Result<(Tag, bool), TagError> {
        let draft = self.draft_for(name, group, locale)?;

        match tx.insert_tag(&draft).await {
            Ok(tag) => {
                tracing::info!(
                    tag_id = %tag.id,
                    slug = %tag.slug,
                    locale = %locale,
                    "Created tag"
                );
                Ok((tag, true))
            }
            Err(StoreError::UniqueViolation(detail)) => {
                tracing::debug!(
                    slug = %draft.slug,
                    detail = %detail,
                    "Slug already taken, re-reading"
                );
                if let Some(tag) = tx.find_by_name(locale, name, group).await? {
                    return Ok((tag, false));
                }
                match tx.find_by_slug(&draft.slug).await? {
                    Some(tag) => Ok((tag, false)),
                    None => Err(TagError::Conflict { slug: draft.slug }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn draft_for(
        &self,
        name: &str,
        group: Option<&str>,
        locale: &str,
    ) -> Result<TagDraft, TagError> {
        let mut names = Localized::new();
        names.insert(locale.to_string(), name.to_string());
        self.policy.validate_name(&names)?;
        if let Some(group) = group {
            self.policy.validate_group(group)?;
        }
        let slug = self.slugs.assign(&names)?;

        Ok(TagDraft {
            slug,
            name: names,
            description: None,
            group: group.map(str::to_string),
            sort_order: None,
        })
    }
}
