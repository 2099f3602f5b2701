//! Explicit tag management: create, update, reorder, delete, restore

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::TagError;
use crate::events::{EventEmitter, TagEvent};
use crate::model::{NewTag, Tag, TagDraft, TagId, TagPatch, TaggingConfig};
use crate::policy::FieldPolicy;
use crate::ports::{StoreError, StoreTx, TagStore};
use crate::slug::{SlugAssigner, normalize_group};
use crate::subjects::SubjectRegistry;
use crate::usecases::finish;

/// Use case for managing tag records directly
pub struct TagService<S: TagStore + ?Sized> {
    store: Arc<S>,
    emitter: EventEmitter,
    policy: FieldPolicy,
    slugs: SlugAssigner,
    registry: SubjectRegistry,
}

impl<S: TagStore + ?Sized> TagService<S> {
    pub fn new(
        store: Arc<S>,
        emitter: EventEmitter,
        config: &TaggingConfig,
        policy: FieldPolicy,
    ) -> Self {
        Self {
            store,
            emitter,
            slugs: SlugAssigner::new(config.default_locale.clone(), policy.clone()),
            policy,
            registry: SubjectRegistry::default(),
        }
    }

    /// Subject types known to [`TagService::entries`]
    pub fn with_registry(mut self, registry: SubjectRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Create a tag; the slug comes from the default-locale name unless given
    pub async fn create_tag(&self, new_tag: NewTag) -> Result<Tag, TagError> {
        let draft = self.draft_for(new_tag)?;

        let mut tx = self.store.begin().await?;
        let result = match tx.insert_tag(&draft).await {
            Ok(tag) => Ok(tag),
            Err(StoreError::UniqueViolation(_)) => Err(TagError::Conflict {
                slug: draft.slug.clone(),
            }),
            Err(e) => Err(e.into()),
        };
        let tag = finish(tx, result).await?;

        tracing::info!(tag_id = %tag.id, slug = %tag.slug, "Created tag");
        self.emitter.emit(TagEvent::TagCreated { tag: tag.clone() });
        Ok(tag)
    }

    /// Fetch a live tag
    pub async fn get_tag(&self, id: TagId) -> Result<Tag, TagError> {
        let mut tx = self.store.begin().await?;
        let result = tx.get_tag(id).await.map_err(TagError::from);
        let tag = finish(tx, result).await?;
        tag.filter(|t| !t.is_deleted()).ok_or(TagError::NotFound(id))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, TagError> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_by_slug(slug).await.map_err(TagError::from);
        finish(tx, result).await
    }

    /// Live tags ordered by sort order, optionally within a group
    pub async fn list_tags(&self, group: Option<&str>) -> Result<Vec<Tag>, TagError> {
        let group = normalize_group(group);
        let mut tx = self.store.begin().await?;
        let result = tx.list_tags(group.as_deref()).await.map_err(TagError::from);
        finish(tx, result).await
    }

    /// Update mutable fields. The slug is never regenerated.
    pub async fn update_tag(&self, id: TagId, patch: TagPatch) -> Result<Tag, TagError> {
        let patch = self.validate_patch(patch)?;

        let mut tx = self.store.begin().await?;
        let result = match tx.update_tag(id, &patch).await {
            Ok(Some(tag)) => Ok(tag),
            Ok(None) => Err(TagError::NotFound(id)),
            Err(e) => Err(e.into()),
        };
        let tag = finish(tx, result).await?;

        tracing::info!(tag_id = %tag.id, "Updated tag");
        self.emitter.emit(TagEvent::TagUpdated { tag: tag.clone() });
        Ok(tag)
    }

    /// Give the listed tags sort orders `1..=n` in list order. Repeated ids
    /// keep their first position; unlisted tags are left alone.
    pub async fn reorder(&self, ids: &[TagId]) -> Result<Vec<Tag>, TagError> {
        let mut seen = HashSet::new();
        let ids: Vec<TagId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        self.policy.validate_sort_order(ids.len() as i64)?;

        let mut tx = self.store.begin().await?;
        let result = Self::reorder_in(tx.as_mut(), &ids).await;
        let tags = finish(tx, result).await?;

        tracing::info!(count = tags.len(), "Reordered tags");
        self.emitter.emit_all(
            tags.iter()
                .cloned()
                .map(|tag| TagEvent::TagUpdated { tag }),
        );
        Ok(tags)
    }

    async fn reorder_in(tx: &mut dyn StoreTx, ids: &[TagId]) -> Result<Vec<Tag>, TagError> {
        let mut tags = Vec::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            let patch = TagPatch {
                sort_order: Some(position as i64 + 1),
                ..Default::default()
            };
            let tag = tx
                .update_tag(*id, &patch)
                .await?
                .ok_or(TagError::NotFound(*id))?;
            tags.push(tag);
        }
        Ok(tags)
    }

    /// Ids of the subjects of a registered type that carry a live tag
    pub async fn entries(&self, id: TagId, type_name: &str) -> Result<Vec<String>, TagError> {
        let subject_type = self.registry.discriminator(type_name)?;

        let mut tx = self.store.begin().await?;
        let result = Self::entries_in(tx.as_mut(), id, subject_type).await;
        finish(tx, result).await
    }

    async fn entries_in(
        tx: &mut dyn StoreTx,
        id: TagId,
        subject_type: &str,
    ) -> Result<Vec<String>, TagError> {
        match tx.get_tag(id).await? {
            Some(tag) if !tag.is_deleted() => Ok(tx.list_entries(id, subject_type).await?),
            _ => Err(TagError::NotFound(id)),
        }
    }

    /// Soft-delete a tag, removing its associations
    pub async fn delete_tag(&self, id: TagId) -> Result<Tag, TagError> {
        let mut tx = self.store.begin().await?;
        let result = match tx.soft_delete_tag(id).await {
            Ok(Some(tag)) => Ok(tag),
            Ok(None) => Err(TagError::NotFound(id)),
            Err(e) => Err(e.into()),
        };
        let tag = finish(tx, result).await?;

        tracing::info!(tag_id = %tag.id, slug = %tag.slug, "Deleted tag");
        self.emitter.emit(TagEvent::TagDeleted { tag: tag.clone() });
        Ok(tag)
    }

    /// Bring back a soft-deleted tag. Restoring a live tag is a no-op.
    pub async fn restore_tag(&self, id: TagId) -> Result<Tag, TagError> {
        let mut tx = self.store.begin().await?;
        let result = Self::restore_in(tx.as_mut(), id).await;
        let (tag, restored) = finish(tx, result).await?;

        if restored {
            tracing::info!(tag_id = %tag.id, slug = %tag.slug, "Restored tag");
            self.emitter.emit(TagEvent::TagRestored { tag: tag.clone() });
        }
        Ok(tag)
    }

    async fn restore_in(tx: &mut dyn StoreTx, id: TagId) -> Result<(Tag, bool), TagError> {
        let existing = tx.get_tag(id).await?.ok_or(TagError::NotFound(id))?;
        if !existing.is_deleted() {
            return Ok((existing, false));
        }

        match tx.restore_tag(id).await {
            Ok(Some(tag)) => Ok((tag, true)),
            Ok(None) => Err(TagError::NotFound(id)),
            Err(StoreError::UniqueViolation(_)) => Err(TagError::Conflict {
                slug: existing.slug,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn draft_for(&self, new_tag: NewTag) -> Result<TagDraft, TagError> {
        self.policy.validate_name(&new_tag.name)?;
        if let Some(description) = &new_tag.description {
            self.policy.validate_description(description)?;
        }
        if let Some(sort_order) = new_tag.sort_order {
            self.policy.validate_sort_order(sort_order)?;
        }
        let group = normalize_group(new_tag.group.as_deref());
        if let Some(group) = &group {
            self.policy.validate_group(group)?;
        }
        let slug = match new_tag.slug.as_deref() {
            Some(slug) => self.slugs.normalize(slug)?,
            None => self.slugs.assign(&new_tag.name)?,
        };

        Ok(TagDraft {
            slug,
            name: new_tag.name,
            description: new_tag.description.filter(|d| !d.is_empty()),
            group,
            sort_order: new_tag.sort_order,
        })
    }

    fn validate_patch(&self, mut patch: TagPatch) -> Result<TagPatch, TagError> {
        if let Some(name) = &patch.name {
            self.policy.validate_name(name)?;
        }
        if let Some(Some(description)) = &patch.description {
            self.policy.validate_description(description)?;
        }
        if let Some(sort_order) = patch.sort_order {
            self.policy.validate_sort_order(sort_order)?;
        }
        if let Some(group) = patch.group.take() {
            let group = normalize_group(group.as_deref());
            if let Some(group) = &group {
                self.policy.validate_group(group)?;
            }
            patch.group = Some(group);
        }
        Ok(patch)
    }
}
