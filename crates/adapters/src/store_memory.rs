//! In-memory tag store for testing and offline mode

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use taggable_domain::{
    Clock, ScopePredicate, StoreError, StoreTx, SubjectRef, SystemClock, Tag, TagDraft, TagId,
    TagPatch, TagStore,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tags: Vec<Tag>,
    links: BTreeSet<(SubjectRef, TagId)>,
    next_id: i64,
}

impl MemoryState {
    fn live(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| !t.is_deleted())
    }

    fn live_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.iter_mut().find(|t| t.id == id && !t.is_deleted())
    }

    fn sorted(mut tags: Vec<Tag>) -> Vec<Tag> {
        tags.sort_by_key(|t| (t.sort_order, t.id));
        tags
    }

    fn subject_tags(&self, subject: &SubjectRef) -> Vec<Tag> {
        let tags = self
            .links
            .iter()
            .filter(|(s, _)| s == subject)
            .filter_map(|(_, id)| self.live().find(|t| t.id == *id).cloned())
            .collect();
        Self::sorted(tags)
    }
}

/// In-memory store. Units of work are serialized: a transaction holds the
/// state lock from `begin` until commit or rollback.
#[derive(Clone)]
pub struct InMemoryTagStore {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTagStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            clock,
        }
    }
}

impl Default for InMemoryTagStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagStore for InMemoryTagStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            clock: Arc::clone(&self.clock),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_by_slug(&mut self, slug: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self.working.live().find(|t| t.slug == slug).cloned())
    }

    async fn find_by_name(
        &mut self,
        locale: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<Option<Tag>, StoreError> {
        Ok(self
            .working
            .live()
            .filter(|t| t.name_in(locale) == Some(name) && t.in_group(group))
            .min_by_key(|t| (t.sort_order, t.id))
            .cloned())
    }

    async fn find_by_ids(&mut self, ids: &[TagId]) -> Result<Vec<Tag>, StoreError> {
        Ok(self
            .working
            .live()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn get_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        Ok(self.working.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tags(&mut self, group: Option<&str>) -> Result<Vec<Tag>, StoreError> {
        let tags = self
            .working
            .live()
            .filter(|t| t.in_group(group))
            .cloned()
            .collect();
        Ok(MemoryState::sorted(tags))
    }

    async fn insert_tag(&mut self, draft: &TagDraft) -> Result<Tag, StoreError> {
        if self.working.live().any(|t| t.slug == draft.slug) {
            return Err(StoreError::UniqueViolation(format!("slug {}", draft.slug)));
        }

        let now = self.clock.now();
        self.working.next_id += 1;
        let sort_order = draft.sort_order.unwrap_or_else(|| {
            self.working
                .tags
                .iter()
                .map(|t| t.sort_order)
                .max()
                .unwrap_or(0)
                + 1
        });
        let tag = Tag {
            id: TagId(self.working.next_id),
            slug: draft.slug.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            group: draft.group.clone(),
            sort_order,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(
        &mut self,
        id: TagId,
        patch: &TagPatch,
    ) -> Result<Option<Tag>, StoreError> {
        let now = self.clock.now();
        let Some(tag) = self.working.live_mut(id) else {
            return Ok(None);
        };
        patch.apply_to(tag);
        tag.updated_at = now;
        Ok(Some(tag.clone()))
    }

    async fn soft_delete_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        let now = self.clock.now();
        let Some(tag) = self.working.live_mut(id) else {
            return Ok(None);
        };
        tag.deleted_at = Some(now);
        tag.updated_at = now;
        let tag = tag.clone();
        self.working.links.retain(|(_, tag_id)| *tag_id != id);
        Ok(Some(tag))
    }

    async fn restore_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        let Some(slug) = self
            .working
            .tags
            .iter()
            .find(|t| t.id == id && t.is_deleted())
            .map(|t| t.slug.clone())
        else {
            return Ok(None);
        };
        if self.working.live().any(|t| t.slug == slug) {
            return Err(StoreError::UniqueViolation(format!("slug {}", slug)));
        }

        let now = self.clock.now();
        let tag = self
            .working
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::Database(format!("tag {} vanished", id)))?;
        tag.deleted_at = None;
        tag.updated_at = now;
        Ok(Some(tag.clone()))
    }

    async fn list_associations(&mut self, subject: &SubjectRef) -> Result<Vec<TagId>, StoreError> {
        Ok(self
            .working
            .subject_tags(subject)
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    async fn list_subject_tags(&mut self, subject: &SubjectRef) -> Result<Vec<Tag>, StoreError> {
        Ok(self.working.subject_tags(subject))
    }

    async fn list_entries(
        &mut self,
        tag_id: TagId,
        subject_type: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .working
            .links
            .iter()
            .filter(|(s, id)| *id == tag_id && s.subject_type == subject_type)
            .map(|(s, _)| s.subject_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn attach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError> {
        for id in ids {
            if !self.working.live().any(|t| t.id == *id) {
                return Err(StoreError::Database(format!("tag {} does not exist", id)));
            }
            self.working.links.insert((subject.clone(), *id));
        }
        Ok(())
    }

    async fn detach(&mut self, subject: &SubjectRef, ids: &[TagId]) -> Result<(), StoreError> {
        self.working
            .links
            .retain(|(s, id)| !(s == subject && ids.contains(id)));
        Ok(())
    }

    async fn detach_all(&mut self, subject: &SubjectRef) -> Result<u64, StoreError> {
        let before = self.working.links.len();
        self.working.links.retain(|(s, _)| s != subject);
        Ok((before - self.working.links.len()) as u64)
    }

    async fn filter_subjects(
        &mut self,
        subject_type: &str,
        candidates: &[String],
        predicate: &ScopePredicate,
    ) -> Result<Vec<String>, StoreError> {
        Ok(candidates
            .iter()
            .filter(|id| {
                let subject = SubjectRef::new(subject_type, id.as_str());
                predicate.matches(&self.working.subject_tags(&subject))
            })
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
