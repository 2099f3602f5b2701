//! Minimal in-process store used by the use case tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

use crate::model::{SubjectRef, Tag, TagDraft, TagId, TagPatch};
use crate::ports::{StoreError, StoreTx, TagStore};
use crate::usecases::ScopePredicate;

#[derive(Debug, Clone, Default)]
struct FakeState {
    tags: Vec<Tag>,
    links: Vec<(SubjectRef, TagId)>,
    next_id: i64,
}

impl FakeState {
    fn live(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| !t.is_deleted())
    }

    fn subject_tags(&self, subject: &SubjectRef) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .links
            .iter()
            .filter(|(s, _)| s == subject)
            .filter_map(|(_, id)| self.live().find(|t| t.id == *id).cloned())
            .collect();
        tags.sort_by_key(|t| (t.sort_order, t.id));
        tags
    }

    fn push_tag(&mut self, draft: &TagDraft) -> Tag {
        self.next_id += 1;
        let sort_order = draft
            .sort_order
            .unwrap_or_else(|| self.tags.iter().map(|t| t.sort_order).max().unwrap_or(0) + 1);
        let tag = Tag {
            id: TagId(self.next_id),
            slug: draft.slug.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            group: draft.group.clone(),
            sort_order,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            deleted_at: None,
        };
        self.tags.push(tag.clone());
        tag
    }
}

/// Store double with switches for simulating races and failures
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Arc<Mutex<FakeState>>,
    /// Next insert loses a race against an identical concurrent insert
    pub lose_next_race: Arc<AtomicBool>,
    /// Attach calls fail with a database error
    pub fail_attach: Arc<AtomicBool>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag_count(&self) -> usize {
        self.state.lock().unwrap().tags.len()
    }

    pub fn links_of(&self, subject: &SubjectRef) -> Vec<TagId> {
        self.state
            .lock()
            .unwrap()
            .subject_tags(subject)
            .into_iter()
            .map(|t| t.id)
            .collect()
    }
}

#[async_trait]
impl TagStore for FakeStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(FakeTx {
            shared: Arc::clone(&self.state),
            working,
            lose_next_race: Arc::clone(&self.lose_next_race),
            fail_attach: Arc::clone(&self.fail_attach),
        }))
    }
}

struct FakeTx {
    shared: Arc<Mutex<FakeState>>,
    working: FakeState,
    lose_next_race: Arc<AtomicBool>,
    fail_attach: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTx for FakeTx {
    async fn find_by_slug(&mut self, slug: &str) -> Result<Option<Tag>, StoreError> {
        Ok(self.working.live().find(|t| t.slug == slug).cloned())
    }

    async fn find_by_name(
        &mut self,
        locale: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<Option<Tag>, StoreError> {
        let mut matches: Vec<&Tag> = self
            .working
            .live()
            .filter(|t| t.name_in(locale) == Some(name) && t.in_group(group))
            .collect();
        matches.sort_by_key(|t| (t.sort_order, t.id));
        Ok(matches.first().map(|t| (*t).clone()))
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
        let mut tags: Vec<Tag> = self
            .working
            .live()
            .filter(|t| t.in_group(group))
            .cloned()
            .collect();
        tags.sort_by_key(|t| (t.sort_order, t.id));
        Ok(tags)
    }

    async fn insert_tag(&mut self, draft: &TagDraft) -> Result<Tag, StoreError> {
        if self.lose_next_race.swap(false, Ordering::SeqCst) {
            // The competing writer commits first
            let mut shared = self.shared.lock().unwrap();
            shared.push_tag(draft);
            self.working = shared.clone();
            return Err(StoreError::UniqueViolation(draft.slug.clone()));
        }
        if self.working.live().any(|t| t.slug == draft.slug) {
            return Err(StoreError::UniqueViolation(draft.slug.clone()));
        }
        Ok(self.working.push_tag(draft))
    }

    async fn update_tag(
        &mut self,
        id: TagId,
        patch: &TagPatch,
    ) -> Result<Option<Tag>, StoreError> {
        let Some(tag) = self
            .working
            .tags
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted())
        else {
            return Ok(None);
        };
        patch.apply_to(tag);
        Ok(Some(tag.clone()))
    }

    async fn soft_delete_tag(&mut self, id: TagId) -> Result<Option<Tag>, StoreError> {
        let Some(tag) = self
            .working
            .tags
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted())
        else {
            return Ok(None);
        };
        tag.deleted_at = Some(OffsetDateTime::UNIX_EPOCH);
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
            return Err(StoreError::UniqueViolation(slug));
        }
        let tag = self
            .working
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::Database("vanished".to_string()))?;
        tag.deleted_at = None;
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
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(StoreError::Database("attach failed".to_string()));
        }
        for id in ids {
            let link = (subject.clone(), *id);
            if !self.working.links.contains(&link) {
                self.working.links.push(link);
            }
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
        let FakeTx {
            shared, working, ..
        } = *self;
        *shared.lock().unwrap() = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
