//! The per-subject tagging engine
//!
//! Ties the parser, resolver and synchronizer together behind the operations
//! consumers call on a taggable subject, and raises events once the store has
//! committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TagError;
use crate::events::{EventEmitter, TagEvent};
use crate::model::{
    MatchMode, ResolveOptions, SubjectRef, SyncMode, SyncOutcome, Tag, TagId, TaggingConfig,
};
use crate::parser::{ParsedRefs, TagInput, TagRefParser};
use crate::policy::FieldPolicy;
use crate::ports::{StoreTx, TagStore};
use crate::slug::normalize_group;
use crate::subjects::SubjectRegistry;
use crate::usecases::{ScopePredicate, TagResolver, finish, reconcile};

/// Tagging operations for any registered subject type
pub struct Taggable<S: TagStore + ?Sized> {
    store: Arc<S>,
    emitter: EventEmitter,
    config: TaggingConfig,
    registry: SubjectRegistry,
    parser: TagRefParser,
    resolver: TagResolver,
    staged: Mutex<HashMap<SubjectRef, (TagInput, ResolveOptions)>>,
}

impl<S: TagStore + ?Sized> Taggable<S> {
    pub fn new(
        store: Arc<S>,
        emitter: EventEmitter,
        config: TaggingConfig,
        registry: SubjectRegistry,
    ) -> Self {
        Self {
            parser: TagRefParser::new(config.delimiter.clone()),
            resolver: TagResolver::new(&config, FieldPolicy::default()),
            store,
            emitter,
            config,
            registry,
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default field constraints
    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.resolver = TagResolver::new(&self.config, policy);
        self
    }

    pub fn config(&self) -> &TaggingConfig {
        &self.config
    }

    /// Reference to a subject of a registered type
    pub fn subject(
        &self,
        type_name: &str,
        subject_id: impl Into<String>,
    ) -> Result<SubjectRef, TagError> {
        self.registry.subject(type_name, subject_id)
    }

    /// Normalize raw input with the configured delimiter
    pub fn parse(&self, input: impl Into<TagInput>) -> ParsedRefs {
        self.parser.parse(&input.into())
    }

    /// Resolve references to existing tag ids; nothing is created
    pub async fn resolve_for_read(
        &self,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<Vec<TagId>, TagError> {
        let refs = self.parse(input);
        let mut tx = self.store.begin().await?;
        let result = self
            .resolver
            .resolve_for_read(tx.as_mut(), &refs, opts)
            .await;
        Ok(finish(tx, result).await?.ids)
    }

    /// Resolve references, creating tags for unknown names
    pub async fn resolve_or_create(
        &self,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<Vec<TagId>, TagError> {
        let refs = self.parse(input);
        let mut tx = self.store.begin().await?;
        let result = self
            .resolver
            .resolve_or_create(tx.as_mut(), &refs, opts)
            .await;
        let resolution = finish(tx, result).await?;

        self.emitter.emit_all(
            resolution
                .created
                .into_iter()
                .map(|tag| TagEvent::TagCreated { tag }),
        );
        Ok(resolution.ids)
    }

    /// Attach tags without detaching any (union)
    pub async fn tag(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<SyncOutcome, TagError> {
        self.sync_tags(subject, input.into(), SyncMode::Union, opts)
            .await
    }

    /// Make the subject's tags exactly the given set (replace)
    pub async fn retag(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<SyncOutcome, TagError> {
        self.sync_tags(subject, input.into(), SyncMode::Replace, opts)
            .await
    }

    /// Detach the given tags, or every tag when `input` is `None`
    pub async fn untag(
        &self,
        subject: &SubjectRef,
        input: Option<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<SyncOutcome, TagError> {
        match input {
            Some(input) => {
                self.sync_tags(subject, input, SyncMode::Subtract, opts)
                    .await
            }
            None => self.detach_everything(subject).await,
        }
    }

    /// Reconcile the subject against `input` under an explicit mode
    pub async fn sync_tags(
        &self,
        subject: &SubjectRef,
        input: TagInput,
        mode: SyncMode,
        opts: &ResolveOptions,
    ) -> Result<SyncOutcome, TagError> {
        let refs = self.parser.parse(&input);

        let mut tx = self.store.begin().await?;
        let result = self
            .sync_in(tx.as_mut(), subject, &refs, mode, opts)
            .await;
        let (created, outcome) = finish(tx, result).await?;

        tracing::info!(
            subject = %subject,
            mode = ?mode,
            attached = ?outcome.attached,
            detached = ?outcome.detached,
            "Synced subject tags"
        );
        self.announce(subject, created, &outcome);
        Ok(outcome)
    }

    async fn sync_in(
        &self,
        tx: &mut dyn StoreTx,
        subject: &SubjectRef,
        refs: &ParsedRefs,
        mode: SyncMode,
        opts: &ResolveOptions,
    ) -> Result<(Vec<Tag>, SyncOutcome), TagError> {
        let resolution = match mode {
            SyncMode::Subtract => self.resolver.resolve_for_read(tx, refs, opts).await?,
            SyncMode::Replace | SyncMode::Union => {
                self.resolver.resolve_or_create(tx, refs, opts).await?
            }
        };

        // Explicit references that resolve to nothing must not widen into "detach all"
        if mode == SyncMode::Subtract && resolution.ids.is_empty() {
            return Ok((Vec::new(), SyncOutcome::default()));
        }

        let outcome = reconcile(tx, subject, &resolution.ids, mode).await?;
        Ok((resolution.created, outcome))
    }

    async fn detach_everything(&self, subject: &SubjectRef) -> Result<SyncOutcome, TagError> {
        let mut tx = self.store.begin().await?;
        let result = reconcile(tx.as_mut(), subject, &[], SyncMode::Subtract)
            .await
            .map_err(TagError::from);
        let outcome = finish(tx, result).await?;

        tracing::info!(subject = %subject, detached = ?outcome.detached, "Detached all tags");
        self.announce(subject, Vec::new(), &outcome);
        Ok(outcome)
    }

    fn announce(&self, subject: &SubjectRef, created: Vec<Tag>, outcome: &SyncOutcome) {
        let mut events: Vec<TagEvent> = created
            .into_iter()
            .map(|tag| TagEvent::TagCreated { tag })
            .collect();
        if !outcome.detached.is_empty() {
            events.push(TagEvent::SubjectUntagged {
                subject: subject.clone(),
                tag_ids: outcome.detached.clone(),
            });
        }
        if !outcome.attached.is_empty() {
            events.push(TagEvent::SubjectTagged {
                subject: subject.clone(),
                tag_ids: outcome.attached.clone(),
            });
        }
        self.emitter.emit_all(events);
    }

    /// The subject's tags ordered by sort order
    pub async fn tags_of(&self, subject: &SubjectRef) -> Result<Vec<Tag>, TagError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_subject_tags(subject).await.map_err(TagError::from);
        finish(tx, result).await
    }

    /// Whether the subject carries the referenced tag
    pub async fn has_tag(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<bool, TagError> {
        self.check(subject, input.into(), MatchMode::Any, opts)
            .await
    }

    /// Whether the subject carries at least one of the referenced tags
    pub async fn has_any_tags(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<bool, TagError> {
        self.check(subject, input.into(), MatchMode::Any, opts)
            .await
    }

    /// Whether the subject carries every referenced tag
    pub async fn has_all_tags(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<bool, TagError> {
        self.check(subject, input.into(), MatchMode::All, opts)
            .await
    }

    async fn check(
        &self,
        subject: &SubjectRef,
        input: TagInput,
        mode: MatchMode,
        opts: &ResolveOptions,
    ) -> Result<bool, TagError> {
        let refs = self.parser.parse(&input);
        let mut tx = self.store.begin().await?;
        let result = self.check_in(tx.as_mut(), subject, &refs, mode, opts).await;
        finish(tx, result).await
    }

    async fn check_in(
        &self,
        tx: &mut dyn StoreTx,
        subject: &SubjectRef,
        refs: &ParsedRefs,
        mode: MatchMode,
        opts: &ResolveOptions,
    ) -> Result<bool, TagError> {
        let predicate = self.build_in(tx, refs, mode, opts).await?;
        if predicate.is_nothing() {
            return Ok(false);
        }
        let tags = tx.list_subject_tags(subject).await?;
        Ok(predicate.matches(&tags))
    }

    /// Queue tags for a subject that is not persisted yet
    pub fn stage_tags(
        &self,
        subject: &SubjectRef,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) {
        let mut staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        staged.insert(subject.clone(), (input.into(), opts.clone()));
    }

    /// Apply staged tags once the subject exists. `None` when nothing was staged.
    ///
    /// On failure the staged input is kept so the call can be retried.
    pub async fn commit_staged(
        &self,
        subject: &SubjectRef,
    ) -> Result<Option<SyncOutcome>, TagError> {
        let pending = self
            .staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject);
        let Some((input, opts)) = pending else {
            return Ok(None);
        };

        match self
            .sync_tags(subject, input.clone(), SyncMode::Replace, &opts)
            .await
        {
            Ok(outcome) => Ok(Some(outcome)),
            Err(error) => {
                self.staged
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(subject.clone())
                    .or_insert((input, opts));
                Err(error)
            }
        }
    }

    /// Drop staged tags without applying them
    pub fn discard_staged(&self, subject: &SubjectRef) -> bool {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject)
            .is_some()
    }

    /// Remove every association of a subject that is being deleted
    pub async fn delete_subject(&self, subject: &SubjectRef) -> Result<SyncOutcome, TagError> {
        self.discard_staged(subject);
        self.detach_everything(subject).await
    }

    /// Build a query predicate for the given membership mode
    pub async fn scope(
        &self,
        input: impl Into<TagInput>,
        mode: MatchMode,
        opts: &ResolveOptions,
    ) -> Result<ScopePredicate, TagError> {
        if mode == MatchMode::WithoutAny {
            return Ok(ScopePredicate::WithoutAny);
        }
        let refs = self.parse(input);
        let mut tx = self.store.begin().await?;
        let result = self.build_in(tx.as_mut(), &refs, mode, opts).await;
        finish(tx, result).await
    }

    async fn build_in(
        &self,
        tx: &mut dyn StoreTx,
        refs: &ParsedRefs,
        mode: MatchMode,
        opts: &ResolveOptions,
    ) -> Result<ScopePredicate, TagError> {
        let resolution = self.resolver.resolve_for_read(tx, refs, opts).await?;
        let group = normalize_group(opts.group.as_deref());
        Ok(ScopePredicate::build(mode, &resolution, group))
    }

    pub async fn with_all_tags(
        &self,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<ScopePredicate, TagError> {
        self.scope(input, MatchMode::All, opts).await
    }

    pub async fn with_any_tags(
        &self,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<ScopePredicate, TagError> {
        self.scope(input, MatchMode::Any, opts).await
    }

    pub async fn without_tags(
        &self,
        input: impl Into<TagInput>,
        opts: &ResolveOptions,
    ) -> Result<ScopePredicate, TagError> {
        self.scope(input, MatchMode::None, opts).await
    }

    pub fn without_any_tags(&self) -> ScopePredicate {
        ScopePredicate::WithoutAny
    }

    /// Keep the candidate ids of a registered subject type that match
    pub async fn find_subjects(
        &self,
        type_name: &str,
        candidates: &[String],
        predicate: &ScopePredicate,
    ) -> Result<Vec<String>, TagError> {
        let subject_type = self.registry.discriminator(type_name)?.to_string();
        if predicate.is_nothing() || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin().await?;
        let result = tx
            .filter_subjects(&subject_type, candidates, predicate)
            .await
            .map_err(TagError::from);
        finish(tx, result).await
    }
}
