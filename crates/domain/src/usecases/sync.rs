//! Association reconciliation

use std::collections::HashSet;

use crate::model::{SubjectRef, SyncMode, SyncOutcome, TagId};
use crate::ports::{StoreError, StoreTx};

/// Bring a subject's associations in line with `desired` under `mode`.
///
/// Runs inside the caller's unit of work; removals are applied before
/// insertions. `attached` keeps the order of `desired`. With
/// [`SyncMode::Subtract`] an empty `desired` detaches everything.
pub async fn reconcile(
    tx: &mut dyn StoreTx,
    subject: &SubjectRef,
    desired: &[TagId],
    mode: SyncMode,
) -> Result<SyncOutcome, StoreError> {
    let current = tx.list_associations(subject).await?;
    let current_set: HashSet<TagId> = current.iter().copied().collect();

    let mut seen = HashSet::new();
    let desired: Vec<TagId> = desired.iter().copied().filter(|id| seen.insert(*id)).collect();
    let desired_set: HashSet<TagId> = desired.iter().copied().collect();

    let to_attach: Vec<TagId> = match mode {
        SyncMode::Replace | SyncMode::Union => desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id))
            .collect(),
        SyncMode::Subtract => Vec::new(),
    };

    let to_detach: Vec<TagId> = match mode {
        SyncMode::Replace => current
            .iter()
            .copied()
            .filter(|id| !desired_set.contains(id))
            .collect(),
        SyncMode::Union => Vec::new(),
        SyncMode::Subtract if desired.is_empty() => current.clone(),
        SyncMode::Subtract => desired
            .iter()
            .copied()
            .filter(|id| current_set.contains(id))
            .collect(),
    };

    if mode == SyncMode::Subtract && desired.is_empty() {
        if !to_detach.is_empty() {
            tx.detach_all(subject).await?;
        }
    } else if !to_detach.is_empty() {
        tx.detach(subject, &to_detach).await?;
    }

    if !to_attach.is_empty() {
        tx.attach(subject, &to_attach).await?;
    }

    tracing::debug!(
        subject = %subject,
        mode = ?mode,
        attached = to_attach.len(),
        detached = to_detach.len(),
        "Reconciled associations"
    );

    Ok(SyncOutcome {
        attached: to_attach,
        detached: to_detach,
    })
}
