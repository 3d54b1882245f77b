//! Recursive completeness evaluation.
//!
//! # Responsibility
//! - Combine local field checks with the completeness of required
//!   associations, loading them lazily.
//! - Provide the shared policies: required one-to-one, optional one-to-one,
//!   non-empty collection with every member complete, exactly-one alternative.
//!
//! # Invariants
//! - A transient entity, or one missing required fields, is incomplete and
//!   triggers no request.
//! - The result is cached on the instance (`EntityMeta::complete`).
//! - An entity reached again while it is still being evaluated (a cycle in
//!   the data) ends that branch as incomplete.

use crate::engine::association::{load_many, load_one, AssociationHost};
use crate::engine::barrier::fan_in_all;
use crate::model::entity::{EntityId, EntityKind, Persistable};
use crate::model::relation::{ManySlot, OneSlot, Relation};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::BoxFuture;
use log::{debug, info};

/// Entities currently being evaluated, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalPath {
    visited: Vec<(EntityKind, EntityId)>,
}

impl EvalPath {
    pub fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        self.visited.contains(&(kind, id))
    }

    pub fn depth(&self) -> usize {
        self.visited.len()
    }

    fn with(&self, kind: EntityKind, id: EntityId) -> Self {
        let mut visited = self.visited.clone();
        visited.push((kind, id));
        Self { visited }
    }
}

/// Completeness capability.
pub trait CompletenessAware: AssociationHost {
    /// Own scalar field checks, without association traversal.
    fn has_required_fields(&self) -> bool;

    /// Evaluates and caches completeness under `path`.
    ///
    /// Implementations start with [`enter`], combine association policies and
    /// end with [`settle`].
    fn evaluate<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        path: &'a EvalPath,
    ) -> BoxFuture<'a, RepoResult<bool>>;
}

/// Runs the local step and returns the id plus the extended path, or `None`
/// (with `complete=false` cached) when evaluation stops here.
pub fn enter<E: CompletenessAware>(
    entity: &mut E,
    path: &EvalPath,
) -> Option<(EntityId, EvalPath)> {
    let Some(id) = entity.id() else {
        settle(entity, false);
        return None;
    };
    if !entity.has_required_fields() {
        settle(entity, false);
        return None;
    }
    if path.contains(E::KIND, id) {
        debug!(
            "event=completeness_cycle module=engine status=ok kind={} id={} depth={}",
            E::KIND,
            id,
            path.depth()
        );
        settle(entity, false);
        return None;
    }
    Some((id, path.with(E::KIND, id)))
}

/// Caches `complete` on `entity` and returns it.
pub fn settle<E: Persistable>(entity: &mut E, complete: bool) -> bool {
    entity.meta_mut().complete = complete;
    complete
}

/// Required one-to-one: present and complete.
pub async fn required_one<E: CompletenessAware>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut OneSlot<E>,
    path: &EvalPath,
) -> RepoResult<bool> {
    match load_one(repo, owner_id, relation, slot).await? {
        Some(target) => target.evaluate(repo, path).await,
        None => Ok(false),
    }
}

/// Optional one-to-one: absent, or present and complete.
pub async fn optional_one<E: CompletenessAware>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut OneSlot<E>,
    path: &EvalPath,
) -> RepoResult<bool> {
    match load_one(repo, owner_id, relation, slot).await? {
        Some(target) => target.evaluate(repo, path).await,
        None => Ok(true),
    }
}

/// Required collection: non-empty and every member complete.
pub async fn required_many<E: CompletenessAware>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut ManySlot<E>,
    path: &EvalPath,
) -> RepoResult<bool> {
    let members = load_many(repo, owner_id, relation, slot).await?;
    if members.is_empty() {
        return Ok(false);
    }
    fan_in_all(members.iter_mut().map(|member| member.evaluate(repo, path))).await
}

/// Index of the only present alternative, or `None` for zero or several.
pub fn single_alternative(present: &[bool]) -> Option<usize> {
    let mut found = present
        .iter()
        .enumerate()
        .filter(|(_, is_present)| **is_present);
    match (found.next(), found.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

/// Evaluates `entity` from an empty path.
pub async fn check_complete<E: CompletenessAware>(
    entity: &mut E,
    repo: &EntityRepository,
) -> RepoResult<bool> {
    entity.evaluate(repo, &EvalPath::default()).await
}

/// Re-evaluates `entity` and persists the flag when it differs from the
/// value held before evaluation. Blank required fields do not block the write.
pub async fn reconcile<E: CompletenessAware>(
    entity: &mut E,
    repo: &EntityRepository,
) -> RepoResult<bool> {
    let previous = entity.is_complete();
    let complete = check_complete(entity, repo).await?;
    if complete != previous {
        repo.update_complete(entity).await?;
        info!(
            "event=completeness_reconcile module=engine status=ok kind={} id={} complete={}",
            E::KIND,
            entity
                .id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string()),
            complete
        );
    }
    Ok(complete)
}
