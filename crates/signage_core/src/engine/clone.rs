//! Deep copy of owned sub-graphs.
//!
//! # Responsibility
//! - Duplicate an entity row and record the provenance (`origin`) link.
//! - Clone owned children recursively; re-link referenced children.
//! - Re-evaluate completeness of the clone once every branch has joined.
//!
//! # Invariants
//! - Owned children get new ids; referenced targets keep theirs. Each helper
//!   rejects a relation with the other ownership before any request.
//! - A failed branch surfaces to the caller; rows already created are kept.

use crate::engine::association::{load_many, load_one, snapshot, AssociationHost};
use crate::engine::barrier::fan_in;
use crate::engine::completeness::{reconcile, CompletenessAware};
use crate::model::entity::{EntityId, EntityMeta, Persistable};
use crate::model::relation::{ManySlot, OneSlot, Ownership, Relation};
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};

/// Deep-copy capability for entities that own or reference children.
pub trait Cloneable: CompletenessAware {
    /// Creates the clone and every owned descendant.
    fn clone_entity<'a>(&'a mut self, repo: &'a EntityRepository)
        -> BoxFuture<'a, RepoResult<Self>>;
}

/// Creates a new row with `source`'s fields and its cached `complete` flag.
pub async fn duplicate_row<E: AssociationHost>(
    source: &E,
    repo: &EntityRepository,
) -> RepoResult<E> {
    let source_id = source.require_id()?;
    let mut meta = EntityMeta::transient();
    meta.complete = source.is_complete();

    let mut clone = E::from_parts(meta, source.fields().clone());
    let clone_id = repo.create(&mut clone).await?;
    debug!(
        "event=clone_row module=engine status=ok kind={} source_id={} clone_id={}",
        E::KIND,
        source_id,
        clone_id
    );
    Ok(clone)
}

/// Links `clone_id` back to `source` through `relation`.
///
/// `source` keeps its cache; the clone's slot holds a snapshot of it.
pub async fn record_origin<E: Persistable>(
    repo: &EntityRepository,
    clone_id: EntityId,
    relation: Relation,
    slot: &mut OneSlot<E>,
    source: &E,
) -> RepoResult<()> {
    let source_id = source.require_id()?;
    repo.put_link(relation, clone_id, source_id).await?;
    slot.set(Some(Box::new(snapshot(source))));
    Ok(())
}

/// Clones the owned one-to-one child of `source_id`, if any, and links the
/// copy to `clone_id`.
pub async fn clone_owned_one<E: Cloneable>(
    repo: &EntityRepository,
    source_id: EntityId,
    clone_id: EntityId,
    relation: Relation,
    source_slot: &mut OneSlot<E>,
    clone_slot: &mut OneSlot<E>,
) -> RepoResult<()> {
    relation.require_ownership(Ownership::Owned)?;
    let Some(child) = load_one(repo, source_id, relation, source_slot).await? else {
        clone_slot.set(None);
        return Ok(());
    };
    let child_clone = child.clone_entity(repo).await?;
    repo.put_link(relation, clone_id, child_clone.require_id()?)
        .await?;
    clone_slot.set(Some(Box::new(child_clone)));
    Ok(())
}

/// Clones every owned member of `source_id`'s collection and links each
/// copy to `clone_id`.
pub async fn clone_owned_many<E: Cloneable>(
    repo: &EntityRepository,
    source_id: EntityId,
    clone_id: EntityId,
    relation: Relation,
    source_slot: &mut ManySlot<E>,
    clone_slot: &mut ManySlot<E>,
) -> RepoResult<()> {
    relation.require_ownership(Ownership::Owned)?;
    let members = load_many(repo, source_id, relation, source_slot).await?;
    let clones = fan_in(members.iter_mut().map(|member| {
        async move {
            let child_clone = member.clone_entity(repo).await?;
            repo.put_link(relation, clone_id, child_clone.require_id()?)
                .await?;
            Ok::<_, RepoError>(child_clone)
        }
        .boxed()
    }))
    .await?;
    clone_slot.set(clones);
    Ok(())
}

/// Links `clone_id` to the same referenced target as `source_id`, if any.
pub async fn relink_one<E: AssociationHost>(
    repo: &EntityRepository,
    source_id: EntityId,
    clone_id: EntityId,
    relation: Relation,
    source_slot: &mut OneSlot<E>,
    clone_slot: &mut OneSlot<E>,
) -> RepoResult<()> {
    relation.require_ownership(Ownership::Referenced)?;
    let Some(target) = load_one(repo, source_id, relation, source_slot).await? else {
        clone_slot.set(None);
        return Ok(());
    };
    let target_id = target.require_id()?;
    repo.put_link(relation, clone_id, target_id).await?;
    target.desynchronize();
    clone_slot.set(Some(Box::new(snapshot(target))));
    Ok(())
}

/// Final step of every clone: persist the re-evaluated flag when it differs
/// from the one copied from the source.
pub async fn settle_clone<E: CompletenessAware>(
    clone: &mut E,
    source_id: EntityId,
    repo: &EntityRepository,
) -> RepoResult<()> {
    let complete = reconcile(clone, repo).await?;
    info!(
        "event=entity_clone module=engine status=ok kind={} source_id={} clone_id={} complete={}",
        E::KIND,
        source_id,
        clone
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string()),
        complete
    );
    Ok(())
}
