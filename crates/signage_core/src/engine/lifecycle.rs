//! Cascade delete along owned relations.
//!
//! # Invariants
//! - Owned children are deleted (recursively) before their owner's row.
//! - Referenced targets are never deleted; the store drops their links. A
//!   referenced relation passed to a cascade helper fails before any request.
//! - Not transactional: a failure mid-cascade leaves the rows deleted so far.

use crate::engine::association::{load_many, load_one, AssociationHost};
use crate::engine::barrier::fan_in;
use crate::model::entity::EntityId;
use crate::model::relation::{ManySlot, OneSlot, Ownership, Relation};
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};
use futures::future::{BoxFuture, FutureExt};
use log::info;

/// Ownership-aware delete capability.
pub trait Cascade: AssociationHost {
    /// Deletes every owned descendant; `self`'s own row is left in place.
    fn delete_owned<'a>(&'a mut self, repo: &'a EntityRepository) -> BoxFuture<'a, RepoResult<()>>;
}

/// Deletes `entity`, its owned descendants first.
///
/// # Errors
/// - `Transient` when `entity` has no id (no request issued).
pub async fn delete_entity<E: Cascade>(mut entity: E, repo: &EntityRepository) -> RepoResult<()> {
    let id = entity.require_id()?;
    delete_tree(&mut entity, id, repo).await?;
    info!(
        "event=entity_delete module=engine status=ok kind={} id={}",
        E::KIND,
        id
    );
    Ok(())
}

async fn delete_tree<E: Cascade>(
    entity: &mut E,
    id: EntityId,
    repo: &EntityRepository,
) -> RepoResult<()> {
    entity.delete_owned(repo).await?;
    repo.delete_row(E::KIND, id).await?;
    entity.meta_mut().id = None;
    Ok(())
}

/// Deletes the owned one-to-one child of `owner_id`, if any.
pub async fn cascade_one<E: Cascade>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut OneSlot<E>,
) -> RepoResult<()> {
    relation.require_ownership(Ownership::Owned)?;
    if let Some(child) = load_one(repo, owner_id, relation, slot).await? {
        let child_id = child.require_id()?;
        delete_tree(child, child_id, repo).await?;
    }
    slot.set(None);
    Ok(())
}

/// Deletes every owned member of `owner_id`'s collection.
pub async fn cascade_many<E: Cascade>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut ManySlot<E>,
) -> RepoResult<()> {
    relation.require_ownership(Ownership::Owned)?;
    let members = load_many(repo, owner_id, relation, slot).await?;
    fan_in(members.iter_mut().map(|member| {
        async move {
            let member_id = member.require_id()?;
            delete_tree(member, member_id, repo).await?;
            Ok::<_, RepoError>(())
        }
        .boxed()
    }))
    .await?;
    slot.set(Vec::new());
    Ok(())
}
