//! Lazy association loading and link/unlink against association endpoints.
//!
//! # Responsibility
//! - Fill `Slot`s on first access and reuse them afterwards.
//! - Enforce one-to-one / one-to-many link contracts before any write.
//! - Desynchronize the other side of every link change.
//!
//! # Invariants
//! - A loaded slot is never re-fetched until invalidated.
//! - Contract checks run against the slot; an unknown slot is loaded first,
//!   a loaded one issues no request.
//! - Linked targets are cached as header+fields snapshots with unknown slots.
//! - A relation used with the wrong cardinality fails before any request.

use crate::engine::serialize::Serializable;
use crate::model::entity::{EntityId, ModelError, Persistable};
use crate::model::relation::{Cardinality, ManySlot, OneSlot, Relation};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use log::{debug, info};

/// Instance-level association cache control.
pub trait AssociationHost: Persistable {
    /// Returns every association slot to unknown, keeping the instance.
    fn desynchronize(&mut self);

    /// Marks every association slot known-empty. Called once the row has been
    /// created, since a new row has no links yet.
    fn reset_associations(&mut self);
}

/// Copy of `entity`'s header and fields with every slot unknown.
pub fn snapshot<E: Persistable>(entity: &E) -> E {
    E::from_parts(entity.meta().clone(), entity.fields().clone())
}

fn require_owner(owner_id: Option<EntityId>, relation: Relation) -> Result<EntityId, ModelError> {
    owner_id.ok_or(ModelError::Transient {
        kind: relation.owner,
    })
}

/// Loads a one-to-one relation unless it is already cached.
pub async fn load_one<'s, E: Persistable>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &'s mut OneSlot<E>,
) -> RepoResult<Option<&'s mut E>> {
    relation.require_cardinality(Cardinality::One)?;
    if !slot.is_loaded() {
        let row = repo.fetch_one(relation, owner_id).await?;
        let target = row.map(E::from_flat).transpose()?.map(Box::new);
        debug!(
            "event=association_load module=engine status=ok relation={} owner_id={} found={}",
            relation.name,
            owner_id,
            target.is_some()
        );
        slot.set(target);
    }
    Ok(slot.loaded_mut().as_deref_mut())
}

/// Loads a one-to-many relation unless it is already cached.
pub async fn load_many<'s, E: Persistable>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &'s mut ManySlot<E>,
) -> RepoResult<&'s mut Vec<E>> {
    relation.require_cardinality(Cardinality::Many)?;
    if !slot.is_loaded() {
        let rows = repo.fetch_many(relation, owner_id).await?;
        let members = rows
            .into_iter()
            .map(E::from_flat)
            .collect::<RepoResult<Vec<E>>>()?;
        debug!(
            "event=association_load module=engine status=ok relation={} owner_id={} count={}",
            relation.name,
            owner_id,
            members.len()
        );
        slot.set(members);
    }
    Ok(slot.loaded_mut())
}

/// Sets a one-to-one relation to `target`.
///
/// # Errors
/// - `Transient` when the owner or the target has no id (no request issued).
/// - `AlreadySet` when the relation already holds a link.
pub async fn link_one<E: AssociationHost>(
    repo: &EntityRepository,
    owner_id: Option<EntityId>,
    relation: Relation,
    slot: &mut OneSlot<E>,
    target: &mut E,
) -> RepoResult<()> {
    let owner_id = require_owner(owner_id, relation)?;
    let target_id = target.require_id()?;

    if load_one(repo, owner_id, relation, slot).await?.is_some() {
        return Err(ModelError::AlreadySet {
            relation: relation.name,
            owner_id,
        }
        .into());
    }

    repo.put_link(relation, owner_id, target_id).await?;
    target.desynchronize();
    slot.set(Some(Box::new(snapshot(target))));
    info!(
        "event=association_link module=engine status=ok relation={} owner_id={} target_id={}",
        relation.name, owner_id, target_id
    );
    Ok(())
}

/// Clears a one-to-one relation currently pointing at `target`.
///
/// # Errors
/// - `Transient` when the owner or the target has no id (no request issued).
/// - `NotSet` when the relation is empty or points elsewhere.
pub async fn unlink_one<E: AssociationHost>(
    repo: &EntityRepository,
    owner_id: Option<EntityId>,
    relation: Relation,
    slot: &mut OneSlot<E>,
    target: &mut E,
) -> RepoResult<()> {
    let owner_id = require_owner(owner_id, relation)?;
    let target_id = target.require_id()?;

    let current = load_one(repo, owner_id, relation, slot)
        .await?
        .and_then(|linked| linked.id());
    if current != Some(target_id) {
        return Err(ModelError::NotSet {
            relation: relation.name,
            owner_id,
        }
        .into());
    }

    repo.delete_link(relation, owner_id, target_id).await?;
    slot.set(None);
    target.desynchronize();
    info!(
        "event=association_unlink module=engine status=ok relation={} owner_id={} target_id={}",
        relation.name, owner_id, target_id
    );
    Ok(())
}

/// Adds `target` to a one-to-many relation.
///
/// # Errors
/// - `Transient` when the owner or the target has no id (no request issued).
/// - `DuplicateMember` when `target` is already linked.
pub async fn link_many<E: AssociationHost>(
    repo: &EntityRepository,
    owner_id: Option<EntityId>,
    relation: Relation,
    slot: &mut ManySlot<E>,
    target: &mut E,
) -> RepoResult<()> {
    let owner_id = require_owner(owner_id, relation)?;
    let target_id = target.require_id()?;

    let members = load_many(repo, owner_id, relation, slot).await?;
    if members.iter().any(|member| member.id() == Some(target_id)) {
        return Err(ModelError::DuplicateMember {
            relation: relation.name,
            target_id,
        }
        .into());
    }

    repo.put_link(relation, owner_id, target_id).await?;
    target.desynchronize();
    members.push(snapshot(target));
    info!(
        "event=association_link module=engine status=ok relation={} owner_id={} target_id={}",
        relation.name, owner_id, target_id
    );
    Ok(())
}

/// Removes `target` from a one-to-many relation.
///
/// # Errors
/// - `Transient` when the owner or the target has no id (no request issued).
/// - `NotMember` when `target` is not linked.
pub async fn unlink_many<E: AssociationHost>(
    repo: &EntityRepository,
    owner_id: Option<EntityId>,
    relation: Relation,
    slot: &mut ManySlot<E>,
    target: &mut E,
) -> RepoResult<()> {
    let owner_id = require_owner(owner_id, relation)?;
    let target_id = target.require_id()?;

    let members = load_many(repo, owner_id, relation, slot).await?;
    let Some(position) = members
        .iter()
        .position(|member| member.id() == Some(target_id))
    else {
        return Err(ModelError::NotMember {
            relation: relation.name,
            target_id,
        }
        .into());
    };

    repo.delete_link(relation, owner_id, target_id).await?;
    members.remove(position);
    target.desynchronize();
    info!(
        "event=association_unlink module=engine status=ok relation={} owner_id={} target_id={}",
        relation.name, owner_id, target_id
    );
    Ok(())
}
