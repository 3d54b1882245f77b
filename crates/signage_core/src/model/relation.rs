//! Association descriptors and per-relation cache slots.
//!
//! # Responsibility
//! - Describe each relation: cardinality, ownership and store endpoint.
//! - Hold the cached association state of one relation on one instance.
//!
//! # Invariants
//! - A slot is either unknown (must be fetched) or loaded (fetched or known,
//!   possibly empty). Invalidation returns it to unknown.
//! - Owned relations cascade on delete/clone; referenced ones never do.

use crate::model::entity::{EntityId, EntityKind, ModelError};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One => f.write_str("one-to-one"),
            Self::Many => f.write_str("one-to-many"),
        }
    }
}

/// Lifecycle binding between owner and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Target lifecycle is bound to the owner.
    Owned,
    /// Target is shared and only ever re-linked.
    Referenced,
}

impl Display for Ownership {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owned => f.write_str("owned"),
            Self::Referenced => f.write_str("referenced"),
        }
    }
}

/// Typed, directed relation between two entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Key used in expanded JSON and error messages.
    pub name: &'static str,
    pub owner: EntityKind,
    pub target: EntityKind,
    pub cardinality: Cardinality,
    pub ownership: Ownership,
}

impl Relation {
    pub const fn one(
        name: &'static str,
        owner: EntityKind,
        target: EntityKind,
        ownership: Ownership,
    ) -> Self {
        Self {
            name,
            owner,
            target,
            cardinality: Cardinality::One,
            ownership,
        }
    }

    pub const fn many(
        name: &'static str,
        owner: EntityKind,
        target: EntityKind,
        ownership: Ownership,
    ) -> Self {
        Self {
            name,
            owner,
            target,
            cardinality: Cardinality::Many,
            ownership,
        }
    }

    /// Provenance link from a clone to the entity it was cloned from.
    pub const fn origin(kind: EntityKind) -> Self {
        Self::one("origin", kind, kind, Ownership::Referenced)
    }

    /// Fails unless the relation is used with its declared cardinality.
    pub fn require_cardinality(&self, expected: Cardinality) -> Result<(), ModelError> {
        if self.cardinality != expected {
            return Err(ModelError::CardinalityMismatch {
                relation: self.name,
                expected,
            });
        }
        Ok(())
    }

    /// Fails unless the relation has the ownership policy an operation needs.
    pub fn require_ownership(&self, expected: Ownership) -> Result<(), ModelError> {
        if self.ownership != expected {
            return Err(ModelError::OwnershipMismatch {
                relation: self.name,
                expected,
            });
        }
        Ok(())
    }

    /// `{ownerTable}/{ownerId}/{targetTable}`
    pub fn endpoint(&self, owner_id: EntityId) -> String {
        format!(
            "{}/{}/{}",
            self.owner.table(),
            owner_id,
            self.target.table()
        )
    }

    /// `{ownerTable}/{ownerId}/{targetTable}/{targetId}`
    pub fn link_endpoint(&self, owner_id: EntityId, target_id: EntityId) -> String {
        format!("{}/{}", self.endpoint(owner_id), target_id)
    }
}

/// Cached association state for one relation.
///
/// Three states: unknown (must be fetched), loaded with a value, and loaded
/// empty. Invalidation returns the slot to unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    loaded: Option<T>,
}

/// One-to-one slot: loaded `None` means "known absent".
pub type OneSlot<E> = Slot<Option<Box<E>>>;

/// One-to-many slot.
pub type ManySlot<E> = Slot<Vec<E>>;

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::unknown()
    }
}

impl<T> Slot<T> {
    /// Not fetched since construction or the last invalidation.
    pub const fn unknown() -> Self {
        Self { loaded: None }
    }

    /// Fetched, or known after create/link.
    pub fn loaded(value: T) -> Self {
        Self {
            loaded: Some(value),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn set(&mut self, value: T) {
        self.loaded = Some(value);
    }

    /// Forces the next access to re-fetch.
    pub fn invalidate(&mut self) {
        self.loaded = None;
    }
}

impl<T: Default> Slot<T> {
    /// Returns the loaded value; an unknown slot becomes known-empty.
    pub fn loaded_mut(&mut self) -> &mut T {
        self.loaded.get_or_insert_with(T::default)
    }
}

impl<E> Slot<Option<Box<E>>> {
    /// Known-empty one-to-one slot.
    pub fn empty_one() -> Self {
        Self::loaded(None)
    }
}

impl<E> Slot<Vec<E>> {
    /// Known-empty one-to-many slot.
    pub fn empty_many() -> Self {
        Self::loaded(Vec::new())
    }
}
