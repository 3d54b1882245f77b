//! Entity identity and persistence contract.
//!
//! # Responsibility
//! - Define the identity/timestamp/completeness header shared by every kind.
//! - Define the `Persistable` capability every entity kind implements.
//! - Define `ModelError`, the fail-fast contract violation type.
//!
//! # Invariants
//! - `id` is `None` until the store has accepted a create.
//! - Operations that need an id return `ModelError::Transient` before issuing
//!   any request.

use crate::model::relation::{Cardinality, Ownership};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

/// Store-assigned identifier.
pub type EntityId = Uuid;

/// Every entity kind known to the engine, one store table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Profile,
    Zone,
    Call,
    Widget,
    RelativeTimeline,
    AbsoluteTimeline,
    Event,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        Self::Profile,
        Self::Zone,
        Self::Call,
        Self::Widget,
        Self::RelativeTimeline,
        Self::AbsoluteTimeline,
        Self::Event,
    ];

    /// Store table name used in every endpoint path.
    pub fn table(self) -> &'static str {
        match self {
            Self::Profile => "profiles",
            Self::Zone => "zones",
            Self::Call => "calls",
            Self::Widget => "widgets",
            Self::RelativeTimeline => "relative_timelines",
            Self::AbsoluteTimeline => "absolute_timelines",
            Self::Event => "events",
        }
    }

    /// PascalCase label used in socket event names.
    pub fn label(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Zone => "Zone",
            Self::Call => "Call",
            Self::Widget => "Widget",
            Self::RelativeTimeline => "RelativeTimeline",
            Self::AbsoluteTimeline => "AbsoluteTimeline",
            Self::Event => "Event",
        }
    }

    /// Looks a kind up by its socket label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Key carrying the entity id in description requests, e.g. `zoneId`.
    pub fn id_key(self) -> String {
        let label = self.label();
        let mut key = String::with_capacity(label.len() + 2);
        let mut chars = label.chars();
        if let Some(first) = chars.next() {
            key.push(first.to_ascii_lowercase());
        }
        key.extend(chars);
        key.push_str("Id");
        key
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity header carried by every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Epoch milliseconds, assigned by the store.
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Epoch milliseconds, assigned by the store.
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Cached result of the last completeness evaluation.
    #[serde(default)]
    pub complete: bool,
}

impl EntityMeta {
    /// Header for an entity that has not been created yet.
    pub fn transient() -> Self {
        Self::default()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Contract violation detected before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Mandatory scalar field is missing or blank.
    MissingField {
        kind: EntityKind,
        field: &'static str,
    },
    /// Entity has no id yet.
    Transient { kind: EntityKind },
    /// `create` called on an entity that already has an id.
    AlreadyPersisted { kind: EntityKind, id: EntityId },
    /// One-to-one relation already holds a link.
    AlreadySet {
        relation: &'static str,
        owner_id: EntityId,
    },
    /// One-to-one relation holds no link, or not the requested one.
    NotSet {
        relation: &'static str,
        owner_id: EntityId,
    },
    /// Target is already a member of a one-to-many relation.
    DuplicateMember {
        relation: &'static str,
        target_id: EntityId,
    },
    /// Target is not a member of a one-to-many relation.
    NotMember {
        relation: &'static str,
        target_id: EntityId,
    },
    /// Relation passed to a helper for the other cardinality.
    CardinalityMismatch {
        relation: &'static str,
        expected: Cardinality,
    },
    /// Relation passed to a helper for the other ownership policy.
    OwnershipMismatch {
        relation: &'static str,
        expected: Ownership,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { kind, field } => {
                write!(f, "{kind} requires field `{field}`")
            }
            Self::Transient { kind } => write!(f, "{kind} has not been persisted yet"),
            Self::AlreadyPersisted { kind, id } => {
                write!(f, "{kind} is already persisted with id {id}")
            }
            Self::AlreadySet { relation, owner_id } => {
                write!(f, "relation `{relation}` is already set on {owner_id}")
            }
            Self::NotSet { relation, owner_id } => {
                write!(f, "relation `{relation}` is not set on {owner_id}")
            }
            Self::DuplicateMember {
                relation,
                target_id,
            } => write!(f, "{target_id} is already a member of `{relation}`"),
            Self::NotMember {
                relation,
                target_id,
            } => write!(f, "{target_id} is not a member of `{relation}`"),
            Self::CardinalityMismatch { relation, expected } => {
                write!(f, "relation `{relation}` is not {expected}")
            }
            Self::OwnershipMismatch { relation, expected } => {
                write!(f, "relation `{relation}` is not {expected}")
            }
        }
    }
}

impl Error for ModelError {}

/// Row-level persistence capability.
///
/// Implementors expose their identity header and scalar field record; the
/// repository turns those into store requests.
pub trait Persistable: Sized + Send + Sync {
    /// Own scalar fields, serialized next to the identity header.
    type Fields: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync;

    const KIND: EntityKind;

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
    fn fields(&self) -> &Self::Fields;

    /// Builds an instance with every association slot unknown.
    fn from_parts(meta: EntityMeta, fields: Self::Fields) -> Self;

    /// Checks mandatory fields before the row is written.
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }

    fn id(&self) -> Option<EntityId> {
        self.meta().id
    }

    /// Returns the id or fails fast for a transient entity.
    fn require_id(&self) -> Result<EntityId, ModelError> {
        self.id().ok_or(ModelError::Transient { kind: Self::KIND })
    }

    fn is_complete(&self) -> bool {
        self.meta().complete
    }
}

/// Fails with `MissingField` when `value` is blank after trim.
pub(crate) fn require_text(
    kind: EntityKind,
    field: &'static str,
    value: &str,
) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::MissingField { kind, field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, EntityMeta};

    #[test]
    fn id_key_uses_lower_camel_label() {
        assert_eq!(EntityKind::Zone.id_key(), "zoneId");
        assert_eq!(EntityKind::RelativeTimeline.id_key(), "relativeTimelineId");
    }

    #[test]
    fn from_label_round_trips_every_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(EntityKind::from_label("Display"), None);
    }

    #[test]
    fn transient_meta_has_no_id() {
        let meta = EntityMeta::transient();
        assert!(!meta.is_persisted());
        assert!(!meta.complete);
    }
}
