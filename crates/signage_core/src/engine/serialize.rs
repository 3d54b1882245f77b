//! Flat and expanded JSON projections.
//!
//! # Responsibility
//! - Project an entity onto its flat row (header + own scalar fields).
//! - Expand association layers up to a depth limit, optionally truncating
//!   the last layer to bare ids.
//!
//! # Invariants
//! - `from_flat(to_flat(e))` reproduces the same header and fields.
//! - Expansion terminates: every layer lowers the remaining depth, and an
//!   entity already on the current path is rendered as its bare id.

use crate::engine::association::{load_many, load_one, AssociationHost};
use crate::engine::barrier::fan_in;
use crate::model::entity::{EntityId, EntityMeta, Persistable};
use crate::model::relation::{ManySlot, OneSlot, Relation};
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat row conversion.
pub trait Serializable: Sized {
    fn to_flat(&self) -> RepoResult<Value>;
    fn from_flat(value: Value) -> RepoResult<Self>;
}

#[derive(Serialize)]
struct FlatRowRef<'a, F> {
    #[serde(flatten)]
    meta: &'a EntityMeta,
    #[serde(flatten)]
    fields: &'a F,
}

#[derive(Deserialize)]
#[serde(bound = "F: DeserializeOwned")]
struct FlatRow<F> {
    #[serde(flatten)]
    meta: EntityMeta,
    #[serde(flatten)]
    fields: F,
}

impl<E: Persistable> Serializable for E {
    fn to_flat(&self) -> RepoResult<Value> {
        let row = FlatRowRef {
            meta: self.meta(),
            fields: self.fields(),
        };
        Ok(serde_json::to_value(row)?)
    }

    fn from_flat(value: Value) -> RepoResult<Self> {
        if !value.is_object() {
            return Err(RepoError::InvalidData(format!(
                "{} row must be a JSON object, got {value}",
                E::KIND
            )));
        }
        let row: FlatRow<E::Fields> = serde_json::from_value(value)?;
        Ok(E::from_parts(row.meta, row.fields))
    }
}

/// Caller-facing expansion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Number of association layers to expand below the root.
    pub depth: usize,
    /// Render the last expanded layer as bare ids instead of flat rows.
    pub ids_only: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self::one_layer()
    }
}

impl ExpandOptions {
    pub fn one_layer() -> Self {
        Self {
            depth: 1,
            ids_only: false,
        }
    }

    pub fn ids_only() -> Self {
        Self {
            depth: 1,
            ids_only: true,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// Per-node expansion state: remaining layers and the ids on the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandPlan {
    remaining: usize,
    ids_only: bool,
    path: Vec<EntityId>,
}

impl ExpandPlan {
    pub fn new(options: ExpandOptions) -> Self {
        Self {
            remaining: options.depth,
            ids_only: options.ids_only,
            path: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Plan for the children of entity `id`, or `None` when its associations
    /// are not expanded.
    pub fn descend(&self, id: Option<EntityId>) -> Option<(EntityId, ExpandPlan)> {
        let id = id?;
        if self.remaining == 0 {
            return None;
        }
        let mut path = self.path.clone();
        path.push(id);
        Some((
            id,
            ExpandPlan {
                remaining: self.remaining - 1,
                ids_only: self.ids_only,
                path,
            },
        ))
    }

    /// Whether a child `id` under this plan is rendered as its bare id.
    pub fn renders_as_id(&self, id: EntityId) -> bool {
        self.path.contains(&id) || (self.remaining == 0 && self.ids_only)
    }
}

/// Expanded projection capability.
pub trait Expandable: AssociationHost {
    /// Renders `self` under `plan`: the flat row plus expanded associations.
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>>;
}

/// Expanded JSON of `entity`.
pub async fn to_expanded<E: Expandable>(
    entity: &mut E,
    repo: &EntityRepository,
    options: ExpandOptions,
) -> RepoResult<Value> {
    let plan = ExpandPlan::new(options);
    entity.expand_with(repo, &plan).await
}

/// Flat row as a mutable JSON map, ready for association keys.
pub fn flat_object<E: Persistable>(entity: &E) -> RepoResult<Map<String, Value>> {
    match entity.to_flat()? {
        Value::Object(map) => Ok(map),
        other => Err(RepoError::InvalidData(format!(
            "{} projected to a non-object value: {other}",
            E::KIND
        ))),
    }
}

/// Renders a one-to-one relation; `null` when absent.
pub async fn expand_one<E: Expandable>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut OneSlot<E>,
    plan: &ExpandPlan,
) -> RepoResult<Value> {
    match load_one(repo, owner_id, relation, slot).await? {
        Some(target) => render(target, repo, plan).await,
        None => Ok(Value::Null),
    }
}

/// Renders a one-to-many relation as an array.
pub async fn expand_many<E: Expandable>(
    repo: &EntityRepository,
    owner_id: EntityId,
    relation: Relation,
    slot: &mut ManySlot<E>,
    plan: &ExpandPlan,
) -> RepoResult<Value> {
    let members = load_many(repo, owner_id, relation, slot).await?;
    let rendered = fan_in(
        members
            .iter_mut()
            .map(|member| render(member, repo, plan).boxed()),
    )
    .await?;
    Ok(Value::Array(rendered))
}

async fn render<E: Expandable>(
    target: &mut E,
    repo: &EntityRepository,
    plan: &ExpandPlan,
) -> RepoResult<Value> {
    match target.id() {
        Some(id) if plan.renders_as_id(id) => Ok(Value::String(id.to_string())),
        _ => target.expand_with(repo, plan).await,
    }
}
