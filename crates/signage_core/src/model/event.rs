//! Event: a scheduled slot on a timeline that plays one call.
//!
//! # Invariants
//! - `call` is referenced: cloning an event re-links the same call and
//!   deleting it never deletes the call.
//! - Complete iff `name` is set, `start_ms` is set, `duration_ms > 0` and the
//!   call is present and complete.

use crate::engine::association::{link_one, load_one, unlink_one, AssociationHost};
use crate::engine::clone::{duplicate_row, record_origin, relink_one, settle_clone, Cloneable};
use crate::engine::completeness::{enter, required_one, settle, CompletenessAware, EvalPath};
use crate::engine::lifecycle::Cascade;
use crate::engine::serialize::{expand_one, flat_object, ExpandPlan, Expandable};
use crate::model::call::Call;
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::relation::{OneSlot, Ownership, Relation, Slot};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    #[serde(default)]
    pub name: String,
    /// Offset from the timeline start, or epoch ms on absolute timelines.
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default)]
    pub duration_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Event {
    meta: EntityMeta,
    pub fields: EventFields,
    call: OneSlot<Call>,
    origin: OneSlot<Event>,
}

impl Event {
    pub const CALL: Relation = Relation::one(
        "call",
        EntityKind::Event,
        EntityKind::Call,
        Ownership::Referenced,
    );
    pub const ORIGIN: Relation = Relation::origin(EntityKind::Event);

    pub fn new(name: impl Into<String>, start_ms: i64, duration_ms: i64) -> Self {
        Self::from_parts(
            EntityMeta::transient(),
            EventFields {
                name: name.into(),
                start_ms: Some(start_ms),
                duration_ms,
            },
        )
    }

    pub async fn load_call(&mut self, repo: &EntityRepository) -> RepoResult<Option<&mut Call>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::CALL, &mut self.call).await
    }

    pub async fn set_call(&mut self, repo: &EntityRepository, call: &mut Call) -> RepoResult<()> {
        link_one(repo, self.id(), Self::CALL, &mut self.call, call).await
    }

    pub async fn unset_call(&mut self, repo: &EntityRepository, call: &mut Call) -> RepoResult<()> {
        unlink_one(repo, self.id(), Self::CALL, &mut self.call, call).await
    }

    pub async fn load_origin(&mut self, repo: &EntityRepository) -> RepoResult<Option<&mut Event>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ORIGIN, &mut self.origin).await
    }
}

impl Persistable for Event {
    type Fields = EventFields;
    const KIND: EntityKind = EntityKind::Event;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &EventFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: EventFields) -> Self {
        Self {
            meta,
            fields,
            call: Slot::unknown(),
            origin: Slot::unknown(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl AssociationHost for Event {
    fn desynchronize(&mut self) {
        self.call.invalidate();
        self.origin.invalidate();
    }

    fn reset_associations(&mut self) {
        self.call = Slot::empty_one();
        self.origin = Slot::empty_one();
    }
}

impl CompletenessAware for Event {
    fn has_required_fields(&self) -> bool {
        !self.fields.name.trim().is_empty()
            && self.fields.start_ms.is_some()
            && self.fields.duration_ms > 0
    }

    fn evaluate<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        path: &'a EvalPath,
    ) -> BoxFuture<'a, RepoResult<bool>> {
        Box::pin(async move {
            let Some((id, inner)) = enter(self, path) else {
                return Ok(false);
            };
            let call = required_one(repo, id, Self::CALL, &mut self.call, &inner).await?;
            Ok(settle(self, call))
        })
    }
}

impl Expandable for Event {
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move {
            let mut object = flat_object(self)?;
            if let Some((id, inner)) = plan.descend(self.id()) {
                let call = expand_one(repo, id, Self::CALL, &mut self.call, &inner).await?;
                object.insert(Self::CALL.name.to_string(), call);
            }
            Ok(Value::Object(object))
        })
    }
}

impl Cloneable for Event {
    fn clone_entity<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
    ) -> BoxFuture<'a, RepoResult<Self>> {
        Box::pin(async move {
            let source_id = self.require_id()?;
            let mut clone = duplicate_row(&*self, repo).await?;
            let clone_id = clone.require_id()?;
            record_origin(repo, clone_id, Self::ORIGIN, &mut clone.origin, &*self).await?;
            relink_one(
                repo,
                source_id,
                clone_id,
                Self::CALL,
                &mut self.call,
                &mut clone.call,
            )
            .await?;
            settle_clone(&mut clone, source_id, repo).await?;
            Ok(clone)
        })
    }
}

impl Cascade for Event {
    fn delete_owned<'a>(
        &'a mut self,
        _repo: &'a EntityRepository,
    ) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
