//! Relative and absolute timelines: an owned, non-empty set of events.
//!
//! Both kinds share one implementation; the mode marker only picks the store
//! table and the relation owner.

use crate::engine::association::{link_many, load_many, load_one, unlink_many, AssociationHost};
use crate::engine::clone::{clone_owned_many, duplicate_row, record_origin, settle_clone, Cloneable};
use crate::engine::completeness::{enter, required_many, settle, CompletenessAware, EvalPath};
use crate::engine::lifecycle::{cascade_many, Cascade};
use crate::engine::serialize::{expand_many, flat_object, ExpandPlan, Expandable};
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::event::Event;
use crate::model::relation::{ManySlot, OneSlot, Ownership, Relation, Slot};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Scheduling mode of a timeline.
pub trait TimelineMode: Debug + Clone + Copy + Default + Send + Sync + 'static {
    const KIND: EntityKind;
}

/// Event starts are offsets from the moment the timeline starts playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relative;

/// Event starts are wall-clock epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Absolute;

impl TimelineMode for Relative {
    const KIND: EntityKind = EntityKind::RelativeTimeline;
}

impl TimelineMode for Absolute {
    const KIND: EntityKind = EntityKind::AbsoluteTimeline;
}

pub type RelativeTimeline = Timeline<Relative>;
pub type AbsoluteTimeline = Timeline<Absolute>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineFields {
    #[serde(default)]
    pub name: String,
    /// Restart from the first event once the last one has played.
    #[serde(default)]
    pub looping: bool,
}

#[derive(Debug, Clone)]
pub struct Timeline<M: TimelineMode> {
    meta: EntityMeta,
    pub fields: TimelineFields,
    events: ManySlot<Event>,
    origin: OneSlot<Timeline<M>>,
    mode: PhantomData<M>,
}

impl<M: TimelineMode> Timeline<M> {
    pub const EVENTS: Relation =
        Relation::many("events", M::KIND, EntityKind::Event, Ownership::Owned);
    pub const ORIGIN: Relation = Relation::origin(M::KIND);

    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(
            EntityMeta::transient(),
            TimelineFields {
                name: name.into(),
                looping: false,
            },
        )
    }

    pub async fn load_events(&mut self, repo: &EntityRepository) -> RepoResult<&mut Vec<Event>> {
        let id = self.require_id()?;
        load_many(repo, id, Self::EVENTS, &mut self.events).await
    }

    pub async fn add_event(
        &mut self,
        repo: &EntityRepository,
        event: &mut Event,
    ) -> RepoResult<()> {
        link_many(repo, self.id(), Self::EVENTS, &mut self.events, event).await
    }

    pub async fn remove_event(
        &mut self,
        repo: &EntityRepository,
        event: &mut Event,
    ) -> RepoResult<()> {
        unlink_many(repo, self.id(), Self::EVENTS, &mut self.events, event).await
    }

    pub async fn load_origin(&mut self, repo: &EntityRepository) -> RepoResult<Option<&mut Self>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ORIGIN, &mut self.origin).await
    }
}

impl<M: TimelineMode> Persistable for Timeline<M> {
    type Fields = TimelineFields;
    const KIND: EntityKind = M::KIND;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &TimelineFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: TimelineFields) -> Self {
        Self {
            meta,
            fields,
            events: Slot::unknown(),
            origin: Slot::unknown(),
            mode: PhantomData,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl<M: TimelineMode> AssociationHost for Timeline<M> {
    fn desynchronize(&mut self) {
        self.events.invalidate();
        self.origin.invalidate();
    }

    fn reset_associations(&mut self) {
        self.events = Slot::empty_many();
        self.origin = Slot::empty_one();
    }
}

impl<M: TimelineMode> CompletenessAware for Timeline<M> {
    fn has_required_fields(&self) -> bool {
        !self.fields.name.trim().is_empty()
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
            let events = required_many(repo, id, Self::EVENTS, &mut self.events, &inner).await?;
            Ok(settle(self, events))
        })
    }
}

impl<M: TimelineMode> Expandable for Timeline<M> {
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move {
            let mut object = flat_object(self)?;
            if let Some((id, inner)) = plan.descend(self.id()) {
                let events = expand_many(repo, id, Self::EVENTS, &mut self.events, &inner).await?;
                object.insert(Self::EVENTS.name.to_string(), events);
            }
            Ok(Value::Object(object))
        })
    }
}

impl<M: TimelineMode> Cloneable for Timeline<M> {
    fn clone_entity<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
    ) -> BoxFuture<'a, RepoResult<Self>> {
        Box::pin(async move {
            let source_id = self.require_id()?;
            let mut clone = duplicate_row(&*self, repo).await?;
            let clone_id = clone.require_id()?;
            record_origin(repo, clone_id, Self::ORIGIN, &mut clone.origin, &*self).await?;
            clone_owned_many(
                repo,
                source_id,
                clone_id,
                Self::EVENTS,
                &mut self.events,
                &mut clone.events,
            )
            .await?;
            settle_clone(&mut clone, source_id, repo).await?;
            Ok(clone)
        })
    }
}

impl<M: TimelineMode> Cascade for Timeline<M> {
    fn delete_owned<'a>(&'a mut self, repo: &'a EntityRepository) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async move {
            let id = self.require_id()?;
            cascade_many(repo, id, Self::EVENTS, &mut self.events).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AbsoluteTimeline, RelativeTimeline};
    use crate::model::entity::{EntityKind, Persistable};

    #[test]
    fn mode_selects_table_and_relation_owner() {
        assert_eq!(RelativeTimeline::KIND.table(), "relative_timelines");
        assert_eq!(AbsoluteTimeline::KIND.table(), "absolute_timelines");
        assert_eq!(AbsoluteTimeline::EVENTS.owner, EntityKind::AbsoluteTimeline);
        assert_eq!(RelativeTimeline::ORIGIN.target, EntityKind::RelativeTimeline);
    }
}
