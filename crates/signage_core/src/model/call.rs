//! Call: what a zone or event plays, one of a widget or a timeline.
//!
//! # Invariants
//! - Exactly one of `widget`, `relativeTimeline` and `absoluteTimeline` must
//!   be present (and complete) for the call to be complete.
//! - Timelines are owned by the call; widgets are shared and only re-linked.

use crate::engine::association::{link_one, load_one, unlink_one, AssociationHost};
use crate::engine::barrier::fan_in;
use crate::engine::clone::{
    clone_owned_one, duplicate_row, record_origin, relink_one, settle_clone, Cloneable,
};
use crate::engine::completeness::{
    enter, required_one, settle, single_alternative, CompletenessAware, EvalPath,
};
use crate::engine::lifecycle::{cascade_one, Cascade};
use crate::engine::serialize::{expand_one, flat_object, ExpandPlan, Expandable};
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::relation::{OneSlot, Ownership, Relation, Slot};
use crate::model::timeline::{AbsoluteTimeline, RelativeTimeline};
use crate::model::widget::Widget;
use crate::repo::entity_repo::{EntityRepository, RepoError, RepoResult};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFields {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Call {
    meta: EntityMeta,
    pub fields: CallFields,
    widget: OneSlot<Widget>,
    relative_timeline: OneSlot<RelativeTimeline>,
    absolute_timeline: OneSlot<AbsoluteTimeline>,
    origin: OneSlot<Call>,
}

impl Call {
    pub const WIDGET: Relation = Relation::one(
        "widget",
        EntityKind::Call,
        EntityKind::Widget,
        Ownership::Referenced,
    );
    pub const RELATIVE_TIMELINE: Relation = Relation::one(
        "relativeTimeline",
        EntityKind::Call,
        EntityKind::RelativeTimeline,
        Ownership::Owned,
    );
    pub const ABSOLUTE_TIMELINE: Relation = Relation::one(
        "absoluteTimeline",
        EntityKind::Call,
        EntityKind::AbsoluteTimeline,
        Ownership::Owned,
    );
    pub const ORIGIN: Relation = Relation::origin(EntityKind::Call);

    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(EntityMeta::transient(), CallFields { name: name.into() })
    }

    pub async fn load_widget(
        &mut self,
        repo: &EntityRepository,
    ) -> RepoResult<Option<&mut Widget>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::WIDGET, &mut self.widget).await
    }

    pub async fn set_widget(
        &mut self,
        repo: &EntityRepository,
        widget: &mut Widget,
    ) -> RepoResult<()> {
        link_one(repo, self.id(), Self::WIDGET, &mut self.widget, widget).await
    }

    pub async fn unset_widget(
        &mut self,
        repo: &EntityRepository,
        widget: &mut Widget,
    ) -> RepoResult<()> {
        unlink_one(repo, self.id(), Self::WIDGET, &mut self.widget, widget).await
    }

    pub async fn load_relative_timeline(
        &mut self,
        repo: &EntityRepository,
    ) -> RepoResult<Option<&mut RelativeTimeline>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::RELATIVE_TIMELINE, &mut self.relative_timeline).await
    }

    pub async fn set_relative_timeline(
        &mut self,
        repo: &EntityRepository,
        timeline: &mut RelativeTimeline,
    ) -> RepoResult<()> {
        link_one(
            repo,
            self.id(),
            Self::RELATIVE_TIMELINE,
            &mut self.relative_timeline,
            timeline,
        )
        .await
    }

    pub async fn unset_relative_timeline(
        &mut self,
        repo: &EntityRepository,
        timeline: &mut RelativeTimeline,
    ) -> RepoResult<()> {
        unlink_one(
            repo,
            self.id(),
            Self::RELATIVE_TIMELINE,
            &mut self.relative_timeline,
            timeline,
        )
        .await
    }

    pub async fn load_absolute_timeline(
        &mut self,
        repo: &EntityRepository,
    ) -> RepoResult<Option<&mut AbsoluteTimeline>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ABSOLUTE_TIMELINE, &mut self.absolute_timeline).await
    }

    pub async fn set_absolute_timeline(
        &mut self,
        repo: &EntityRepository,
        timeline: &mut AbsoluteTimeline,
    ) -> RepoResult<()> {
        link_one(
            repo,
            self.id(),
            Self::ABSOLUTE_TIMELINE,
            &mut self.absolute_timeline,
            timeline,
        )
        .await
    }

    pub async fn unset_absolute_timeline(
        &mut self,
        repo: &EntityRepository,
        timeline: &mut AbsoluteTimeline,
    ) -> RepoResult<()> {
        unlink_one(
            repo,
            self.id(),
            Self::ABSOLUTE_TIMELINE,
            &mut self.absolute_timeline,
            timeline,
        )
        .await
    }

    pub async fn load_origin(&mut self, repo: &EntityRepository) -> RepoResult<Option<&mut Call>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ORIGIN, &mut self.origin).await
    }
}

impl Persistable for Call {
    type Fields = CallFields;
    const KIND: EntityKind = EntityKind::Call;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &CallFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: CallFields) -> Self {
        Self {
            meta,
            fields,
            widget: Slot::unknown(),
            relative_timeline: Slot::unknown(),
            absolute_timeline: Slot::unknown(),
            origin: Slot::unknown(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl AssociationHost for Call {
    fn desynchronize(&mut self) {
        self.widget.invalidate();
        self.relative_timeline.invalidate();
        self.absolute_timeline.invalidate();
        self.origin.invalidate();
    }

    fn reset_associations(&mut self) {
        self.widget = Slot::empty_one();
        self.relative_timeline = Slot::empty_one();
        self.absolute_timeline = Slot::empty_one();
        self.origin = Slot::empty_one();
    }
}

impl CompletenessAware for Call {
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
            let widget = &mut self.widget;
            let relative = &mut self.relative_timeline;
            let absolute = &mut self.absolute_timeline;
            let present = fan_in([
                async move {
                    let target = load_one(repo, id, Self::WIDGET, widget).await?;
                    Ok::<_, RepoError>(target.is_some())
                }
                .boxed(),
                async move {
                    let target = load_one(repo, id, Self::RELATIVE_TIMELINE, relative).await?;
                    Ok::<_, RepoError>(target.is_some())
                }
                .boxed(),
                async move {
                    let target = load_one(repo, id, Self::ABSOLUTE_TIMELINE, absolute).await?;
                    Ok::<_, RepoError>(target.is_some())
                }
                .boxed(),
            ])
            .await?;
            let complete = match single_alternative(&present) {
                Some(0) => {
                    required_one(repo, id, Self::WIDGET, &mut self.widget, &inner).await?
                }
                Some(1) => {
                    required_one(
                        repo,
                        id,
                        Self::RELATIVE_TIMELINE,
                        &mut self.relative_timeline,
                        &inner,
                    )
                    .await?
                }
                Some(2) => {
                    required_one(
                        repo,
                        id,
                        Self::ABSOLUTE_TIMELINE,
                        &mut self.absolute_timeline,
                        &inner,
                    )
                    .await?
                }
                _ => false,
            };
            Ok(settle(self, complete))
        })
    }
}

impl Expandable for Call {
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move {
            let mut object = flat_object(self)?;
            if let Some((id, inner)) = plan.descend(self.id()) {
                let rendered = fan_in([
                    expand_one(repo, id, Self::WIDGET, &mut self.widget, &inner).boxed(),
                    expand_one(
                        repo,
                        id,
                        Self::RELATIVE_TIMELINE,
                        &mut self.relative_timeline,
                        &inner,
                    )
                    .boxed(),
                    expand_one(
                        repo,
                        id,
                        Self::ABSOLUTE_TIMELINE,
                        &mut self.absolute_timeline,
                        &inner,
                    )
                    .boxed(),
                ])
                .await?;
                let relations = [Self::WIDGET, Self::RELATIVE_TIMELINE, Self::ABSOLUTE_TIMELINE];
                for (relation, value) in relations.iter().zip(rendered) {
                    object.insert(relation.name.to_string(), value);
                }
            }
            Ok(Value::Object(object))
        })
    }
}

impl Cloneable for Call {
    fn clone_entity<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
    ) -> BoxFuture<'a, RepoResult<Self>> {
        Box::pin(async move {
            let source_id = self.require_id()?;
            let mut clone = duplicate_row(&*self, repo).await?;
            let clone_id = clone.require_id()?;
            record_origin(repo, clone_id, Self::ORIGIN, &mut clone.origin, &*self).await?;
            fan_in([
                relink_one(
                    repo,
                    source_id,
                    clone_id,
                    Self::WIDGET,
                    &mut self.widget,
                    &mut clone.widget,
                )
                .boxed(),
                clone_owned_one(
                    repo,
                    source_id,
                    clone_id,
                    Self::RELATIVE_TIMELINE,
                    &mut self.relative_timeline,
                    &mut clone.relative_timeline,
                )
                .boxed(),
                clone_owned_one(
                    repo,
                    source_id,
                    clone_id,
                    Self::ABSOLUTE_TIMELINE,
                    &mut self.absolute_timeline,
                    &mut clone.absolute_timeline,
                )
                .boxed(),
            ])
            .await?;
            settle_clone(&mut clone, source_id, repo).await?;
            Ok(clone)
        })
    }
}

impl Cascade for Call {
    fn delete_owned<'a>(&'a mut self, repo: &'a EntityRepository) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async move {
            let id = self.require_id()?;
            fan_in([
                cascade_one(repo, id, Self::RELATIVE_TIMELINE, &mut self.relative_timeline).boxed(),
                cascade_one(repo, id, Self::ABSOLUTE_TIMELINE, &mut self.absolute_timeline).boxed(),
            ])
            .await?;
            Ok(())
        })
    }
}
