//! Zone: a rectangular screen region playing one call, with an optional
//! overlay widget on top.

use crate::engine::association::{link_one, load_one, unlink_one, AssociationHost};
use crate::engine::barrier::{fan_in, fan_in_all};
use crate::engine::clone::{
    clone_owned_one, duplicate_row, record_origin, relink_one, settle_clone, Cloneable,
};
use crate::engine::completeness::{
    enter, optional_one, required_one, settle, CompletenessAware, EvalPath,
};
use crate::engine::lifecycle::{cascade_one, Cascade};
use crate::engine::serialize::{expand_one, flat_object, ExpandPlan, Expandable};
use crate::model::call::Call;
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::relation::{OneSlot, Ownership, Relation, Slot};
use crate::model::widget::Widget;
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placement in screen pixels, origin top-left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Zone {
    meta: EntityMeta,
    pub fields: ZoneFields,
    call: OneSlot<Call>,
    overlay: OneSlot<Widget>,
    origin: OneSlot<Zone>,
}

impl Zone {
    pub const CALL: Relation =
        Relation::one("call", EntityKind::Zone, EntityKind::Call, Ownership::Owned);
    pub const OVERLAY: Relation = Relation::one(
        "overlay",
        EntityKind::Zone,
        EntityKind::Widget,
        Ownership::Referenced,
    );
    pub const ORIGIN: Relation = Relation::origin(EntityKind::Zone);

    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::from_parts(
            EntityMeta::transient(),
            ZoneFields {
                name: name.into(),
                x: 0,
                y: 0,
                width,
                height,
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

    pub async fn load_overlay(
        &mut self,
        repo: &EntityRepository,
    ) -> RepoResult<Option<&mut Widget>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::OVERLAY, &mut self.overlay).await
    }

    pub async fn set_overlay(
        &mut self,
        repo: &EntityRepository,
        widget: &mut Widget,
    ) -> RepoResult<()> {
        link_one(repo, self.id(), Self::OVERLAY, &mut self.overlay, widget).await
    }

    pub async fn unset_overlay(
        &mut self,
        repo: &EntityRepository,
        widget: &mut Widget,
    ) -> RepoResult<()> {
        unlink_one(repo, self.id(), Self::OVERLAY, &mut self.overlay, widget).await
    }

    pub async fn load_origin(&mut self, repo: &EntityRepository) -> RepoResult<Option<&mut Zone>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ORIGIN, &mut self.origin).await
    }
}

impl Persistable for Zone {
    type Fields = ZoneFields;
    const KIND: EntityKind = EntityKind::Zone;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &ZoneFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: ZoneFields) -> Self {
        Self {
            meta,
            fields,
            call: Slot::unknown(),
            overlay: Slot::unknown(),
            origin: Slot::unknown(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl AssociationHost for Zone {
    fn desynchronize(&mut self) {
        self.call.invalidate();
        self.overlay.invalidate();
        self.origin.invalidate();
    }

    fn reset_associations(&mut self) {
        self.call = Slot::empty_one();
        self.overlay = Slot::empty_one();
        self.origin = Slot::empty_one();
    }
}

impl CompletenessAware for Zone {
    fn has_required_fields(&self) -> bool {
        !self.fields.name.trim().is_empty() && self.fields.width > 0 && self.fields.height > 0
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
            let complete = fan_in_all([
                required_one(repo, id, Self::CALL, &mut self.call, &inner).boxed(),
                optional_one(repo, id, Self::OVERLAY, &mut self.overlay, &inner).boxed(),
            ])
            .await?;
            Ok(settle(self, complete))
        })
    }
}

impl Expandable for Zone {
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move {
            let mut object = flat_object(self)?;
            if let Some((id, inner)) = plan.descend(self.id()) {
                let rendered = fan_in([
                    expand_one(repo, id, Self::CALL, &mut self.call, &inner).boxed(),
                    expand_one(repo, id, Self::OVERLAY, &mut self.overlay, &inner).boxed(),
                ])
                .await?;
                for (relation, value) in [Self::CALL, Self::OVERLAY].iter().zip(rendered) {
                    object.insert(relation.name.to_string(), value);
                }
            }
            Ok(Value::Object(object))
        })
    }
}

impl Cloneable for Zone {
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
                clone_owned_one(
                    repo,
                    source_id,
                    clone_id,
                    Self::CALL,
                    &mut self.call,
                    &mut clone.call,
                )
                .boxed(),
                relink_one(
                    repo,
                    source_id,
                    clone_id,
                    Self::OVERLAY,
                    &mut self.overlay,
                    &mut clone.overlay,
                )
                .boxed(),
            ])
            .await?;
            settle_clone(&mut clone, source_id, repo).await?;
            Ok(clone)
        })
    }
}

impl Cascade for Zone {
    fn delete_owned<'a>(&'a mut self, repo: &'a EntityRepository) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async move {
            let id = self.require_id()?;
            cascade_one(repo, id, Self::CALL, &mut self.call).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Zone;
    use crate::engine::completeness::CompletenessAware;
    use crate::model::relation::Ownership;

    #[test]
    fn zero_sized_zone_lacks_required_fields() {
        assert!(Zone::new("ticker", 1920, 120).has_required_fields());
        assert!(!Zone::new("ticker", 0, 120).has_required_fields());
    }

    #[test]
    fn call_is_owned_and_overlay_is_referenced() {
        assert_eq!(Zone::CALL.ownership, Ownership::Owned);
        assert_eq!(Zone::OVERLAY.ownership, Ownership::Referenced);
    }
}
