//! Profile: a screen layout made of owned zones.

use crate::engine::association::{link_many, load_many, load_one, unlink_many, AssociationHost};
use crate::engine::clone::{clone_owned_many, duplicate_row, record_origin, settle_clone, Cloneable};
use crate::engine::completeness::{enter, required_many, settle, CompletenessAware, EvalPath};
use crate::engine::lifecycle::{cascade_many, Cascade};
use crate::engine::serialize::{expand_many, flat_object, ExpandPlan, Expandable};
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::relation::{ManySlot, OneSlot, Ownership, Relation, Slot};
use crate::model::zone::Zone;
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[serde(default)]
    pub name: String,
    /// Target screen resolution in pixels; `0` when unspecified.
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Profile {
    meta: EntityMeta,
    pub fields: ProfileFields,
    zones: ManySlot<Zone>,
    origin: OneSlot<Profile>,
}

impl Profile {
    pub const ZONES: Relation =
        Relation::many("zones", EntityKind::Profile, EntityKind::Zone, Ownership::Owned);
    pub const ORIGIN: Relation = Relation::origin(EntityKind::Profile);

    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(
            EntityMeta::transient(),
            ProfileFields {
                name: name.into(),
                ..ProfileFields::default()
            },
        )
    }

    pub async fn load_zones(&mut self, repo: &EntityRepository) -> RepoResult<&mut Vec<Zone>> {
        let id = self.require_id()?;
        load_many(repo, id, Self::ZONES, &mut self.zones).await
    }

    pub async fn add_zone(&mut self, repo: &EntityRepository, zone: &mut Zone) -> RepoResult<()> {
        link_many(repo, self.id(), Self::ZONES, &mut self.zones, zone).await
    }

    pub async fn remove_zone(
        &mut self,
        repo: &EntityRepository,
        zone: &mut Zone,
    ) -> RepoResult<()> {
        unlink_many(repo, self.id(), Self::ZONES, &mut self.zones, zone).await
    }

    pub async fn load_origin(
        &mut self,
        repo: &EntityRepository,
    ) -> RepoResult<Option<&mut Profile>> {
        let id = self.require_id()?;
        load_one(repo, id, Self::ORIGIN, &mut self.origin).await
    }
}

impl Persistable for Profile {
    type Fields = ProfileFields;
    const KIND: EntityKind = EntityKind::Profile;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &ProfileFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: ProfileFields) -> Self {
        Self {
            meta,
            fields,
            zones: Slot::unknown(),
            origin: Slot::unknown(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl AssociationHost for Profile {
    fn desynchronize(&mut self) {
        self.zones.invalidate();
        self.origin.invalidate();
    }

    fn reset_associations(&mut self) {
        self.zones = Slot::empty_many();
        self.origin = Slot::empty_one();
    }
}

impl CompletenessAware for Profile {
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
            let zones = required_many(repo, id, Self::ZONES, &mut self.zones, &inner).await?;
            Ok(settle(self, zones))
        })
    }
}

impl Expandable for Profile {
    fn expand_with<'a>(
        &'a mut self,
        repo: &'a EntityRepository,
        plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move {
            let mut object = flat_object(self)?;
            if let Some((id, inner)) = plan.descend(self.id()) {
                let zones = expand_many(repo, id, Self::ZONES, &mut self.zones, &inner).await?;
                object.insert(Self::ZONES.name.to_string(), zones);
            }
            Ok(Value::Object(object))
        })
    }
}

impl Cloneable for Profile {
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
                Self::ZONES,
                &mut self.zones,
                &mut clone.zones,
            )
            .await?;
            settle_clone(&mut clone, source_id, repo).await?;
            Ok(clone)
        })
    }
}

impl Cascade for Profile {
    fn delete_owned<'a>(&'a mut self, repo: &'a EntityRepository) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async move {
            let id = self.require_id()?;
            cascade_many(repo, id, Self::ZONES, &mut self.zones).await
        })
    }
}
