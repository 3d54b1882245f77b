//! Widget: shared leaf content, only ever referenced.

use crate::engine::association::AssociationHost;
use crate::engine::completeness::{enter, settle, CompletenessAware, EvalPath};
use crate::engine::lifecycle::Cascade;
use crate::engine::serialize::{flat_object, ExpandPlan, Expandable};
use crate::model::entity::{require_text, EntityKind, EntityMeta, ModelError, Persistable};
use crate::repo::entity_repo::{EntityRepository, RepoResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetFields {
    #[serde(default)]
    pub name: String,
    /// Renderer key, e.g. `clock` or `weather`.
    #[serde(default)]
    pub widget_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    meta: EntityMeta,
    pub fields: WidgetFields,
}

impl Widget {
    pub fn new(name: impl Into<String>, widget_kind: impl Into<String>) -> Self {
        Self::from_parts(
            EntityMeta::transient(),
            WidgetFields {
                name: name.into(),
                widget_kind: widget_kind.into(),
                source: None,
            },
        )
    }
}

impl Persistable for Widget {
    type Fields = WidgetFields;
    const KIND: EntityKind = EntityKind::Widget;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn fields(&self) -> &WidgetFields {
        &self.fields
    }

    fn from_parts(meta: EntityMeta, fields: WidgetFields) -> Self {
        Self { meta, fields }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_text(Self::KIND, "name", &self.fields.name)
    }
}

impl AssociationHost for Widget {
    fn desynchronize(&mut self) {}

    fn reset_associations(&mut self) {}
}

impl CompletenessAware for Widget {
    fn has_required_fields(&self) -> bool {
        !self.fields.name.trim().is_empty() && !self.fields.widget_kind.trim().is_empty()
    }

    fn evaluate<'a>(
        &'a mut self,
        _repo: &'a EntityRepository,
        path: &'a EvalPath,
    ) -> BoxFuture<'a, RepoResult<bool>> {
        Box::pin(async move {
            if enter(self, path).is_none() {
                return Ok(false);
            }
            Ok(settle(self, true))
        })
    }
}

impl Expandable for Widget {
    fn expand_with<'a>(
        &'a mut self,
        _repo: &'a EntityRepository,
        _plan: &'a ExpandPlan,
    ) -> BoxFuture<'a, RepoResult<Value>> {
        Box::pin(async move { Ok(Value::Object(flat_object(self)?)) })
    }
}

impl Cascade for Widget {
    fn delete_owned<'a>(
        &'a mut self,
        _repo: &'a EntityRepository,
    ) -> BoxFuture<'a, RepoResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::Widget;
    use crate::model::entity::{ModelError, Persistable};

    #[test]
    fn validate_requires_name() {
        let widget = Widget::new("  ", "clock");
        assert!(matches!(
            widget.validate(),
            Err(ModelError::MissingField { field: "name", .. })
        ));
        assert!(Widget::new("lobby clock", "clock").validate().is_ok());
    }
}
