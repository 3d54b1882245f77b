//! Generic entity repository over the REST collaborator.
//!
//! # Responsibility
//! - Provide CRUD and association endpoint calls for every entity kind.
//! - Normalize store responses (object / array / empty) into typed results.
//!
//! # Invariants
//! - Write paths call `Persistable::validate()` before any request, except
//!   `update_complete`, which only fixes the cached flag.
//! - Id-requiring paths fail with `ModelError::Transient` before any request.
//! - A successful create leaves every association slot known-empty.

use crate::config::{ConfigError, StoreConfig};
use crate::engine::association::AssociationHost;
use crate::engine::serialize::Serializable;
use crate::model::entity::{EntityId, EntityKind, EntityMeta, ModelError, Persistable};
use crate::model::relation::Relation;
use crate::transport::{HttpTransport, RestRequest, RestTransport, TransportError};
use log::{debug, error, info};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every engine operation.
#[derive(Debug)]
pub enum RepoError {
    /// Contract violation, raised before any request.
    Model(ModelError),
    /// Collaborator failure, passed through untranslated.
    Transport(TransportError),
    /// Row requested by id does not exist.
    NotFound { kind: EntityKind, id: EntityId },
    /// Store returned data that cannot be decoded into the expected shape.
    InvalidData(String),
    Config(ConfigError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ModelError> for RepoError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<TransportError> for RepoError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl RepoError {
    /// Returns the contract violation, if this is one.
    pub fn as_model(&self) -> Option<&ModelError> {
        match self {
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

/// Store access shared by every engine component.
///
/// Cheap to clone; clones share one transport.
#[derive(Clone)]
pub struct EntityRepository {
    transport: Arc<dyn RestTransport>,
}

impl EntityRepository {
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self { transport }
    }

    /// Builds an HTTP-backed repository from explicit settings.
    pub fn from_config(config: &StoreConfig) -> RepoResult<Self> {
        let transport = HttpTransport::try_new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Creates the row and assigns id and timestamps to `entity`.
    ///
    /// # Errors
    /// - `AlreadyPersisted` when `entity` already has an id.
    /// - Any `validate()` failure.
    pub async fn create<E: AssociationHost>(&self, entity: &mut E) -> RepoResult<EntityId> {
        if let Some(id) = entity.id() {
            return Err(ModelError::AlreadyPersisted { kind: E::KIND, id }.into());
        }
        entity.validate()?;

        let body = row_body(entity.to_flat()?);
        let row = self
            .send(RestRequest::post(E::KIND.table(), body))
            .await?
            .ok_or_else(|| RepoError::InvalidData(format!("{} create returned no row", E::KIND)))?;

        let stored: EntityMeta = serde_json::from_value(row)?;
        let id = stored.id.ok_or_else(|| {
            RepoError::InvalidData(format!("{} create returned a row without id", E::KIND))
        })?;
        let meta = entity.meta_mut();
        meta.id = Some(id);
        meta.created_at = stored.created_at;
        meta.updated_at = stored.updated_at;
        entity.reset_associations();

        info!(
            "event=entity_create module=repo status=ok kind={} id={}",
            E::KIND,
            id
        );
        Ok(id)
    }

    /// Reads one row; every association slot of the result is unknown.
    pub async fn read<E: Persistable>(&self, id: EntityId) -> RepoResult<E> {
        let path = format!("{}/{}", E::KIND.table(), id);
        let row = match self.send(RestRequest::get(path)).await {
            Ok(Some(row)) => row,
            Ok(None) | Err(RepoError::Transport(TransportError::NotFound(_))) => {
                return Err(RepoError::NotFound { kind: E::KIND, id });
            }
            Err(err) => return Err(err),
        };
        E::from_flat(row)
    }

    /// Lists every row of `E`'s table.
    pub async fn list<E: Persistable>(&self) -> RepoResult<Vec<E>> {
        let rows = self.send(RestRequest::get(E::KIND.table())).await?;
        into_rows(rows)?.into_iter().map(E::from_flat).collect()
    }

    /// Writes own scalar fields and the complete flag.
    pub async fn update<E: Persistable>(&self, entity: &mut E) -> RepoResult<()> {
        entity.require_id()?;
        entity.validate()?;
        self.write_row(entity).await
    }

    /// Persists the cached `complete` flag.
    ///
    /// Fields are written back as loaded and are not validated, so a row that
    /// became incomplete through a blank field can still have its flag fixed.
    pub async fn update_complete<E: Persistable>(&self, entity: &mut E) -> RepoResult<()> {
        self.write_row(entity).await?;
        debug!(
            "event=complete_write module=repo status=ok kind={} complete={}",
            E::KIND,
            entity.is_complete()
        );
        Ok(())
    }

    async fn write_row<E: Persistable>(&self, entity: &mut E) -> RepoResult<()> {
        let id = entity.require_id()?;
        let path = format!("{}/{}", E::KIND.table(), id);
        let body = row_body(entity.to_flat()?);
        let row = match self.send(RestRequest::put(path, Some(body))).await {
            Ok(row) => row,
            Err(RepoError::Transport(TransportError::NotFound(_))) => {
                return Err(RepoError::NotFound { kind: E::KIND, id });
            }
            Err(err) => return Err(err),
        };

        if let Some(row) = row {
            let stored: EntityMeta = serde_json::from_value(row)?;
            entity.meta_mut().updated_at = stored.updated_at;
        }
        Ok(())
    }

    /// Deletes one row without cascading; see `engine::lifecycle` for cascades.
    pub async fn delete_row(&self, kind: EntityKind, id: EntityId) -> RepoResult<()> {
        let path = format!("{}/{}", kind.table(), id);
        match self.send(RestRequest::delete(path)).await {
            Ok(_) => Ok(()),
            Err(RepoError::Transport(TransportError::NotFound(_))) => {
                Err(RepoError::NotFound { kind, id })
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches the single target of a one-to-one relation.
    pub async fn fetch_one(
        &self,
        relation: Relation,
        owner_id: EntityId,
    ) -> RepoResult<Option<Value>> {
        let body = self.send(RestRequest::get(relation.endpoint(owner_id))).await?;
        match body {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(row)) => Ok(Some(Value::Object(row))),
            Some(Value::Array(mut rows)) => match rows.len() {
                0 => Ok(None),
                1 => Ok(rows.pop()),
                count => Err(RepoError::InvalidData(format!(
                    "relation `{}` on {owner_id} returned {count} rows, expected at most one",
                    relation.name
                ))),
            },
            Some(other) => Err(RepoError::InvalidData(format!(
                "relation `{}` returned non-object value: {other}",
                relation.name
            ))),
        }
    }

    /// Fetches every target of a one-to-many relation.
    pub async fn fetch_many(
        &self,
        relation: Relation,
        owner_id: EntityId,
    ) -> RepoResult<Vec<Value>> {
        let body = self.send(RestRequest::get(relation.endpoint(owner_id))).await?;
        into_rows(body)
    }

    pub async fn put_link(
        &self,
        relation: Relation,
        owner_id: EntityId,
        target_id: EntityId,
    ) -> RepoResult<()> {
        self.send(RestRequest::put(relation.link_endpoint(owner_id, target_id), None))
            .await?;
        Ok(())
    }

    pub async fn delete_link(
        &self,
        relation: Relation,
        owner_id: EntityId,
        target_id: EntityId,
    ) -> RepoResult<()> {
        self.send(RestRequest::delete(relation.link_endpoint(owner_id, target_id)))
            .await?;
        Ok(())
    }

    async fn send(&self, request: RestRequest) -> RepoResult<Option<Value>> {
        let started_at = Instant::now();
        let method = request.method;
        let path = request.path.clone();

        match self.transport.send(request).await {
            Ok(body) => {
                debug!(
                    "event=store_request module=repo status=ok method={} path={} duration_ms={}",
                    method,
                    path,
                    started_at.elapsed().as_millis()
                );
                Ok(body)
            }
            Err(err) => {
                error!(
                    "event=store_request module=repo status=error method={} path={} duration_ms={} error={}",
                    method,
                    path,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

/// Drops store-owned header keys from an outgoing row.
fn row_body(mut flat: Value) -> Value {
    if let Value::Object(row) = &mut flat {
        row.remove("id");
        row.remove("createdAt");
        row.remove("updatedAt");
    }
    flat
}

fn into_rows(body: Option<Value>) -> RepoResult<Vec<Value>> {
    match body {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => Ok(rows),
        Some(Value::Object(row)) => Ok(vec![Value::Object(row)]),
        Some(other) => Err(RepoError::InvalidData(format!(
            "expected array of rows, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{into_rows, row_body};
    use serde_json::json;

    #[test]
    fn row_body_strips_store_owned_keys() {
        let body = row_body(json!({
            "id": "x",
            "createdAt": 1,
            "updatedAt": 2,
            "complete": true,
            "name": "lobby"
        }));
        assert_eq!(body, json!({ "complete": true, "name": "lobby" }));
    }

    #[test]
    fn into_rows_accepts_single_object_and_empty() {
        assert!(into_rows(None).unwrap().is_empty());
        assert_eq!(into_rows(Some(json!({ "a": 1 }))).unwrap().len(), 1);
        assert!(into_rows(Some(json!(3))).is_err());
    }
}
