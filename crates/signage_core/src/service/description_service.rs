//! Description use-case service for socket-facing clients.
//!
//! # Responsibility
//! - Answer `Retrieve<Entity>Description` requests with expanded JSON.
//! - Assemble the composite hash description of a profile sub-graph.
//!
//! # Invariants
//! - Every request yields at least one envelope; failures are reported as
//!   `status = "error"` envelopes, never dropped.
//! - The hash description emits its two envelopes only after every zone
//!   branch has joined.

use crate::engine::barrier::fan_in;
use crate::engine::serialize::{to_expanded, ExpandOptions, Expandable};
use crate::model::call::Call;
use crate::model::entity::{EntityId, EntityKind};
use crate::model::event::Event;
use crate::model::profile::Profile;
use crate::model::timeline::{AbsoluteTimeline, RelativeTimeline};
use crate::model::widget::Widget;
use crate::model::zone::Zone;
use crate::repo::entity_repo::{EntityRepository, RepoError};
use log::{error, info};
use serde::Serialize;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const REQUEST_PREFIX: &str = "Retrieve";
const RESPONSE_SUFFIX: &str = "Description";
const HASH_REQUEST: &str = "RetrieveHashDescription";
const HASH_RESPONSE: &str = "HashDescription";
const PROFILE_RESPONSE: &str = "ProfileDescription";
const ZONE_CONTENT_RESPONSE: &str = "ZoneContentDescription";

/// Zone -> call -> timeline -> events, with each event's call as an id.
const ZONE_CONTENT_DEPTH: usize = 4;

/// Outcome marker carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionStatus {
    Ok,
    Error,
}

/// Response event sent back to the requesting client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionEnvelope {
    /// Response event name, e.g. `ZoneDescription`.
    pub event: String,
    pub status: DescriptionStatus,
    pub data: Value,
}

impl DescriptionEnvelope {
    fn ok(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            status: DescriptionStatus::Ok,
            data,
        }
    }

    fn error(event: impl Into<String>, err: &DescriptionError) -> Self {
        Self {
            event: event.into(),
            status: DescriptionStatus::Error,
            data: json!({ "message": err.to_string() }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DescriptionStatus::Ok
    }
}

/// Errors from description requests.
#[derive(Debug)]
pub enum DescriptionError {
    /// Event name is not a known description request.
    UnknownEvent(String),
    /// Payload lacks the id key for the requested kind.
    MissingId { key: String },
    /// Id value is not a valid identifier.
    InvalidId { key: String, value: String },
    Repo(RepoError),
}

impl Display for DescriptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEvent(name) => write!(f, "unknown description request `{name}`"),
            Self::MissingId { key } => write!(f, "request payload requires `{key}`"),
            Self::InvalidId { key, value } => write!(f, "`{key}` is not a valid id: {value}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DescriptionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DescriptionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Parsed description request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionRequest {
    Entity(EntityKind),
    Hash,
}

impl DescriptionRequest {
    /// Parses `Retrieve<Entity>Description` or `RetrieveHashDescription`.
    pub fn parse(event_name: &str) -> Result<Self, DescriptionError> {
        if event_name == HASH_REQUEST {
            return Ok(Self::Hash);
        }
        event_name
            .strip_prefix(REQUEST_PREFIX)
            .and_then(|rest| rest.strip_suffix(RESPONSE_SUFFIX))
            .and_then(EntityKind::from_label)
            .map(Self::Entity)
            .ok_or_else(|| DescriptionError::UnknownEvent(event_name.to_string()))
    }

    /// Payload key carrying the requested id.
    pub fn id_key(self) -> String {
        match self {
            Self::Entity(kind) => kind.id_key(),
            Self::Hash => EntityKind::Profile.id_key(),
        }
    }

    pub fn response_event(self) -> String {
        match self {
            Self::Entity(kind) => format!("{}{RESPONSE_SUFFIX}", kind.label()),
            Self::Hash => HASH_RESPONSE.to_string(),
        }
    }
}

/// Use-case service answering description requests.
pub struct DescriptionService {
    repo: EntityRepository,
    options: ExpandOptions,
}

impl DescriptionService {
    /// Creates a service expanding one association layer per description.
    pub fn new(repo: EntityRepository) -> Self {
        Self {
            repo,
            options: ExpandOptions::default(),
        }
    }

    /// Overrides the expansion applied to entity descriptions; hash
    /// descriptions keep their fixed layout.
    pub fn with_options(mut self, options: ExpandOptions) -> Self {
        self.options = options;
        self
    }

    /// Handles one socket request and returns the envelopes to emit.
    ///
    /// # Contract
    /// - Entity requests yield one `<Entity>Description` envelope.
    /// - `RetrieveHashDescription` yields `ProfileDescription` and
    ///   `ZoneContentDescription`, or one `HashDescription` error envelope.
    /// - Unknown event names yield one error envelope named after the request.
    pub async fn handle(&self, event_name: &str, payload: &Value) -> Vec<DescriptionEnvelope> {
        let started_at = Instant::now();
        let request = match DescriptionRequest::parse(event_name) {
            Ok(request) => request,
            Err(err) => {
                error!(
                    "event=description_request module=service status=error request={} error={}",
                    event_name, err
                );
                return vec![DescriptionEnvelope::error(event_name, &err)];
            }
        };

        let outcome = match request_id(request, payload) {
            Ok(id) => match request {
                DescriptionRequest::Entity(kind) => self
                    .describe_kind(kind, id)
                    .await
                    .map(|data| vec![DescriptionEnvelope::ok(request.response_event(), data)]),
                DescriptionRequest::Hash => self
                    .hash_description(id)
                    .await
                    .map(|hash| vec![hash.profile, hash.zone_content]),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok(envelopes) => {
                info!(
                    "event=description_request module=service status=ok request={} envelopes={} duration_ms={}",
                    event_name,
                    envelopes.len(),
                    started_at.elapsed().as_millis()
                );
                envelopes
            }
            Err(err) => {
                error!(
                    "event=description_request module=service status=error request={} duration_ms={} error={}",
                    event_name,
                    started_at.elapsed().as_millis(),
                    err
                );
                vec![DescriptionEnvelope::error(request.response_event(), &err)]
            }
        }
    }

    /// Expanded JSON for the entity `id` of `kind`.
    pub async fn describe_kind(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<Value, DescriptionError> {
        match kind {
            EntityKind::Profile => self.describe::<Profile>(id).await,
            EntityKind::Zone => self.describe::<Zone>(id).await,
            EntityKind::Call => self.describe::<Call>(id).await,
            EntityKind::Widget => self.describe::<Widget>(id).await,
            EntityKind::RelativeTimeline => self.describe::<RelativeTimeline>(id).await,
            EntityKind::AbsoluteTimeline => self.describe::<AbsoluteTimeline>(id).await,
            EntityKind::Event => self.describe::<Event>(id).await,
        }
    }

    pub async fn describe<E: Expandable>(&self, id: EntityId) -> Result<Value, DescriptionError> {
        let mut entity: E = self.repo.read(id).await?;
        Ok(to_expanded(&mut entity, &self.repo, self.options).await?)
    }

    /// Describes the profile layout and the content of every zone.
    ///
    /// # Contract
    /// - `ProfileDescription` lists zones as bare ids.
    /// - `ZoneContentDescription` carries one expanded entry per zone, in
    ///   the order the store returned the zones.
    pub async fn hash_description(
        &self,
        profile_id: EntityId,
    ) -> Result<HashDescription, DescriptionError> {
        let mut profile: Profile = self.repo.read(profile_id).await?;
        let layout = to_expanded(&mut profile, &self.repo, ExpandOptions::ids_only()).await?;

        let content_options = ExpandOptions::ids_only().with_depth(ZONE_CONTENT_DEPTH);
        let zones = profile.load_zones(&self.repo).await?;
        let contents = fan_in(
            zones
                .iter_mut()
                .map(|zone| to_expanded(zone, &self.repo, content_options)),
        )
        .await?;

        Ok(HashDescription {
            profile: DescriptionEnvelope::ok(PROFILE_RESPONSE, layout),
            zone_content: DescriptionEnvelope::ok(ZONE_CONTENT_RESPONSE, Value::Array(contents)),
        })
    }
}

/// The two envelopes of a hash description.
#[derive(Debug, Clone, PartialEq)]
pub struct HashDescription {
    pub profile: DescriptionEnvelope,
    pub zone_content: DescriptionEnvelope,
}

fn request_id(request: DescriptionRequest, payload: &Value) -> Result<EntityId, DescriptionError> {
    let key = request.id_key();
    let raw = payload
        .get(&key)
        .and_then(Value::as_str)
        .ok_or_else(|| DescriptionError::MissingId { key: key.clone() })?;
    EntityId::parse_str(raw.trim()).map_err(|_| DescriptionError::InvalidId {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{request_id, DescriptionError, DescriptionRequest};
    use crate::model::entity::EntityKind;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn parse_maps_event_names_to_kinds() {
        assert_eq!(
            DescriptionRequest::parse("RetrieveRelativeTimelineDescription").unwrap(),
            DescriptionRequest::Entity(EntityKind::RelativeTimeline)
        );
        assert_eq!(
            DescriptionRequest::parse("RetrieveHashDescription").unwrap(),
            DescriptionRequest::Hash
        );
        assert!(matches!(
            DescriptionRequest::parse("RetrieveDisplayDescription"),
            Err(DescriptionError::UnknownEvent(_))
        ));
    }

    #[test]
    fn response_event_drops_retrieve_prefix() {
        let request = DescriptionRequest::Entity(EntityKind::Zone);
        assert_eq!(request.response_event(), "ZoneDescription");
        assert_eq!(DescriptionRequest::Hash.id_key(), "profileId");
    }

    #[test]
    fn request_id_rejects_missing_and_malformed_ids() {
        let request = DescriptionRequest::Entity(EntityKind::Zone);
        let id = Uuid::new_v4();
        assert_eq!(
            request_id(request, &json!({ "zoneId": id.to_string() })).unwrap(),
            id
        );
        assert!(matches!(
            request_id(request, &json!({ "callId": id.to_string() })),
            Err(DescriptionError::MissingId { .. })
        ));
        assert!(matches!(
            request_id(request, &json!({ "zoneId": "nope" })),
            Err(DescriptionError::InvalidId { .. })
        ));
    }
}
