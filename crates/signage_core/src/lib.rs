//! Core entity engine for the signage backend.
//! Lazy associations, completeness propagation, bounded serialization and
//! graph cloning over a remote REST data store.

pub mod config;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod transport;

pub use config::{ConfigError, StoreConfig};
pub use engine::{
    check_complete, delete_entity, fan_in, fan_in_all, reconcile, to_expanded, AssociationHost,
    Cascade, Cloneable, CompletenessAware, EvalPath, ExpandOptions, ExpandPlan, Expandable,
    Serializable,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::call::{Call, CallFields};
pub use model::entity::{EntityId, EntityKind, EntityMeta, ModelError, Persistable};
pub use model::event::{Event, EventFields};
pub use model::profile::{Profile, ProfileFields};
pub use model::relation::{Cardinality, ManySlot, OneSlot, Ownership, Relation, Slot};
pub use model::timeline::{
    Absolute, AbsoluteTimeline, Relative, RelativeTimeline, Timeline, TimelineFields, TimelineMode,
};
pub use model::widget::{Widget, WidgetFields};
pub use model::zone::{Zone, ZoneFields};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult};
pub use service::description_service::{
    DescriptionEnvelope, DescriptionError, DescriptionRequest, DescriptionService,
    DescriptionStatus, HashDescription,
};
pub use transport::{
    HttpTransport, InMemoryTransport, Method, RestRequest, RestTransport, TransportError,
    TransportResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
