//! Generic association, completeness, serialization and cloning engine.
//!
//! Every entity kind plugs in by implementing the capability traits defined
//! here; the free functions carry the shared algorithms.

pub mod association;
pub mod barrier;
pub mod clone;
pub mod completeness;
pub mod lifecycle;
pub mod serialize;

pub use association::AssociationHost;
pub use barrier::{fan_in, fan_in_all};
pub use clone::Cloneable;
pub use completeness::{check_complete, reconcile, CompletenessAware, EvalPath};
pub use lifecycle::{delete_entity, Cascade};
pub use serialize::{to_expanded, ExpandOptions, ExpandPlan, Expandable, Serializable};
