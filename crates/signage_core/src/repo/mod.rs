//! Repository layer over the REST store collaborator.
//!
//! # Responsibility
//! - Turn entity CRUD and association endpoint calls into store requests.
//! - Isolate request shapes and response normalization from the engine.
//!
//! # Invariants
//! - Repository writes enforce `Persistable::validate()` before any request.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   transport errors.

pub mod entity_repo;
