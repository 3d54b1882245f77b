//! Entity kinds and their association descriptors.
//!
//! # Responsibility
//! - Define the identity header and persistence contract shared by every kind.
//! - Declare each kind's scalar fields, relations and ownership policy.
//!
//! # Invariants
//! - Every persisted entity is identified by a store-assigned `EntityId`.
//! - Relations are either owned (cascade on clone/delete) or referenced.

pub mod call;
pub mod entity;
pub mod event;
pub mod profile;
pub mod relation;
pub mod timeline;
pub mod widget;
pub mod zone;
