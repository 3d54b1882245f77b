//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine calls into use-case level APIs.
//! - Keep socket/CLI layers decoupled from store details.

pub mod description_service;
