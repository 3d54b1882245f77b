//! REST collaborator contract and implementations.
//!
//! # Responsibility
//! - Define the single request/response seam between the engine and the
//!   remote data store.
//! - Keep wire details (HTTP client, status mapping) out of the engine.
//!
//! # Invariants
//! - One `send` call is one request; transports never retry.
//! - An empty success body is reported as `None`, not as an error.

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::InMemoryTransport;

pub type TransportResult<T> = Result<T, TransportError>;

/// HTTP verb subset used by the store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request against the store, with a path relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    /// Slash-separated path without leading slash, e.g. `zones/<id>/calls`.
    pub path: String,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Failure reported by a transport. Payloads are passed through untranslated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request could not be sent or no response arrived.
    Connection(String),
    /// Store answered 404 for the path.
    NotFound(String),
    /// Store answered with another non-success status.
    Status { status: u16, message: String },
    /// Response body is not valid JSON.
    InvalidBody(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(message) => write!(f, "store connection failed: {message}"),
            Self::NotFound(path) => write!(f, "store path not found: {path}"),
            Self::Status { status, message } => write!(f, "store error {status}: {message}"),
            Self::InvalidBody(message) => write!(f, "invalid store response body: {message}"),
        }
    }
}

impl Error for TransportError {}

/// Request/response seam to the remote data store.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Sends one request and resolves to the decoded body, if any.
    async fn send(&self, request: RestRequest) -> TransportResult<Option<Value>>;
}
