//! `reqwest`-backed REST transport.
//!
//! # Responsibility
//! - Map `RestRequest` onto HTTP calls against the configured base URL.
//! - Translate HTTP status codes into `TransportError` variants.
//!
//! # Invariants
//! - 404 is always reported as `TransportError::NotFound`.
//! - A blank success body decodes to `None`.

use super::{Method, RestRequest, RestTransport, TransportError, TransportResult};
use crate::config::{ConfigError, StoreConfig};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

/// HTTP transport for the remote data store.
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    /// Builds a transport from validated settings.
    ///
    /// # Errors
    /// - Any `StoreConfig::validate` failure.
    /// - `InvalidApiKey` when the key cannot be sent as a header value.
    /// - `ClientBuild` when the HTTP client cannot be constructed.
    pub fn try_new(config: &StoreConfig) -> Result<Self, ConfigError> {
        let base_url = config.validate()?;

        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = config.api_key.as_deref() {
            let value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| ConfigError::InvalidApiKey)?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ConfigError::ClientBuild(err.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn send(&self, request: RestRequest) -> TransportResult<Option<Value>> {
        let started_at = Instant::now();
        let url = format!("{}/{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    "event=rest_request module=transport status=error method={} path={} duration_ms={} error_code=send_failed error={}",
                    request.method,
                    request.path,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(TransportError::Connection(err.to_string()));
            }
        };

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))?;

        debug!(
            "event=rest_request module=transport status=ok method={} path={} http_status={} duration_ms={}",
            request.method,
            request.path,
            status.as_u16(),
            started_at.elapsed().as_millis()
        );

        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(request.path));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| TransportError::InvalidBody(err.to_string()))
    }
}
