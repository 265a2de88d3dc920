// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Transports carrying round trips from the orchestrator to a server.
//!
//! [`InProcessTransport`] answers from a [`ComponentServer`] in the same
//! process, still going through the wire encoding. `HttpTransport` (feature
//! `http`) talks to a remote server with `reqwest`.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::TransportError;
use crate::request::ComponentRequest;
use crate::response::ComponentResponse;
use crate::server::ComponentServer;

/// Fetches component state from a server.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Performs one round trip to `url`.
    async fn fetch(&self, url: &str, request: &ComponentRequest) -> Result<ComponentResponse, TransportError>;
}

/// Decodes a response body.
///
/// A document carrying an `error` key is a failure whatever else it holds.
pub fn decode_response(body: &str) -> Result<ComponentResponse, TransportError> {
    let value: JsonValue = serde_json::from_str(body).map_err(|e| TransportError::Malformed(e.to_string()))?;
    if let Some(error) = value.get("error") {
        let message = match error {
            JsonValue::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(TransportError::Server(message));
    }
    serde_json::from_value(value).map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Answers round trips from an in-process [`ComponentServer`].
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    server: Arc<ComponentServer>,
}

impl InProcessTransport {
    /// Wraps `server`.
    pub fn new(server: Arc<ComponentServer>) -> Self {
        Self { server }
    }

    /// The wrapped server.
    pub fn server(&self) -> &ComponentServer {
        &self.server
    }
}

impl Transport for InProcessTransport {
    async fn fetch(&self, url: &str, request: &ComponentRequest) -> Result<ComponentResponse, TransportError> {
        tracing::debug!(url, component = %request.component, "in-process round trip");
        let body = self.server.respond(&request.query_string(), request.form_body().as_bytes());
        decode_response(&body)
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::*;

    /// Round trips over HTTP.
    ///
    /// A request without server values is a `GET`; a re-fetch posts the
    /// values as a form.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
        base_url: String,
    }

    impl HttpTransport {
        /// Creates a transport resolving route URLs against `base_url`.
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }
        }

        fn endpoint(&self, url: &str, request: &ComponentRequest) -> String {
            let url = if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("{}/{}", self.base_url, url.trim_start_matches('/'))
            };
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{}{}{}", url, separator, request.query_string())
        }
    }

    impl Transport for HttpTransport {
        async fn fetch(&self, url: &str, request: &ComponentRequest) -> Result<ComponentResponse, TransportError> {
            let endpoint = self.endpoint(url, request);
            let builder = if request.server_vars.is_some() {
                self.client
                    .post(&endpoint)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(request.form_body())
            } else {
                self.client.get(&endpoint)
            };

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            // an error document wins over the status line
            if !status.is_success() {
                return match decode_response(&body) {
                    Err(TransportError::Server(message)) => Err(TransportError::Server(message)),
                    _ => Err(TransportError::Status {
                        status: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or("").to_string(),
                    }),
                };
            }
            decode_response(&body)
        }
    }

}
