// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server for component round trips.
//!
//! A thin adapter: the raw query string and form body are handed to
//! [`ComponentServer::respond`] and its JSON answer is sent back as is.
//! Components are re-read from disk on every request so edits show up
//! without a restart; unchanged sources hit the template cache.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use reactor::{ComponentServer, ErrorResponse, TemplateCache};
use tower_http::services::ServeDir;

use super::loader::ComponentLoader;
use crate::config::Config;

/// Shared application state for the round-trip server.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Component discovery.
    pub loader: ComponentLoader,
    /// Compiled templates shared across requests.
    pub cache: TemplateCache,
}

impl AppState {
    /// Creates the state for `config`, resolving directories against `root`.
    pub fn new(config: Config, root: &std::path::Path) -> Self {
        let loader = ComponentLoader::new(root.join(&config.components.dir));
        let cache = TemplateCache::new(config.components.cache_size);
        Self { config, loader, cache }
    }

    fn server(&self) -> anyhow::Result<ComponentServer> {
        self.loader.load_server(&self.cache)
    }
}

/// Builds the application router.
pub fn create_router(state: Arc<AppState>, public_dir: &std::path::Path) -> Router {
    let endpoint = state.config.server.endpoint.clone();
    Router::new()
        .route(&endpoint, get(reactor_handler).post(reactor_handler))
        .nest_service("/public", ServeDir::new(public_dir))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Creates and starts the HTTP server.
pub async fn create_server(addr: &str, config: &Config) -> anyhow::Result<()> {
    let working_dir = std::env::current_dir()?;
    let public_dir = working_dir.join(&config.public.dir);
    let state = Arc::new(AppState::new(config.clone(), &working_dir));

    let app = create_router(state, &public_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn reactor_handler(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery, body: Bytes) -> Response {
    let query = query.unwrap_or_default();
    let json = match state.server() {
        Ok(server) => server.respond(&query, &body),
        Err(e) => {
            tracing::error!(error = %e, "cannot load components");
            let error = ErrorResponse::new(format!("Cannot load components: {}", e));
            match serde_json::to_string(&error) {
                Ok(json) => json,
                Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            }
        }
    };

    ([(header::CONTENT_TYPE, "application/json")], json).into_response()
}

async fn fallback_handler() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}
