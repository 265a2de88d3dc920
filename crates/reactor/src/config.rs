// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Host configuration consumed by the orchestrator.
//!
//! ```rust
//! use reactor::{Mustache, ReactorConfig};
//!
//! let config = ReactorConfig::builder()
//!     .engine(Mustache)
//!     .route("^Admin", "/admin/reactor")
//!     .route(".*", "/reactor")
//!     .refresh(|_node| {})
//!     .build()
//!     .unwrap();
//! assert_eq!(config.resolve_route("AdminPanel").unwrap(), "/admin/reactor");
//! ```

use regex::Regex;

use crate::error::ReactorError;
use crate::markup::Element;
use crate::mustache::{escape_html, TemplateEngine};

/// Error hook: receives the error and the component node when there is one.
pub type ErrorHook = Box<dyn Fn(&ReactorError, Option<&mut Element>)>;

/// Refresh notifier: called with every node a render updated.
pub type RefreshNotifier = Box<dyn Fn(&Element)>;

/// Maps component names to round-trip URLs.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: Regex,
    url: String,
}

impl Route {
    /// Returns true if the route serves `component`.
    pub fn matches(&self, component: &str) -> bool {
        self.pattern.is_match(component)
    }

    /// Round-trip URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Validated host configuration.
pub struct ReactorConfig {
    engine: Box<dyn TemplateEngine>,
    routes: Vec<Route>,
    on_error: ErrorHook,
    refresh: RefreshNotifier,
}

impl std::fmt::Debug for ReactorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorConfig").field("routes", &self.routes).finish_non_exhaustive()
    }
}

impl ReactorConfig {
    /// Starts a configuration.
    pub fn builder() -> ReactorConfigBuilder {
        ReactorConfigBuilder::default()
    }

    /// The mustache engine.
    pub fn engine(&self) -> &dyn TemplateEngine {
        self.engine.as_ref()
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// URL of the first route matching `component`.
    pub fn resolve_route(&self, component: &str) -> Result<&str, ReactorError> {
        self.routes
            .iter()
            .find(|route| route.matches(component))
            .map(Route::url)
            .ok_or_else(|| ReactorError::RouteNotFound(component.to_string()))
    }

    /// Invokes the page-level error hook.
    pub fn on_error(&self, error: &ReactorError, node: Option<&mut Element>) {
        (self.on_error)(error, node)
    }

    /// Invokes the refresh notifier.
    pub fn refresh(&self, node: &Element) {
        (self.refresh)(node)
    }
}

/// Builder for [`ReactorConfig`]; all checks happen in [`build`](Self::build).
#[derive(Default)]
pub struct ReactorConfigBuilder {
    engine: Option<Box<dyn TemplateEngine>>,
    routes: Vec<(String, String)>,
    on_error: Option<ErrorHook>,
    refresh: Option<RefreshNotifier>,
}

impl ReactorConfigBuilder {
    /// Sets the mustache engine.
    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Appends a route; `pattern` is a regular expression over component names.
    pub fn route(mut self, pattern: impl Into<String>, url: impl Into<String>) -> Self {
        self.routes.push((pattern.into(), url.into()));
        self
    }

    /// Sets the page-level error hook.
    pub fn on_error(mut self, hook: impl Fn(&ReactorError, Option<&mut Element>) + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Sets the refresh notifier.
    pub fn refresh(mut self, notifier: impl Fn(&Element) + 'static) -> Self {
        self.refresh = Some(Box::new(notifier));
        self
    }

    /// Validates and builds the configuration.
    ///
    /// Without routes every component goes to `/reactor`. Without an error
    /// hook, [`default_error_hook`] is used.
    pub fn build(self) -> Result<ReactorConfig, ReactorError> {
        let engine = self
            .engine
            .ok_or_else(|| ReactorError::Config("a render engine is required".to_string()))?;
        let refresh = self
            .refresh
            .ok_or_else(|| ReactorError::Config("a refresh notifier is required".to_string()))?;

        let routes = if self.routes.is_empty() {
            vec![(".*".to_string(), "/reactor".to_string())]
        } else {
            self.routes
        };
        let routes = routes
            .into_iter()
            .map(|(pattern, url)| {
                Regex::new(&pattern)
                    .map(|pattern| Route { pattern, url })
                    .map_err(|e| ReactorError::Config(format!("invalid route pattern \"{}\": {}", pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReactorConfig {
            engine,
            routes,
            on_error: self.on_error.unwrap_or_else(|| Box::new(default_error_hook) as ErrorHook),
            refresh,
        })
    }
}

/// Paints the message into the node as red text and logs it.
pub fn default_error_hook(error: &ReactorError, node: Option<&mut Element>) {
    tracing::error!(error = %error, "reactor error");
    if let Some(node) = node {
        let html = format!("<span style=\"color: red;\">{}</span>", escape_html(&error.to_string()));
        if let Err(e) = node.set_inner_html(&html) {
            tracing::error!(error = %e, "cannot paint error message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mustache::Mustache;

    #[test]
    fn test_requires_engine_and_refresh() {
        let err = ReactorConfig::builder().refresh(|_| {}).build().unwrap_err();
        assert!(matches!(err, ReactorError::Config(ref m) if m.contains("engine")));

        let err = ReactorConfig::builder().engine(Mustache).build().unwrap_err();
        assert!(matches!(err, ReactorError::Config(ref m) if m.contains("refresh")));
    }

    #[test]
    fn test_default_route() {
        let config = ReactorConfig::builder().engine(Mustache).refresh(|_| {}).build().unwrap();
        assert_eq!(config.resolve_route("Anything").unwrap(), "/reactor");
    }

    #[test]
    fn test_first_match_wins() {
        let config = ReactorConfig::builder()
            .engine(Mustache)
            .refresh(|_| {})
            .route("^Blog", "/blog")
            .route("Post$", "/posts")
            .build()
            .unwrap();
        assert_eq!(config.resolve_route("BlogPost").unwrap(), "/blog");
        assert_eq!(config.resolve_route("UserPost").unwrap(), "/posts");
        assert!(matches!(
            config.resolve_route("Menu"),
            Err(ReactorError::RouteNotFound(ref name)) if name == "Menu"
        ));
    }

    #[test]
    fn test_invalid_route_fails_eagerly() {
        let err = ReactorConfig::builder()
            .engine(Mustache)
            .refresh(|_| {})
            .route("(", "/x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReactorError::Config(_)));
    }

    #[test]
    fn test_default_error_hook_paints_node() {
        let mut node = Element::new("div");
        let error = ReactorError::ComponentNotFound("Menu".into());
        default_error_hook(&error, Some(&mut node));
        assert_eq!(
            node.inner_html(),
            "<span style=\"color: red;\">Component Menu is not registered</span>"
        );
        default_error_hook(&error, None);
    }
}
