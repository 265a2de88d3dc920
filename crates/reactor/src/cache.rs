// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled template cache.
//!
//! Templates are keyed by a SHA-256 digest of the component name, its source
//! and its server variable names. An edited source gets a new key and is
//! recompiled wholesale; the stale entry ages out of the LRU.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::compiler::compile;
use crate::error::CompileError;
use crate::template::Template;

/// Default number of cached templates.
pub const DEFAULT_CAPACITY: usize = 128;

/// Thread-safe LRU of compiled templates.
#[derive(Debug, Clone)]
pub struct TemplateCache {
    cache: Arc<Mutex<LruCache<String, Arc<Template>>>>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TemplateCache {
    /// Creates a cache holding up to `capacity` templates (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Returns the cached template or compiles and caches it.
    pub fn get_or_compile(
        &self,
        component: &str,
        source: &str,
        server_vars: &[String],
    ) -> Result<Arc<Template>, CompileError> {
        let key = cache_key(component, source, server_vars);
        if let Some(template) = self.lock().get(&key) {
            tracing::debug!(component, "template cache hit");
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(compile(component, source, server_vars)?);
        self.lock().put(key, Arc::clone(&template));
        Ok(template)
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every cached template.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Template>>> {
        // a panic while holding the lock cannot leave the LRU half-updated
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn cache_key(component: &str, source: &str, server_vars: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(component.as_bytes());
    hasher.update([0]);
    hasher.update(source.as_bytes());
    for name in server_vars {
        hasher.update([0]);
        hasher.update(name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
