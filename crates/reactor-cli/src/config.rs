// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reactor project configuration.
//!
//! Configuration is loaded from `reactor.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [components]
//! dir = "components"
//! cache_size = 128
//!
//! [public]
//! dir = "public"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "reactor.toml";

/// Main configuration structure loaded from `reactor.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Component discovery settings.
    #[serde(default)]
    pub components: ComponentsConfig,
    /// Static files settings.
    #[serde(default)]
    pub public: PublicConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path of the round-trip endpoint (default: "/reactor").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// Component discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentsConfig {
    /// Directory searched for `*.html` components (default: "components").
    #[serde(default = "default_components_dir")]
    pub dir: String,
    /// Number of compiled templates kept in memory (default: 128).
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

/// Static files configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicConfig {
    /// Directory served under `/public` (default: "public").
    #[serde(default = "default_public_dir")]
    pub dir: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_endpoint() -> String {
    "/reactor".to_string()
}

fn default_components_dir() -> String {
    "components".to_string()
}

fn default_cache_size() -> usize {
    reactor::cache::DEFAULT_CAPACITY
}

fn default_public_dir() -> String {
    "public".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            endpoint: default_endpoint(),
        }
    }
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            dir: default_components_dir(),
            cache_size: default_cache_size(),
        }
    }
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            dir: default_public_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from `reactor.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads configuration from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
