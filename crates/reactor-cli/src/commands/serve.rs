// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Round-trip server command.

use console::style;

use crate::config::Config;
use crate::server::http::create_server;
use crate::server::loader::ComponentLoader;

/// Runs the server; `host` and `port` override `reactor.toml`.
pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let loader = ComponentLoader::new(std::env::current_dir()?.join(&config.components.dir));
    let components = loader.discover()?;
    println!("{}", style("Starting reactor server...").cyan().bold());
    println!(
        "{} {} component(s) in {}",
        style("Found").green(),
        components.len(),
        loader.root().display()
    );
    for component in &components {
        println!("  {}", component.name());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    println!();
    println!(
        "{} {}",
        style("Round trips at").green().bold(),
        style(format!("http://{}{}", addr, config.server.endpoint)).cyan().underlined()
    );
    println!("{}", style("Press Ctrl+C to stop").dim());

    create_server(&addr, &config).await
}
