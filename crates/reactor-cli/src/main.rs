// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reactor_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reactor")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Compile reactor components and serve their round trips", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a component and print its template as JSON
    Compile {
        /// Component source file
        file: PathBuf,
        /// Component name (defaults to the file stem)
        #[arg(short, long)]
        component: Option<String>,
        /// Server variable name, repeatable
        #[arg(short = 's', long = "server-var")]
        server_vars: Vec<String>,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Serve the round-trip endpoint and public files
    Serve {
        /// Port to run the server on (overrides reactor.toml)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides reactor.toml)
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Compile {
            file,
            component,
            server_vars,
            pretty,
        } => commands::compile::run(&file, component.as_deref(), &server_vars, pretty),
        Commands::Serve { port, host } => commands::serve::run(host, port).await,
    }
}
