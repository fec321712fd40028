//! # WSGI Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración, elige la aplicación por nombre y sirve hasta
//! que el proceso recibe una señal.

use anyhow::{anyhow, Context, Result};
use tracing::error;
use wsgi_server::app::AppRegistry;
use wsgi_server::config::Config;
use wsgi_server::logging;
use wsgi_server::server::make_server;

fn run(config: Config) -> Result<()> {
    let registry = AppRegistry::with_demo_apps();
    let app = registry.get(&config.app).ok_or_else(|| {
        anyhow!(
            "Unknown application {:?} (available: {})",
            config.app,
            registry.names().join(", ")
        )
    })?;

    let server = make_server(&config, app)
        .with_context(|| format!("Could not start server on {}", config.address()))?;

    server.serve_forever().context("Accept loop failed")
}

fn main() {
    let config = Config::new();

    if let Err(e) = logging::init(&config) {
        eprintln!("💥 {}", e);
        std::process::exit(1);
    }

    config.print_summary();

    if let Err(e) = run(config) {
        error!("Error fatal: {:#}", e);
        std::process::exit(1);
    }
}
