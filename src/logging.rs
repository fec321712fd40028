//! # Logging
//! src/logging.rs
//!
//! Inicializa el subscriber de `tracing`. `RUST_LOG` tiene prioridad sobre
//! `--log-level`.

use crate::config::{Config, LogFormat};
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Construye el filtro: RUST_LOG si existe, si no el nivel configurado
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Instala el subscriber global; falla si ya había uno
pub fn init(config: &Config) -> Result<()> {
    let filter = env_filter(&config.log_level);

    let result = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
