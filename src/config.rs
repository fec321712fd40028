//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración por argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./wsgi_server hello --port 8888 --mode fork --backlog 5
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8888 CONCURRENCY_MODE=fork WSGI_APP=environ ./wsgi_server
//! ```

use crate::http::request::DEFAULT_READ_CHUNK;
use crate::server::listener::DEFAULT_BACKLOG;
use clap::{Parser, ValueEnum};

/// Cómo se aísla cada conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConcurrencyMode {
    /// Un thread por conexión
    Thread,
    /// Un proceso por conexión (fork)
    Fork,
}

/// Formato de los logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "wsgi_server")]
#[command(about = "Servidor HTTP proceso-por-conexión con interfaz estilo WSGI")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Aplicación a servir (hello, environ, echo)
    #[arg(default_value = "hello", env = "WSGI_APP")]
    pub app: String,

    /// Host/IP en el que escucha (vacío o 0.0.0.0 = todas las interfaces)
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8888", env = "HTTP_PORT")]
    pub port: u16,

    /// Tamaño de la cola de conexiones pendientes del listen
    #[arg(long, default_value = "5", env = "REQUEST_QUEUE_SIZE")]
    pub backlog: i32,

    /// Bytes que se leen del request (una sola lectura)
    #[arg(long = "read-chunk", default_value = "1024", env = "READ_CHUNK")]
    pub read_chunk: usize,

    /// Modelo de concurrencia
    #[arg(long, value_enum, default_value = "thread", env = "CONCURRENCY_MODE")]
    pub mode: ConcurrencyMode,

    /// Valor fijo para SERVER_NAME (por defecto se resuelve al hacer bind)
    #[arg(long = "server-name", env = "SERVER_NAME")]
    pub server_name: Option<String>,

    /// Nivel de log cuando RUST_LOG no está definido
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Formato de los logs
    #[arg(long = "log-format", value_enum, default_value = "pretty", env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use wsgi_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8888");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=128).contains(&self.backlog) {
            return Err("Backlog must be 1-128".to_string());
        }

        if self.read_chunk == 0 {
            return Err("Read chunk must be >= 1".to_string());
        }

        if self.app.trim().is_empty() {
            return Err("Application name must not be empty".to_string());
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════╗");
        println!("║          WSGI Server Configuration           ║");
        println!("╚══════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Backlog:      {}", self.backlog);
        println!("   Read chunk:   {} bytes", self.read_chunk);
        println!();
        println!("👷 Workers:");
        println!("   Mode:         {:?}", self.mode);
        println!("   Application:  {}", self.app);
        if let Some(name) = &self.server_name {
            println!("   Server name:  {}", name);
        }
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            app: "hello".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8888,
            backlog: DEFAULT_BACKLOG,
            read_chunk: DEFAULT_READ_CHUNK,
            mode: ConcurrencyMode::Thread,
            server_name: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.backlog, 5);
        assert_eq!(config.read_chunk, 1024);
        assert_eq!(config.mode, ConcurrencyMode::Thread);
        assert_eq!(config.app, "hello");
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_backlog_bounds() {
        let mut config = Config::default();

        config.backlog = 0;
        assert!(config.validate().unwrap_err().contains("Backlog"));

        config.backlog = 129;
        assert!(config.validate().is_err());

        config.backlog = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_read_chunk() {
        let mut config = Config::default();
        config.read_chunk = 0;
        assert!(config.validate().unwrap_err().contains("Read chunk"));
    }

    #[test]
    fn test_validate_empty_app() {
        let mut config = Config::default();
        config.app = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_cli_args() {
        let config = Config::try_parse_from([
            "wsgi_server",
            "environ",
            "--port",
            "9000",
            "--mode",
            "fork",
            "--backlog",
            "1",
            "--server-name",
            "demo.local",
        ])
        .unwrap();

        assert_eq!(config.app, "environ");
        assert_eq!(config.port, 9000);
        assert_eq!(config.mode, ConcurrencyMode::Fork);
        assert_eq!(config.backlog, 1);
        assert_eq!(config.server_name.as_deref(), Some("demo.local"));
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        let result = Config::try_parse_from(["wsgi_server", "--mode", "green-threads"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_print_summary() {
        let config = Config::default();
        // Should not panic
        config.print_summary();
    }
}
