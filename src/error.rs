//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de fallos del servidor. Todos los fallos por conexión quedan
//! aislados en su worker; solo un `Transport` devuelto por el listener
//! termina el servidor completo.
//!
//! Un `accept` interrumpido por una señal no aparece aquí: el listener lo
//! reintenta sin exponerlo (ver `server::listener`).

use std::io;

/// Errores que puede producir el servidor
#[derive(Debug)]
pub enum ServerError {
    /// La request line no tiene exactamente 3 tokens (METHOD PATH VERSION)
    MalformedRequest {
        /// Request line recibida (sin fin de línea)
        line: String,
        /// Número de tokens encontrados
        tokens: usize,
    },

    /// Se intentó serializar la respuesta sin haber llamado a `start_response`
    ResponseNotStarted,

    /// Cualquier otro fallo del socket
    Transport(io::Error),

    /// Configuración inválida o aplicación desconocida al arrancar
    Config(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::MalformedRequest { line, tokens } => write!(
                f,
                "Malformed request line {:?}: expected 3 tokens, got {}",
                line, tokens
            ),
            ServerError::ResponseNotStarted => {
                write!(f, "start_response was not called before the body")
            }
            ServerError::Transport(e) => write!(f, "Transport error: {}", e),
            ServerError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_malformed() {
        let err = ServerError::MalformedRequest {
            line: "BADLINE".to_string(),
            tokens: 1,
        };
        let text = err.to_string();
        assert!(text.contains("BADLINE"));
        assert!(text.contains("got 1"));
    }

    #[test]
    fn test_from_io_error_is_transport() {
        let err: ServerError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, ServerError::Transport(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
