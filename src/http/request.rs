//! # Lectura y Parsing de Requests
//! src/http/request.rs
//!
//! El worker lee **una sola vez** hasta `read_chunk` bytes de la conexión y
//! parsea solo la request line. No se acumulan lecturas: si la request line
//! no llega completa en el primer chunk, queda truncada.
//!
//! ```text
//! GET /hello HTTP/1.1\r\n     <- request line (lo único que se parsea)
//! Host: localhost:8888\r\n    <- headers: se ignoran
//! \r\n
//! ```

use crate::error::ServerError;
use std::io::Read;

/// Tamaño de lectura por defecto
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Request parseado a partir del primer chunk leído
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Método HTTP tal cual llegó (ej: "GET")
    method: String,

    /// Path de la petición (ej: "/hello")
    path: String,

    /// Versión del protocolo (ej: "HTTP/1.1")
    version: String,

    /// Todos los bytes leídos de la conexión, sin interpretar
    raw: Vec<u8>,
}

impl Request {
    /// Parsea un request desde los bytes leídos
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use wsgi_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /hello HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(request.method(), "GET");
    /// assert_eq!(request.path(), "/hello");
    /// assert_eq!(request.version(), "HTTP/1.1");
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ServerError> {
        let text = String::from_utf8_lossy(buffer);
        // Tanto `\r` como `\n` cortan la primera línea
        let request_line = text.split(['\r', '\n']).next().unwrap_or("");

        let (method, path, version) = Self::parse_request_line(request_line)?;

        Ok(Request {
            method,
            path,
            version,
            raw: buffer.to_vec(),
        })
    }

    /// Divide la request line en exactamente 3 tokens
    ///
    /// Solo el whitespace ASCII separa tokens (incluido VT, `\x0b`).
    fn parse_request_line(line: &str) -> Result<(String, String, String), ServerError> {
        let parts: Vec<&str> = line
            .split(|c: char| c.is_ascii_whitespace() || c == '\x0b')
            .filter(|token| !token.is_empty())
            .collect();

        match parts.as_slice() {
            [method, path, version] => Ok((
                method.to_string(),
                path.to_string(),
                version.to_string(),
            )),
            _ => Err(ServerError::MalformedRequest {
                line: line.to_string(),
                tokens: parts.len(),
            }),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Bytes crudos leídos (request line + headers + body parcial)
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// Lee un único chunk de la conexión y lo parsea
///
/// Un peer que cierra sin enviar nada produce una request line vacía, que
/// falla como `MalformedRequest` con 0 tokens.
pub fn read_request<R: Read>(conn: &mut R, read_chunk: usize) -> Result<Request, ServerError> {
    let mut buffer = vec![0u8; read_chunk];
    let bytes_read = conn.read(&mut buffer)?;
    buffer.truncate(bytes_read);

    Request::parse(&buffer)
}
