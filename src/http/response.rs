//! # Construcción de Respuestas
//! src/http/response.rs
//!
//! La aplicación fija status y headers llamando a `start_response`; luego
//! el servidor itera el body y serializa todo en formato HTTP/1.1:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/plain\r\n
//! Date: Tue, 31 Mar 2015 12:54:48 GMT\r\n
//! Server: WSGIServer 0.2\r\n
//! \r\n
//! Hello, World!
//! ```
//!
//! `Date` y `Server` se agregan siempre, después de los headers de la
//! aplicación.

use crate::error::ServerError;
use std::io::{self, Write};
use std::time::SystemTime;
use tracing::debug;

/// Firma que se envía en el header `Server`
pub const SERVER_SIGNATURE: &str = "WSGIServer 0.2";

/// Lista de headers (nombre, valor) en orden de envío
pub type Headers = Vec<(String, String)>;

/// Status y headers capturados por `start_response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseState {
    status: String,
    headers: Headers,
}

impl ResponseState {
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Headers de la aplicación seguidos de los del servidor
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serializa la respuesta completa
    ///
    /// `written` son los bytes enviados por el `BodyWriter`, que van antes
    /// que los chunks del body.
    ///
    /// # Ejemplo
    /// ```
    /// use wsgi_server::http::StartResponse;
    ///
    /// let mut start = StartResponse::with_date("Tue, 31 Mar 2015 12:54:48 GMT");
    /// start.start_response("200 OK", vec![]);
    /// let state = start.state().unwrap();
    ///
    /// let bytes = state.serialize(b"", vec![b"Hi".to_vec()]);
    /// assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
    /// assert!(bytes.ends_with(b"\r\n\r\nHi"));
    /// ```
    pub fn serialize<I>(&self, written: &[u8], body: I) -> Vec<u8>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut result = Vec::new();

        // 1. Status line
        result.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());

        // 2. Headers
        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        // 3. Línea vacía
        result.extend_from_slice(b"\r\n");

        // 4. Body
        result.extend_from_slice(written);
        for chunk in body {
            result.extend_from_slice(&chunk);
        }

        result
    }
}

/// Callback `start_response` que recibe la aplicación
///
/// Llamarlo más de una vez sobrescribe el estado anterior.
#[derive(Debug)]
pub struct StartResponse {
    date: String,
    state: Option<ResponseState>,
    written: Vec<u8>,
}

impl StartResponse {
    /// Crea el callback fijando el header `Date` al instante actual
    pub fn new() -> Self {
        Self::with_date(&httpdate::fmt_http_date(SystemTime::now()))
    }

    /// Crea el callback con un valor de `Date` fijo
    pub fn with_date(date: &str) -> Self {
        Self {
            date: date.to_string(),
            state: None,
            written: Vec::new(),
        }
    }

    /// Fija status y headers; devuelve el writer del body (`write` de WSGI)
    pub fn start_response(&mut self, status: &str, headers: Headers) -> BodyWriter<'_> {
        let mut headers = headers;
        headers.push(("Date".to_string(), self.date.clone()));
        headers.push(("Server".to_string(), SERVER_SIGNATURE.to_string()));

        self.state = Some(ResponseState {
            status: status.to_string(),
            headers,
        });

        BodyWriter {
            buffer: &mut self.written,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state.is_some()
    }

    /// Estado capturado, o `ResponseNotStarted` si no hubo llamada
    pub fn state(&self) -> Result<&ResponseState, ServerError> {
        self.state.as_ref().ok_or(ServerError::ResponseNotStarted)
    }

    /// Bytes escritos vía `BodyWriter`
    pub fn written(&self) -> &[u8] {
        &self.written
    }
}

impl Default for StartResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Capacidad de escritura devuelta por `start_response`
///
/// Lo escrito aquí se envía antes que los chunks devueltos por la aplicación.
pub struct BodyWriter<'a> {
    buffer: &'a mut Vec<u8>,
}

impl Write for BodyWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serializa la respuesta y la escribe en la conexión en una sola operación
///
/// La conexión se recibe por valor: se libera al salir de esta función en
/// todos los caminos, incluido el error por `ResponseNotStarted` (en cuyo
/// caso no se escribe nada).
pub fn finish_response<W, I>(start: StartResponse, body: I, conn: W) -> Result<(), ServerError>
where
    W: Write,
    I: IntoIterator<Item = Vec<u8>>,
{
    let mut conn = conn;
    let state = start.state()?;
    let response = state.serialize(start.written(), body);

    for line in String::from_utf8_lossy(&response).lines() {
        debug!("> {}", line);
    }

    conn.write_all(&response)?;
    conn.flush()?;

    Ok(())
}
