//! # Módulo HTTP
//!
//! Traducción entre bytes del socket y la interfaz estilo WSGI:
//!
//! - `request`: lectura de un único chunk y parsing de la request line
//! - `environ`: environment por request que recibe la aplicación
//! - `response`: `start_response` y serialización de la respuesta
//! - `status`: códigos de estado para construir el status line
//!
//! Solo se interpreta la request line; los headers de entrada se ignoran.
//! No hay keep-alive ni chunked: una request por conexión.

pub mod environ;
pub mod request;
pub mod response;
pub mod status;

pub use environ::{Environ, ServerInfo};
pub use request::{read_request, Request};
pub use response::{finish_response, BodyWriter, Headers, ResponseState, StartResponse};
pub use status::StatusCode;
