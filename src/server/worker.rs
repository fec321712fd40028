//! # Worker
//! src/server/worker.rs
//!
//! Lo que corre dentro de cada contexto aislado (thread o proceso hijo):
//! leer un request, construir el environment, llamar a la aplicación y
//! escribir la respuesta. La conexión se cierra al terminar, falle o no.

use crate::app::Application;
use crate::error::ServerError;
use crate::http::{finish_response, read_request, Environ, ServerInfo, StartResponse};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Contexto compartido (solo lectura) por todos los workers
#[derive(Clone)]
pub struct WorkerContext {
    /// Nombre y puerto que se exponen como SERVER_NAME / SERVER_PORT
    pub server: ServerInfo,

    /// Bytes que se leen del request en la única lectura
    pub read_chunk: usize,

    pub app: Arc<dyn Application>,
}

/// Atiende un único request sobre `conn` y la libera
pub fn serve_connection<S>(conn: S, ctx: &WorkerContext) -> Result<(), ServerError>
where
    S: Read + Write,
{
    let mut conn = conn;
    let request = read_request(&mut conn, ctx.read_chunk)?;

    for line in String::from_utf8_lossy(request.raw()).lines() {
        debug!("< {}", line);
    }

    let environ = Environ::new(request, &ctx.server);
    let mut start = StartResponse::new();
    let body = ctx.app.call(environ, &mut start);

    finish_response(start, body, conn)
}
