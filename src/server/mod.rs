//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! ```text
//! Listener → accept → Dispatcher → worker (thread / proceso)
//!                                   └─ read_request → app → finish_response
//! Reaper ← worker terminado
//! ```
//!
//! El único contexto de larga vida es el loop de accept; cada conexión la
//! atiende un worker aislado. Un fallo en un worker no afecta al listener
//! ni a los demás workers.

pub mod dispatcher;
pub mod listener;
pub mod reaper;
pub mod worker;

pub use dispatcher::{Dispatcher, ForkDispatcher, ThreadDispatcher};
pub use listener::Listener;
pub use reaper::Reaper;
pub use worker::{serve_connection, WorkerContext};

use crate::app::Application;
use crate::config::{Config, ConcurrencyMode};
use crate::error::ServerError;
use crate::http::ServerInfo;
use std::ffi::CStr;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info};

/// Servidor: socket de escucha + contexto que reciben los workers
pub struct Server {
    listener: Listener,
    mode: ConcurrencyMode,
    context: Arc<WorkerContext>,
}

/// Crea el servidor y hace bind (equivale a `make_server(address, app)`)
pub fn make_server(config: &Config, app: Arc<dyn Application>) -> Result<Server, ServerError> {
    Server::bind(config, app)
}

impl Server {
    pub fn bind(config: &Config, app: Arc<dyn Application>) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let listener = Listener::bind(&config.host, config.port, config.backlog)?;
        let local_addr = listener.local_addr()?;

        let server = ServerInfo {
            name: config
                .server_name
                .clone()
                .unwrap_or_else(|| resolve_server_name(&local_addr)),
            port: local_addr.port(),
        };

        Ok(Self {
            listener,
            mode: config.mode,
            context: Arc::new(WorkerContext {
                server,
                read_chunk: config.read_chunk,
                app,
            }),
        })
    }

    /// Dirección real de escucha
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Nombre y puerto que verán las aplicaciones
    pub fn server_info(&self) -> &ServerInfo {
        &self.context.server
    }

    /// Loop de accept; solo retorna si `accept` falla
    pub fn serve_forever(self) -> Result<(), ServerError> {
        let mut dispatcher: Box<dyn Dispatcher> = match self.mode {
            ConcurrencyMode::Thread => Box::new(ThreadDispatcher::new(Arc::clone(&self.context))?),
            ConcurrencyMode::Fork => Box::new(ForkDispatcher::new(Arc::clone(&self.context))?),
        };

        info!(
            "Sirviendo HTTP en {} (modo {:?}, pid {})",
            self.local_addr()?,
            self.mode,
            std::process::id()
        );

        loop {
            let (stream, peer) = self.listener.accept()?;
            info!("Nueva conexión desde {}", peer);

            if let Err(e) = dispatcher.dispatch(stream, peer, &self.listener) {
                error!("No se pudo crear el worker para {}: {}", peer, e);
            }
        }
    }
}

/// SERVER_NAME: el hostname si se escucha en todas las interfaces; si no,
/// el nombre que el resolver asocia a la IP, o la IP misma
fn resolve_server_name(addr: &SocketAddr) -> String {
    match addr.ip() {
        ip if ip.is_unspecified() => nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| ip.to_string()),
        IpAddr::V4(ip) => reverse_lookup(ip).unwrap_or_else(|| ip.to_string()),
        IpAddr::V6(ip) => ip.to_string(),
    }
}

/// Búsqueda inversa con `getnameinfo` (ej: 127.0.0.1 -> localhost)
fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_addr.s_addr = u32::from(ip).to_be();

    let mut host = [0 as libc::c_char; 1025];
    let ret = unsafe {
        libc::getnameinfo(
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            0,
        )
    };
    if ret != 0 {
        return None;
    }

    let name = unsafe { CStr::from_ptr(host.as_ptr()) }.to_str().ok()?;
    // Sin nombre registrado devuelve la forma numérica
    if name.is_empty() || name == ip.to_string() {
        None
    } else {
        Some(name.to_string())
    }
}
