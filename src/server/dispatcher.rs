//! # Dispatcher
//! src/server/dispatcher.rs
//!
//! Entrega cada conexión aceptada a un contexto de ejecución aislado que
//! pasa a ser su único dueño; el loop de accept sigue inmediatamente.
//!
//! - `ThreadDispatcher`: un thread por conexión. Un panic queda contenido
//!   en el thread y el reaper lo registra al hacer `join`.
//! - `ForkDispatcher`: un proceso por conexión con `fork(2)`.

use super::listener::Listener;
use super::reaper::{self, Reaper, WorkerId};
use super::worker::{serve_connection, WorkerContext};
use nix::unistd::{close, fork, ForkResult};
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Estrategia de concurrencia por conexión
pub trait Dispatcher {
    /// Cede `stream` a un nuevo worker
    ///
    /// Un error aquí significa que el worker no pudo crearse; la conexión
    /// ya se cerró.
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr, listener: &Listener) -> io::Result<()>;

    /// Workers terminados que aún no se cosecharon, si el modelo lo sabe
    fn unreaped(&self) -> Option<usize> {
        None
    }
}

/// Un thread por conexión
pub struct ThreadDispatcher {
    ctx: Arc<WorkerContext>,
    reaper: Reaper,
    next_id: WorkerId,
}

impl ThreadDispatcher {
    pub fn new(ctx: Arc<WorkerContext>) -> io::Result<Self> {
        Ok(Self {
            ctx,
            reaper: Reaper::start()?,
            next_id: 0,
        })
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr, _listener: &Listener) -> io::Result<()> {
        // Los threads comparten la tabla de descriptores: no hay copia del
        // listener que cerrar
        let id = self.next_id;
        self.next_id += 1;

        let ctx = Arc::clone(&self.ctx);
        let exit_signal = self.reaper.exit_signal(id);

        let spawned = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                let _exit_signal = exit_signal;
                if let Err(e) = serve_connection(stream, &ctx) {
                    warn!("worker {} ({}): {}", id, peer, e);
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.reaper.abandon(id);
                return Err(e);
            }
        };

        self.reaper.track(id, handle);
        Ok(())
    }

    fn unreaped(&self) -> Option<usize> {
        Some(self.reaper.unreaped())
    }
}

/// Un proceso por conexión
pub struct ForkDispatcher {
    ctx: Arc<WorkerContext>,
}

impl ForkDispatcher {
    /// Instala el handler de SIGCHLD que cosecha a los hijos
    pub fn new(ctx: Arc<WorkerContext>) -> io::Result<Self> {
        reaper::install_sigchld_handler()?;
        Ok(Self { ctx })
    }
}

impl Dispatcher for ForkDispatcher {
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr, listener: &Listener) -> io::Result<()> {
        match unsafe { fork() }? {
            ForkResult::Child => {
                // El hijo no acepta conexiones
                if let Err(e) = close(listener.as_raw_fd()) {
                    warn!("worker pid {}: close del listener: {}", std::process::id(), e);
                }

                let ctx = &self.ctx;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| serve_connection(stream, ctx)));
                let code = match outcome {
                    Ok(Ok(())) => 0,
                    Ok(Err(e)) => {
                        warn!("worker pid {} ({}): {}", std::process::id(), peer, e);
                        1
                    }
                    Err(_) => {
                        warn!("worker pid {} ({}): panic", std::process::id(), peer);
                        1
                    }
                };

                // Sin destructores ni handlers atexit del padre
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                debug!("worker pid {} atiende a {}", child, peer);
                // La conexión ahora es del hijo: se cierra la copia del padre
                drop(stream);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{demo, single_chunk, Body};
    use crate::http::{Environ, ServerInfo, StartResponse};
    use std::io::{Read, Write};
    use std::time::{Duration, Instant};

    fn context(app: Arc<dyn crate::app::Application>) -> Arc<WorkerContext> {
        Arc::new(WorkerContext {
            server: ServerInfo {
                name: "localhost".to_string(),
                port: 0,
            },
            read_chunk: 1024,
            app,
        })
    }

    fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(request).unwrap();
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_thread_dispatcher_serves_and_reaps() {
        let listener = Listener::bind("127.0.0.1", 0, 5).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut dispatcher = ThreadDispatcher::new(context(Arc::new(demo::hello_world))).unwrap();

        let clients: Vec<_> = (0..4)
            .map(|_| thread::spawn(move || exchange(addr, b"GET /hello HTTP/1.1\r\n\r\n")))
            .collect();

        for _ in 0..4 {
            let (stream, peer) = listener.accept().unwrap();
            dispatcher.dispatch(stream, peer, &listener).unwrap();
        }

        for client in clients {
            let response = client.join().unwrap();
            assert!(response.ends_with(b"Hello, World!"));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.unreaped() != Some(0) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(dispatcher.unreaped(), Some(0));
    }

    fn panics_on_boom(env: Environ, start: &mut StartResponse) -> Body {
        if env.path_info == "/boom" {
            panic!("application failure");
        }
        start.start_response("200 OK", vec![]);
        single_chunk("still alive")
    }

    #[test]
    fn test_thread_dispatcher_contains_panics() {
        let listener = Listener::bind("127.0.0.1", 0, 5).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut dispatcher = ThreadDispatcher::new(context(Arc::new(panics_on_boom))).unwrap();

        let client = thread::spawn(move || exchange(addr, b"GET /boom HTTP/1.1\r\n\r\n"));
        let (stream, peer) = listener.accept().unwrap();
        dispatcher.dispatch(stream, peer, &listener).unwrap();

        // Conexión cerrada sin respuesta
        assert!(client.join().unwrap().is_empty());

        // El mismo dispatcher sigue atendiendo
        let client = thread::spawn(move || exchange(addr, b"GET / HTTP/1.1\r\n\r\n"));
        let (stream, peer) = listener.accept().unwrap();
        dispatcher.dispatch(stream, peer, &listener).unwrap();
        assert!(client.join().unwrap().ends_with(b"still alive"));
    }
}
