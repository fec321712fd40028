//! # Listener
//! src/server/listener.rs
//!
//! Socket de escucha: `SO_REUSEADDR` para que un reinicio no falle por
//! sockets en TIME_WAIT, y un backlog pequeño configurable.
//!
//! `std::net::TcpListener::bind` no permite elegir el backlog, así que el
//! socket se arma con `libc` y luego se entrega a std.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use tracing::debug;

/// Backlog por defecto (`REQUEST_QUEUE_SIZE`)
pub const DEFAULT_BACKLOG: i32 = 5;

/// Socket de escucha del servidor
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Crea, configura, hace bind y pone a escuchar el socket
    ///
    /// Un host vacío equivale a todas las interfaces.
    pub fn bind(host: &str, port: u16, backlog: i32) -> io::Result<Self> {
        let ip = resolve_ipv4(host, port)?;
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // A partir de aquí el fd pertenece al TcpListener: se cierra al hacer drop
        let inner = unsafe { TcpListener::from_raw_fd(fd) };

        let opt: libc::c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &opt as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_port = port.to_be();
        addr.sin_addr.s_addr = u32::from(ip).to_be();

        let ret = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::listen(fd, backlog) } != 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("socket {} escuchando en {}:{} (backlog {})", fd, ip, port, backlog);
        Ok(Self { inner })
    }

    /// Bloquea hasta que llega un peer
    ///
    /// Si una señal (SIGCHLD de un worker que terminó) interrumpe la llamada,
    /// se reintenta sin reportar nada. Cualquier otro error se propaga.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        retry_interrupted(|| self.inner.accept())
    }

    /// Dirección real tras el bind (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// Repite `op` mientras falle con `ErrorKind::Interrupted`
pub(crate) fn retry_interrupted<T, F>(mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("accept interrumpido por una señal, reintentando");
                continue;
            }
            other => return other,
        }
    }
}

fn resolve_ipv4(host: &str, port: u16) -> io::Result<Ipv4Addr> {
    if host.is_empty() {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }

    (host, port)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no IPv4 address for host {:?}", host),
            )
        })
}
