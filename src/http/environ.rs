//! # Environment de la Aplicación
//! src/http/environ.rs
//!
//! Objeto por request que recibe la aplicación: marcadores del protocolo
//! WSGI, metadatos de transporte (nombre y puerto del servidor) y del
//! request (método y path), más un stream sobre los bytes crudos leídos.
//!
//! Se construye una vez por request y se consume en la llamada a la
//! aplicación.

use super::Request;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Write};

/// Versión WSGI anunciada en `wsgi.version`
pub const WSGI_VERSION: (u8, u8) = (1, 0);

/// Metadatos de transporte resueltos al hacer bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Nombre del host del servidor (ej: "localhost")
    pub name: String,

    /// Puerto real en el que escucha (ej: 8888)
    pub port: u16,
}

/// Sink de errores de la aplicación (`wsgi.errors`)
pub type ErrorSink = Box<dyn Write + Send>;

/// Environment por request
pub struct Environ {
    pub version: (u8, u8),
    pub url_scheme: &'static str,

    /// Stream sobre los bytes leídos (`wsgi.input`)
    pub input: Cursor<Vec<u8>>,

    /// Destino de errores (`wsgi.errors`), stderr por defecto
    pub errors: ErrorSink,

    pub multithread: bool,
    pub multiprocess: bool,
    pub run_once: bool,

    pub request_method: String,
    pub path_info: String,
    pub server_name: String,
    pub server_port: String,
}

impl Environ {
    /// Construye el environment a partir del request y del servidor
    ///
    /// # Ejemplo
    /// ```
    /// use wsgi_server::http::{Environ, Request, ServerInfo};
    ///
    /// let request = Request::parse(b"GET /hello HTTP/1.1\r\n\r\n").unwrap();
    /// let server = ServerInfo { name: "localhost".to_string(), port: 8888 };
    /// let env = Environ::new(request, &server);
    ///
    /// assert_eq!(env.get("PATH_INFO").as_deref(), Some("/hello"));
    /// assert_eq!(env.get("SERVER_PORT").as_deref(), Some("8888"));
    /// ```
    pub fn new(request: Request, server: &ServerInfo) -> Self {
        let request_method = request.method().to_string();
        let path_info = request.path().to_string();

        Self {
            version: WSGI_VERSION,
            url_scheme: "http",
            input: Cursor::new(request.into_raw()),
            errors: Box::new(io::stderr()),
            multithread: false,
            multiprocess: false,
            run_once: false,
            request_method,
            path_info,
            server_name: server.name.clone(),
            server_port: server.port.to_string(),
        }
    }

    /// Reemplaza el sink de errores
    pub fn with_errors(mut self, errors: ErrorSink) -> Self {
        self.errors = errors;
        self
    }

    /// Vista clave -> valor con los nombres WSGI/CGI
    ///
    /// `wsgi.input` y `wsgi.errors` no son strings y no aparecen.
    pub fn vars(&self) -> BTreeMap<&'static str, String> {
        let mut vars = BTreeMap::new();

        vars.insert(
            "wsgi.version",
            format!("({}, {})", self.version.0, self.version.1),
        );
        vars.insert("wsgi.url_scheme", self.url_scheme.to_string());
        vars.insert("wsgi.multithread", py_bool(self.multithread));
        vars.insert("wsgi.multiprocess", py_bool(self.multiprocess));
        vars.insert("wsgi.run_once", py_bool(self.run_once));

        vars.insert("REQUEST_METHOD", self.request_method.clone());
        vars.insert("PATH_INFO", self.path_info.clone());
        vars.insert("SERVER_NAME", self.server_name.clone());
        vars.insert("SERVER_PORT", self.server_port.clone());

        vars
    }

    /// Obtiene una variable por su nombre WSGI/CGI
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars().remove(key)
    }
}

fn py_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

impl fmt::Debug for Environ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environ")
            .field("vars", &self.vars())
            .field("input_len", &self.input.get_ref().len())
            .finish_non_exhaustive()
    }
}
