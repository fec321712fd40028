//! # Aplicaciones
//! src/app/mod.rs
//!
//! Contrato entre el servidor y la aplicación:
//!
//! ```text
//! Environ + &mut StartResponse → Application → Body (chunks de bytes)
//! ```
//!
//! La aplicación debe llamar a `start_response` antes de que el servidor
//! consuma el body. El body se itera una sola vez.
//!
//! El registro mapea nombres a aplicaciones; el binario elige una por
//! nombre desde la línea de comandos.

pub mod demo;

use crate::http::{Environ, StartResponse};
use std::sync::Arc;

/// Body de la respuesta: secuencia finita de chunks, consumida una vez
pub type Body = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// Aplicación estilo WSGI
pub trait Application: Send + Sync {
    fn call(&self, environ: Environ, start_response: &mut StartResponse) -> Body;
}

impl<F> Application for F
where
    F: Fn(Environ, &mut StartResponse) -> Body + Send + Sync,
{
    fn call(&self, environ: Environ, start_response: &mut StartResponse) -> Body {
        self(environ, start_response)
    }
}

/// Body de un único chunk
pub fn single_chunk(chunk: impl Into<Vec<u8>>) -> Body {
    Box::new(std::iter::once(chunk.into()))
}

/// Registro nombre → aplicación
pub struct AppRegistry {
    apps: Vec<(String, Arc<dyn Application>)>,
}

impl AppRegistry {
    /// Crea un registro vacío
    pub fn new() -> Self {
        Self { apps: Vec::new() }
    }

    /// Registro con las aplicaciones de demo (`hello`, `environ`, `echo`)
    pub fn with_demo_apps() -> Self {
        let mut registry = Self::new();
        registry.register("hello", demo::hello_world);
        registry.register("environ", demo::environ_dump);
        registry.register("echo", demo::echo);
        registry
    }

    /// Registra una aplicación; un nombre repetido reemplaza la anterior
    ///
    /// # Ejemplo
    /// ```
    /// use wsgi_server::app::{single_chunk, AppRegistry, Body};
    /// use wsgi_server::http::{Environ, StartResponse};
    ///
    /// fn ping(_env: Environ, start: &mut StartResponse) -> Body {
    ///     start.start_response("200 OK", vec![]);
    ///     single_chunk("pong")
    /// }
    ///
    /// let mut registry = AppRegistry::new();
    /// registry.register("ping", ping);
    /// assert!(registry.get("ping").is_some());
    /// ```
    pub fn register<A>(&mut self, name: &str, app: A)
    where
        A: Application + 'static,
    {
        let app: Arc<dyn Application> = Arc::new(app);
        match self.apps.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some(entry) => entry.1 = app,
            None => self.apps.push((name.to_string(), app)),
        }
    }

    /// Busca una aplicación por nombre
    pub fn get(&self, name: &str) -> Option<Arc<dyn Application>> {
        self.apps
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, app)| Arc::clone(app))
    }

    /// Nombres registrados, en orden de registro
    pub fn names(&self) -> Vec<&str> {
        self.apps.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::with_demo_apps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, ServerInfo};

    fn environ(raw: &[u8]) -> Environ {
        let server = ServerInfo {
            name: "localhost".to_string(),
            port: 8888,
        };
        Environ::new(Request::parse(raw).unwrap(), &server)
    }

    fn teapot(_env: Environ, start: &mut StartResponse) -> Body {
        start.start_response("418 I'm a teapot", vec![]);
        single_chunk("short and stout")
    }

    #[test]
    fn test_registry_creation() {
        let registry = AppRegistry::new();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_demo_apps_registered() {
        let registry = AppRegistry::with_demo_apps();
        assert_eq!(registry.names(), vec!["hello", "environ", "echo"]);
    }

    #[test]
    fn test_get_unknown() {
        let registry = AppRegistry::with_demo_apps();
        assert!(registry.get("module:callable").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = AppRegistry::with_demo_apps();
        registry.register("hello", teapot);
        assert_eq!(registry.names().len(), 3);

        let app = registry.get("hello").unwrap();
        let mut start = StartResponse::with_date("d");
        let body: Vec<u8> = app
            .call(environ(b"GET / HTTP/1.1\r\n\r\n"), &mut start)
            .flatten()
            .collect();

        assert_eq!(start.state().unwrap().status(), "418 I'm a teapot");
        assert_eq!(body, b"short and stout");
    }

    #[test]
    fn test_closure_application() {
        let greeting = String::from("hi ");
        let app = move |env: Environ, start: &mut StartResponse| -> Body {
            start.start_response("200 OK", vec![]);
            single_chunk(format!("{}{}", greeting, env.path_info))
        };

        let mut start = StartResponse::with_date("d");
        let body: Vec<Vec<u8>> =
            Application::call(&app, environ(b"GET /there HTTP/1.1\r\n\r\n"), &mut start)
                .collect();
        assert_eq!(body, vec![b"hi /there".to_vec()]);
    }
}
