//! # WSGI Server
//! src/lib.rs
//!
//! Servidor HTTP mínimo que conecta conexiones TCP con una única
//! aplicación usando una convención estilo WSGI. Demuestra cómo encajan
//! un listener, un modelo de concurrencia por conexión (thread o fork),
//! la cosecha de workers terminados y la traducción request/response.
//!
//! ## Arquitectura
//!
//! - `config`: CLI y variables de entorno
//! - `error`: taxonomía de errores
//! - `logging`: subscriber de `tracing`
//! - `http`: request, environment, `start_response` y serialización
//! - `app`: contrato de aplicación, registro y apps de demo
//! - `server`: listener, dispatcher, reaper y worker
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsgi_server::app::demo;
//! use wsgi_server::config::Config;
//! use wsgi_server::server::make_server;
//!
//! let config = Config::default();
//! let server = make_server(&config, Arc::new(demo::hello_world)).unwrap();
//! server.serve_forever().unwrap();
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod server;
