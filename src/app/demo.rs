//! # Aplicaciones de Demo
//! src/app/demo.rs
//!
//! - `hello`: "Hello, World!" en texto plano
//! - `environ`: JSON con las variables del environment
//! - `echo`: devuelve los bytes crudos leídos de `wsgi.input`

use super::{single_chunk, Body};
use crate::http::{Environ, StartResponse, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Responde siempre `Hello, World!`
pub fn hello_world(_environ: Environ, start_response: &mut StartResponse) -> Body {
    start_response.start_response(
        &StatusCode::Ok.to_string(),
        vec![("Content-Type".to_string(), "text/plain".to_string())],
    );
    single_chunk("Hello, World!")
}

#[derive(Serialize)]
struct EnvironReport {
    environ: BTreeMap<&'static str, String>,
    input_bytes: usize,
}

/// Devuelve el environment recibido como JSON
pub fn environ_dump(environ: Environ, start_response: &mut StartResponse) -> Body {
    let report = EnvironReport {
        environ: environ.vars(),
        input_bytes: environ.input.get_ref().len(),
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            start_response.start_response(
                &StatusCode::Ok.to_string(),
                vec![("Content-Type".to_string(), "application/json".to_string())],
            );
            single_chunk(json)
        }
        Err(e) => {
            let mut errors = environ.errors;
            let _ = writeln!(errors, "environ: serialization failed: {}", e);
            start_response.start_response("500 Internal Server Error", vec![]);
            Box::new(std::iter::empty())
        }
    }
}

/// Devuelve el request tal como se leyó, en chunks de 64 bytes
///
/// Solo acepta métodos con body (POST, PUT); el resto recibe 405.
pub fn echo(mut environ: Environ, start_response: &mut StartResponse) -> Body {
    if !matches!(environ.request_method.as_str(), "POST" | "PUT") {
        start_response.start_response(
            &StatusCode::MethodNotAllowed.to_string(),
            vec![("Allow".to_string(), "POST, PUT".to_string())],
        );
        return Box::new(std::iter::empty());
    }

    let mut raw = Vec::new();
    if let Err(e) = environ.input.read_to_end(&mut raw) {
        let _ = writeln!(environ.errors, "echo: reading input failed: {}", e);
    }

    start_response.start_response(
        &StatusCode::Ok.to_string(),
        vec![(
            "Content-Type".to_string(),
            "application/octet-stream".to_string(),
        )],
    );

    let chunks: Vec<Vec<u8>> = raw.chunks(64).map(|c| c.to_vec()).collect();
    Box::new(chunks.into_iter())
}
