//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Sólo la parte del protocolo que el servidor necesita:
//!
//! - Lectura del request y extracción de método/path
//! - Construcción y escritura de la respuesta
//! - Los dos códigos de estado que se usan (200 y 404)
//!
//! No hay conexiones persistentes, ni chunked transfer, ni negociación
//! de contenido: un request, una respuesta, y se cierra la conexión.

pub mod request;   // Parsing de requests
pub mod response;  // Construcción de responses
pub mod status;    // Códigos de estado HTTP

pub use request::{ParseError, Request};
pub use response::Response;
pub use status::StatusCode;

/// Identidad del servidor (header `Server` y `SERVER_SOFTWARE` de CGI)
pub const SERVER_SOFTWARE: &str = concat!("cgi_server/", env!("CARGO_PKG_VERSION"));
