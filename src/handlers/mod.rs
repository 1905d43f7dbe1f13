//! # Handlers
//! src/handlers/mod.rs
//!
//! Los dos tipos de contenido que sirve el servidor:
//!
//! - **static_files**: archivos leídos desde el directorio raíz
//! - **cgi**: programas externos cuyo stdout es la respuesta
//!
//! Ambos retornan una `Response` lista para escribir; ningún error sale
//! de acá, todo se convierte en 404.

pub mod cgi;
pub mod static_files;

pub use cgi::{extract_query, CgiCommand, CgiError, CgiInvoker, RequestPair};
pub use static_files::output_static_file;
