//! # Enrutamiento
//! src/router/mod.rs
//!
//! Sólo hay dos destinos posibles:
//!
//! ```text
//! Request ─┬─ path contiene "/cgi-bin/" ──► CGI
//!          └─ cualquier otro path ─────────► archivo estático
//! ```
//!
//! La prueba es de substring, no de prefijo: `/a/cgi-bin/x` también es CGI.

use crate::handlers::cgi::{extract_query, CgiInvoker};
use crate::handlers::static_files::{absolute_root, output_static_file};
use crate::http::{Request, Response};
use serde::Serialize;
use std::path::PathBuf;

/// Marca que identifica un request CGI
pub const CGI_BIN_PATH: &str = "/cgi-bin/";

/// Verifica si el path es un request CGI
///
/// ```
/// use cgi_server::router::is_cgi_bin_request;
///
/// assert!(is_cgi_bin_request("/cgi-bin/echo.py"));
/// assert!(is_cgi_bin_request("/a/cgi-bin/x"));
/// assert!(!is_cgi_bin_request("/cgi-bin"));
/// ```
pub fn is_cgi_bin_request(path: &str) -> bool {
    path.contains(CGI_BIN_PATH)
}

/// Tipo de destino de un request (para logs y métricas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Archivo estático
    Static,

    /// Programa CGI
    Cgi,

    /// Request que no llegó al router (no es GET o está malformado)
    Rejected,
}

/// Router de archivos estáticos y CGI bajo una raíz
#[derive(Debug, Clone)]
pub struct Router {
    root: PathBuf,
    cgi: CgiInvoker,
}

impl Router {
    /// Crea un router para la raíz `root`
    ///
    /// `python` es el intérprete que se usa para los programas `.py`.
    pub fn new(root: impl Into<PathBuf>, python: impl Into<String>) -> Self {
        let root = absolute_root(root.into());
        Self {
            cgi: CgiInvoker::new(root.clone(), python),
            root,
        }
    }

    /// Clasifica un path crudo
    pub fn classify(path: &str) -> RouteKind {
        if is_cgi_bin_request(path) {
            RouteKind::Cgi
        } else {
            RouteKind::Static
        }
    }

    /// Despacha el request al CGI o al archivo estático
    ///
    /// Para archivos estáticos la query se descarta antes de buscar el
    /// archivo.
    pub fn route(&self, request: &Request) -> Response {
        let path = request.path();

        match Self::classify(path) {
            RouteKind::Cgi => self.cgi.run_cgi(path),
            _ => output_static_file(&self.root, &extract_query(path).path),
        }
    }
}
