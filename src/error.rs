//! # Errores del Servidor
//! src/error.rs
//!
//! Errores que pueden terminar el arranque o el loop principal. Los errores
//! por request nunca llegan acá: se convierten en un 404.

use crate::pool::PoolError;
use std::io;
use std::path::PathBuf;

/// Errores fatales del servidor
#[derive(Debug)]
pub enum ServerError {
    /// Configuración inválida
    Config(String),

    /// El directorio raíz no existe o no se puede resolver
    Root { path: PathBuf, source: io::Error },

    /// Ningún puerto del rango disponible pudo usarse
    Bind {
        host: String,
        first_port: u16,
        attempts: u16,
        source: io::Error,
    },

    /// No se pudo crear el pool de workers
    Pool(PoolError),

    /// Error de I/O sobre el socket de escucha
    Io(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            ServerError::Root { path, source } => {
                write!(f, "Invalid document root {}: {}", path.display(), source)
            }
            ServerError::Bind {
                host,
                first_port,
                attempts,
                source,
            } => write!(
                f,
                "Could not bind {} on ports {}..{} ({} attempts): {}",
                host,
                first_port,
                first_port.saturating_add(attempts.saturating_sub(1)),
                attempts,
                source
            ),
            ServerError::Pool(e) => write!(f, "Worker pool error: {}", e),
            ServerError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Config(_) => None,
            ServerError::Root { source, .. } => Some(source),
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Pool(e) => Some(e),
            ServerError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}

impl From<PoolError> for ServerError {
    fn from(e: PoolError) -> Self {
        ServerError::Pool(e)
    }
}
