//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Abre el socket de escucha (probando puertos consecutivos)
//! 2. Acepta conexiones en un único thread
//! 3. Decide si cada conexión se atiende inline o en el pool
//! 4. Lee el request, lo enruta y escribe la respuesta

pub mod dispatch;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use dispatch::{AlwaysInline, AlwaysPooled, Dispatch, DispatchMode, DispatchPolicy, LoadBased, PoolLoad};
pub use tcp::{bind_with_retry, handle_connection, Server};
