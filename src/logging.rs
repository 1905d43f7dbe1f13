//! # Logging
//! src/logging.rs
//!
//! Inicializa el subscriber de `tracing`. `RUST_LOG` tiene prioridad sobre
//! el nivel que viene de la configuración.

use tracing_subscriber::EnvFilter;

/// Filtro de logs: `RUST_LOG`, si no `default_level`, si no `info`
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Instala el subscriber global
///
/// Si ya había uno instalado no hace nada.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}
