//! # CGI Server
//! src/lib.rs
//!
//! Servidor HTTP mínimo que sirve archivos estáticos y ejecuta programas
//! CGI bajo un directorio raíz. Las conexiones se atienden en un pool de
//! workers de tamaño fijo alimentado por una cola FIFO.
//!
//! ## Arquitectura
//!
//! - `http`: parsing del request line y escritura de la respuesta
//! - `router`: decide entre archivo estático y CGI
//! - `handlers`: archivos estáticos y ejecución de programas CGI
//! - `pool`: cola de tareas y pool de workers
//! - `server`: socket de escucha, despacho y manejo de conexiones
//! - `metrics`: contadores y latencias
//! - `config`, `error`, `logging`: configuración, errores fatales y logs
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use cgi_server::config::Config;
//! use cgi_server::server::Server;
//!
//! let mut server = Server::new(Config::default()).unwrap();
//! server.run().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod router;
pub mod server;
