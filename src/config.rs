//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables
//! de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./cgi_server --port 8080 \
//!   --root ./www \
//!   --workers 8 \
//!   --queue-capacity 256 \
//!   --dispatch load
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 DOC_ROOT=./www WORKERS=8 ./cgi_server
//! ```

use crate::server::dispatch::DispatchMode;
use clap::Parser;
use std::path::PathBuf;

/// Configuración del servidor de archivos estáticos y CGI
#[derive(Debug, Clone, Parser)]
#[command(name = "cgi_server")]
#[command(about = "Servidor HTTP de archivos estáticos y CGI con pool de workers")]
#[command(version)]
pub struct Config {
    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Primer puerto a intentar
    #[arg(short, long, default_value = "8000", env = "HTTP_PORT")]
    pub port: u16,

    /// Cantidad de puertos consecutivos a probar si el primero está ocupado
    #[arg(long = "port-attempts", default_value = "100", env = "PORT_ATTEMPTS")]
    pub port_attempts: u16,

    /// Directorio raíz desde donde se sirven archivos y programas CGI
    #[arg(long, default_value = ".", env = "DOC_ROOT")]
    pub root: PathBuf,

    // === Pool ===
    /// Número de workers del pool
    #[arg(short, long, default_value = "4", env = "WORKERS")]
    pub workers: usize,

    /// Capacidad de la cola de tareas (0 = sin límite)
    #[arg(long = "queue-capacity", default_value = "0", env = "QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    // === Despacho ===
    /// Política de despacho de conexiones
    #[arg(long, value_enum, default_value = "pooled", env = "DISPATCH_MODE")]
    pub dispatch: DispatchMode,

    /// Tareas pendientes a partir de las cuales `--dispatch load` atiende inline
    #[arg(long = "load-threshold", default_value = "16", env = "LOAD_THRESHOLD")]
    pub load_threshold: usize,

    // === CGI ===
    /// Intérprete usado para programas `.py`
    #[arg(long, default_value = "python", env = "CGI_PYTHON")]
    pub python: String,

    // === Logging ===
    /// Nivel de log (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Obtiene la dirección para el primer intento de bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use cgi_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8000");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Workers must be >= 1".to_string());
        }

        if self.port_attempts == 0 {
            return Err("Port attempts must be >= 1".to_string());
        }

        if self.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }

        if self.python.trim().is_empty() {
            return Err("Python interpreter must not be empty".to_string());
        }

        if self.dispatch == DispatchMode::Load && self.load_threshold == 0 {
            return Err("Load threshold must be >= 1 with --dispatch load".to_string());
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        let queue = if self.queue_capacity == 0 {
            "unbounded".to_string()
        } else {
            self.queue_capacity.to_string()
        };

        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║               CGI / Static File Server                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Port tries:   {}", self.port_attempts);
        println!("   Root:         {}", self.root.display());
        println!();
        println!("👷 Worker Pool:");
        println!("   Workers:      {}", self.workers);
        println!("   Queue cap:    {}", queue);
        println!("   Dispatch:     {}", self.dispatch.as_str());
        if self.dispatch == DispatchMode::Load {
            println!("   Threshold:    {} pending", self.load_threshold);
        }
        println!();
        println!("🐍 CGI:");
        println!("   Python:       {}", self.python);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            port_attempts: 100,
            root: PathBuf::from("."),
            workers: 4,
            queue_capacity: 0,
            dispatch: DispatchMode::Pooled,
            load_threshold: 16,
            python: "python".to_string(),
            log_level: "info".to_string(),
        }
    }
}
