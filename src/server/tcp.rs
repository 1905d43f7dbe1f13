//! # Servidor TCP con Pool de Workers
//! src/server/tcp.rs
//!
//! Un único thread acepta conexiones. Cada conexión se atiende inline o se
//! encola en el pool según la `DispatchPolicy`. Si el pool rechaza la tarea
//! (cola llena o cerrada) la conexión se atiende inline: ninguna conexión
//! aceptada queda sin respuesta.

use crate::config::Config;
use crate::error::ServerError;
use crate::http::request::read_request_text;
use crate::http::{Request, Response};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::pool::{panic_message, PoolStats, QueuePolicy, WorkerPool};
use crate::router::{RouteKind, Router};
use crate::server::dispatch::{Dispatch, DispatchPolicy, PoolLoad};
use std::fs;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cada cuántos requests se loguea el snapshot de métricas
const METRICS_LOG_EVERY: u64 = 100;

/// Servidor de archivos estáticos y CGI
pub struct Server {
    config: Config,
    router: Arc<Router>,
    metrics: Arc<MetricsCollector>,
    pool: WorkerPool,
    policy: Box<dyn DispatchPolicy>,
}

impl Server {
    /// Crea el servidor: valida la configuración, resuelve la raíz y
    /// levanta el pool de workers
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let root = fs::canonicalize(&config.root).map_err(|source| ServerError::Root {
            path: config.root.clone(),
            source,
        })?;
        if !root.is_dir() {
            return Err(ServerError::Root {
                path: config.root.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let pool = WorkerPool::with_policy(
            config.workers,
            QueuePolicy::from_capacity(config.queue_capacity),
        )?;
        let policy = config.dispatch.into_policy(config.load_threshold);

        info!(
            root = %root.display(),
            workers = config.workers,
            dispatch = config.dispatch.as_str(),
            "servidor inicializado"
        );

        Ok(Self {
            router: Arc::new(Router::new(root, config.python.clone())),
            metrics: Arc::new(MetricsCollector::new()),
            pool,
            policy,
            config,
        })
    }

    /// Reemplaza la política de despacho
    pub fn with_policy(mut self, policy: Box<dyn DispatchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Abre el socket de escucha según la configuración
    pub fn bind(&self) -> Result<(TcpListener, u16), ServerError> {
        bind_with_retry(&self.config.host, self.config.port, self.config.port_attempts)
    }

    /// Abre el socket y atiende conexiones indefinidamente
    pub fn run(&mut self) -> Result<(), ServerError> {
        let (listener, port) = self.bind()?;
        info!(host = %self.config.host, port, "servidor escuchando");
        println!("[+] Servidor escuchando en {}:{}", self.config.host, port);

        self.serve(listener)
    }

    /// Loop de `accept` sobre un listener ya abierto
    ///
    /// Un error al aceptar se loguea y el loop sigue.
    pub fn serve(&mut self, listener: TcpListener) -> Result<(), ServerError> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    self.dispatch(stream);
                }
                Err(e) => {
                    warn!(error = %e, "error al aceptar conexión");
                }
            }
        }

        Ok(())
    }

    /// Decide dónde se atiende la conexión y la despacha
    pub fn dispatch(&self, stream: TcpStream) -> Dispatch {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let load = PoolLoad {
            workers: self.pool.size(),
            pending: self.pool.pending(),
            in_flight: self.pool.in_flight(),
        };

        let dispatch = match self.policy.decide(&load) {
            Dispatch::Inline => {
                debug!(peer = %peer, pending = load.pending, "conexión atendida inline");
                run_contained(&peer, || {
                    handle_connection(stream, &peer, &self.router, &self.metrics)
                });
                Dispatch::Inline
            }
            Dispatch::Pooled => {
                let router = Arc::clone(&self.router);
                let metrics = Arc::clone(&self.metrics);
                let task_peer = peer.clone();

                let submitted = self.pool.submit(move || {
                    handle_connection(stream, &task_peer, &router, &metrics);
                });

                match submitted {
                    Ok(()) => Dispatch::Pooled,
                    Err(rejected) => {
                        warn!(peer = %peer, reason = %rejected, "el pool rechazó la conexión, se atiende inline");
                        run_contained(&peer, rejected.into_task());
                        Dispatch::Inline
                    }
                }
            }
        };

        self.metrics.record_dispatch(dispatch);
        dispatch
    }

    /// Snapshot de las métricas de requests
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Estadísticas del pool de workers
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Termina las conexiones encoladas y apaga el pool
    pub fn shutdown(&mut self) {
        self.pool.shutdown();

        match self.metrics.to_json() {
            Ok(json) => info!(metrics = %json, "servidor apagado"),
            Err(_) => info!("servidor apagado"),
        }
    }
}

/// Corre una conexión en el thread de `accept`
///
/// Un panic se loguea y se descarta; el loop de `accept` sigue. Retorna
/// `false` si hubo panic.
fn run_contained<F: FnOnce()>(peer: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                peer,
                panic = panic_message(payload.as_ref()),
                "la conexión terminó con panic, el servidor sigue"
            );
            false
        }
    }
}

/// Abre un listener en `host`, probando `attempts` puertos consecutivos a
/// partir de `first_port`
///
/// Retorna el listener y el puerto que quedó abierto.
pub fn bind_with_retry(
    host: &str,
    first_port: u16,
    attempts: u16,
) -> Result<(TcpListener, u16), ServerError> {
    let mut last_error = None;

    for offset in 0..attempts {
        let Some(port) = first_port.checked_add(offset) else {
            break;
        };

        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                if offset > 0 {
                    info!(first_port, port, "puerto inicial ocupado, se usa otro");
                }
                return Ok((listener, port));
            }
            Err(e) => {
                debug!(port, error = %e, "no se pudo abrir el puerto");
                last_error = Some(e);
            }
        }
    }

    Err(ServerError::Bind {
        host: host.to_string(),
        first_port,
        attempts,
        source: last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no ports left to try")
        }),
    })
}

/// Atiende una conexión completa: lee, enruta, responde y registra
///
/// Una conexión que se cierra sin mandar nada no recibe respuesta. Cualquier
/// request que no sea un GET bien formado recibe un 404.
pub fn handle_connection<S: Read + Write>(
    mut stream: S,
    peer: &str,
    router: &Router,
    metrics: &MetricsCollector,
) {
    let start = Instant::now();

    let buffer = match read_request_text(&mut stream) {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!(peer, error = %e, "error leyendo el request");
            return;
        }
    };

    if buffer.is_empty() {
        debug!(peer, "conexión cerrada sin datos");
        return;
    }

    let (route, path, response) = match Request::parse(&buffer) {
        Ok(request) => {
            let route = Router::classify(request.path());
            let response = router.route(&request);
            (route, request.path().to_string(), response)
        }
        Err(e) => {
            info!(peer, error = %e, "request rechazado");
            (RouteKind::Rejected, String::new(), Response::not_found())
        }
    };

    let status = response.status();
    if let Err(e) = response.write_to(&mut stream) {
        warn!(peer, path = %path, error = %e, "error escribiendo la respuesta");
    }

    let latency = start.elapsed();
    info!(
        peer,
        path = %path,
        status = status.as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "request atendido"
    );

    let total = metrics.record_request(route, status.as_u16(), latency);
    if total % METRICS_LOG_EVERY == 0 {
        if let Ok(json) = metrics.to_json() {
            info!(metrics = %json, "métricas");
        }
    }
}
