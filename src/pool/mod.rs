//! # Pool de Workers
//! src/pool/mod.rs
//!
//! Pool de tamaño fijo: N threads de larga vida que consumen una única
//! cola FIFO compartida.
//!
//! ```text
//! Dispatcher ──submit──► [ TaskQueue (FIFO) ] ──dequeue──► worker-0..N-1
//! ```
//!
//! Garantías:
//! - Cada tarea aceptada se ejecuta exactamente una vez
//! - Nunca hay más de N tareas ejecutándose a la vez
//! - Un panic dentro de una tarea no mata al worker ni al pool
//!
//! El pool se apaga con `shutdown` (o al hacer drop): deja de aceptar
//! tareas, termina las que ya estaban encoladas y hace join de los threads.

pub mod queue;

pub use queue::{QueuePolicy, RejectReason, Rejected, Task, TaskQueue};

use serde::Serialize;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Errores al construir el pool
#[derive(Debug)]
pub enum PoolError {
    /// Se pidió un pool sin workers
    ZeroWorkers,

    /// Cola acotada con capacidad cero
    ZeroCapacity,

    /// El sistema operativo no pudo crear el thread de un worker
    Spawn { id: usize, source: io::Error },
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::ZeroWorkers => write!(f, "Worker pool needs at least one worker"),
            PoolError::ZeroCapacity => write!(f, "Bounded task queue needs a capacity >= 1"),
            PoolError::Spawn { id, source } => {
                write!(f, "Failed to spawn worker {}: {}", id, source)
            }
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Contadores compartidos entre el pool y sus workers
#[derive(Default)]
struct PoolCounters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Estadísticas del pool (para logs y métricas)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
}

/// Pool de workers de tamaño fijo
pub struct WorkerPool {
    workers: Vec<Worker>,
    queue: TaskQueue,
    counters: Arc<PoolCounters>,
}

struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Crea un pool de `size` workers con cola sin límite
    ///
    /// # Ejemplo
    /// ```
    /// use cgi_server::pool::WorkerPool;
    ///
    /// let pool = WorkerPool::new(4).unwrap();
    /// pool.submit(|| println!("hola desde un worker")).unwrap();
    /// ```
    pub fn new(size: usize) -> Result<Self, PoolError> {
        Self::with_policy(size, QueuePolicy::Unbounded)
    }

    /// Crea un pool de `size` workers con la política de cola indicada
    pub fn with_policy(size: usize, policy: QueuePolicy) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        if policy == QueuePolicy::Bounded(0) {
            return Err(PoolError::ZeroCapacity);
        }

        let mut pool = Self {
            workers: Vec::with_capacity(size),
            queue: TaskQueue::new(policy),
            counters: Arc::new(PoolCounters::default()),
        };

        // Si falla un spawn, el drop de `pool` apaga los workers ya creados
        for id in 0..size {
            let worker = Worker::spawn(id, pool.queue.clone(), Arc::clone(&pool.counters))
                .map_err(|source| PoolError::Spawn { id, source })?;
            pool.workers.push(worker);
        }

        info!(workers = size, queue = ?policy, "pool de workers iniciado");
        Ok(pool)
    }

    /// Encola una tarea y retorna de inmediato
    ///
    /// Si la cola la rechaza (llena o pool apagándose) la tarea vuelve al
    /// llamador dentro del error.
    pub fn submit<F>(&self, f: F) -> Result<(), Rejected>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.enqueue(Box::new(f))?;
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Número de workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Tareas encoladas que ningún worker tomó todavía
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Tareas ejecutándose en este momento
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Política de capacidad de la cola
    pub fn policy(&self) -> QueuePolicy {
        self.queue.policy()
    }

    /// Snapshot de las estadísticas del pool
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers.len(),
            pending: self.queue.len(),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak_in_flight.load(Ordering::SeqCst),
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
        }
    }

    /// Apaga el pool
    ///
    /// Cierra la cola (los `submit` siguientes son rechazados), deja que
    /// los workers terminen todo lo encolado y espera a que salgan.
    /// Llamarlo más de una vez no tiene efecto.
    pub fn shutdown(&mut self) {
        if self.workers.iter().all(|w| w.handle.is_none()) {
            return;
        }

        self.queue.close();

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                debug!(worker = worker.id, "esperando al worker");
                if handle.join().is_err() {
                    warn!(worker = worker.id, "el worker terminó con panic");
                }
            }
        }

        let stats = self.stats();
        match serde_json::to_string(&stats) {
            Ok(json) => info!(stats = %json, "pool de workers apagado"),
            Err(_) => info!("pool de workers apagado"),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Worker {
    fn spawn(id: usize, queue: TaskQueue, counters: Arc<PoolCounters>) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || Self::run(id, queue, counters))?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    /// Loop principal del worker
    fn run(id: usize, queue: TaskQueue, counters: Arc<PoolCounters>) {
        debug!(worker = id, "worker iniciado");

        while let Some(task) = queue.dequeue() {
            let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let outcome = panic::catch_unwind(AssertUnwindSafe(task));

            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            match outcome {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(payload) => {
                    counters.panicked.fetch_add(1, Ordering::SeqCst);
                    error!(
                        worker = id,
                        panic = panic_message(payload.as_ref()),
                        "la tarea terminó con panic, el worker sigue"
                    );
                }
            }
        }

        debug!(worker = id, "worker terminado");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_is_an_error() {
        assert!(matches!(WorkerPool::new(0), Err(PoolError::ZeroWorkers)));
    }

    #[test]
    fn test_zero_capacity_is_an_error() {
        let result = WorkerPool::with_policy(2, QueuePolicy::Bounded(0));
        assert!(matches!(result, Err(PoolError::ZeroCapacity)));
    }

    #[test]
    fn test_pool_size() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.policy(), QueuePolicy::Unbounded);
    }

    #[test]
    fn test_every_task_runs_exactly_once() {
        for (workers, tasks) in [(1, 10), (4, 3), (4, 200)] {
            let mut pool = WorkerPool::new(workers).unwrap();
            let executions = Arc::new(Mutex::new(vec![0u32; tasks]));

            for i in 0..tasks {
                let executions = Arc::clone(&executions);
                pool.submit(move || {
                    executions.lock().unwrap()[i] += 1;
                })
                .unwrap();
            }

            pool.shutdown();

            let executions = executions.lock().unwrap();
            assert!(executions.iter().all(|&n| n == 1), "{:?}", executions);
            assert_eq!(pool.stats().completed, tasks as u64);
        }
    }

    #[test]
    fn test_concurrency_never_exceeds_pool_size() {
        let workers = 3;
        let mut pool = WorkerPool::new(workers).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..30 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                current.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();

        assert!(peak.load(Ordering::SeqCst) <= workers);
        assert!(pool.stats().peak_in_flight <= workers);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let mut pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.submit(|| panic!("boom")).unwrap();
        pool.submit(move || tx.send("still alive").unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "still alive");

        pool.shutdown();
        let stats = pool.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.shutdown();

        let rejected = pool.submit(|| {}).unwrap_err();
        assert_eq!(rejected.reason(), RejectReason::Closed);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_shutdown_drains_queued_tasks() {
        let mut pool = WorkerPool::new(1).unwrap();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(move || {
            gate_rx.recv().unwrap();
        })
        .unwrap();

        for _ in 0..5 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        gate_tx.send(()).unwrap();
        pool.shutdown();

        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_bounded_queue_rejects_when_full() {
        let mut pool = WorkerPool::with_policy(1, QueuePolicy::Bounded(1)).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();

        // Ocupar al único worker
        pool.submit(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Llenar la cola
        pool.submit(|| {}).unwrap();
        assert_eq!(pool.pending(), 1);

        let rejected = pool.submit(|| {}).unwrap_err();
        assert_eq!(rejected.reason(), RejectReason::QueueFull { capacity: 1 });

        gate_tx.send(()).unwrap();
        pool.shutdown();
        assert_eq!(pool.stats().submitted, 2);
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let pool = WorkerPool::new(2).unwrap();
        let json = serde_json::to_value(pool.stats()).unwrap();

        assert_eq!(json["workers"], 2);
        assert_eq!(json["pending"], 0);
        assert!(json.get("peak_in_flight").is_some());
    }
}
