//! # Cola FIFO de Tareas
//! src/pool/queue.rs
//!
//! Cola thread-safe compartida entre el dispatcher (que encola) y los
//! workers (que desencolan). Es la única estructura que modifican varios
//! threads a la vez: se protege con un `Mutex` y un `Condvar` que avisa
//! cuando la cola deja de estar vacía.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Unidad de trabajo: se ejecuta exactamente una vez en algún worker
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Política de capacidad de la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Sin límite: bajo sobrecarga sostenida la cola crece indefinidamente
    Unbounded,

    /// Con límite: al llenarse, `enqueue` rechaza la tarea
    Bounded(usize),
}

impl QueuePolicy {
    /// Traduce la capacidad de la configuración (0 = sin límite)
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            QueuePolicy::Unbounded
        } else {
            QueuePolicy::Bounded(capacity)
        }
    }
}

/// Motivo por el que no se aceptó una tarea
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// La cola acotada está llena
    QueueFull { capacity: usize },

    /// El pool ya se está apagando
    Closed,
}

/// Tarea rechazada por la cola
///
/// Devuelve la tarea al llamador para que pueda ejecutarla por su cuenta:
/// así ninguna conexión queda sin atender.
pub struct Rejected {
    task: Task,
    reason: RejectReason,
}

impl Rejected {
    /// Motivo del rechazo
    pub fn reason(&self) -> RejectReason {
        self.reason
    }

    /// Recupera la tarea rechazada
    pub fn into_task(self) -> Task {
        self.task
    }
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            RejectReason::QueueFull { capacity } => {
                write!(f, "Queue is full (max capacity: {})", capacity)
            }
            RejectReason::Closed => write!(f, "Pool is shutting down"),
        }
    }
}

impl std::error::Error for Rejected {}

/// Estado protegido por el mutex
struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// Cola FIFO thread-safe
pub struct TaskQueue {
    /// Tareas pendientes + flag de cierre
    state: Arc<Mutex<QueueState>>,

    /// Condvar para notificar cuando hay nuevas tareas (o se cerró la cola)
    condvar: Arc<Condvar>,

    policy: QueuePolicy,
}

impl TaskQueue {
    /// Crea una cola vacía con la política indicada
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            })),
            condvar: Arc::new(Condvar::new()),
            policy,
        }
    }

    /// Las tareas corren fuera del lock, así que un mutex envenenado
    /// sigue teniendo un estado consistente.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola una tarea al final
    ///
    /// No bloquea. Retorna la tarea dentro de `Rejected` si la cola está
    /// cerrada o llena.
    pub fn enqueue(&self, task: Task) -> Result<(), Rejected> {
        let mut state = self.lock();

        if state.closed {
            return Err(Rejected {
                task,
                reason: RejectReason::Closed,
            });
        }

        if let QueuePolicy::Bounded(capacity) = self.policy {
            if state.tasks.len() >= capacity {
                return Err(Rejected {
                    task,
                    reason: RejectReason::QueueFull { capacity },
                });
            }
        }

        state.tasks.push_back(task);

        // Despertar a un worker esperando
        self.condvar.notify_one();

        Ok(())
    }

    /// Desencola la tarea más antigua
    ///
    /// Bloquea mientras la cola esté vacía. Retorna `None` sólo cuando la
    /// cola está cerrada y ya no quedan tareas.
    pub fn dequeue(&self) -> Option<Task> {
        let mut state = self.lock();

        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }

            state = self
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierra la cola: no se aceptan más tareas y se despierta a todos
    /// los workers para que terminen de vaciarla
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.condvar.notify_all();
    }

    /// Retorna la cantidad de tareas pendientes
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Política de capacidad de esta cola
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }
}

impl Clone for TaskQueue {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            condvar: Arc::clone(&self.condvar),
            policy: self.policy,
        }
    }
}
