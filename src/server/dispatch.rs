//! # Política de Despacho
//! src/server/dispatch.rs
//!
//! Por cada conexión aceptada el servidor decide si la atiende en el mismo
//! thread que hace `accept` (inline) o si la manda al pool. La decisión es
//! un punto de extensión: cualquier `DispatchPolicy` sirve, incluso un
//! closure.

use clap::ValueEnum;
use serde::Serialize;

/// Dónde se procesa una conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// En el thread que acepta conexiones
    Inline,

    /// Como tarea del pool de workers
    Pooled,
}

/// Carga del pool al momento de decidir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLoad {
    pub workers: usize,
    pub pending: usize,
    pub in_flight: usize,
}

/// Decide inline vs pool para cada conexión
pub trait DispatchPolicy: Send + Sync {
    fn decide(&self, load: &PoolLoad) -> Dispatch;
}

impl<F> DispatchPolicy for F
where
    F: Fn(&PoolLoad) -> Dispatch + Send + Sync,
{
    fn decide(&self, load: &PoolLoad) -> Dispatch {
        self(load)
    }
}

/// Todo va al pool
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPooled;

impl DispatchPolicy for AlwaysPooled {
    fn decide(&self, _load: &PoolLoad) -> Dispatch {
        Dispatch::Pooled
    }
}

/// Todo se atiende inline (servidor secuencial)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysInline;

impl DispatchPolicy for AlwaysInline {
    fn decide(&self, _load: &PoolLoad) -> Dispatch {
        Dispatch::Inline
    }
}

/// Va al pool mientras la cola tenga menos de `max_pending` tareas
///
/// Con la cola saturada, el thread de `accept` atiende él mismo la
/// conexión y deja de aceptar nuevas mientras tanto.
#[derive(Debug, Clone, Copy)]
pub struct LoadBased {
    pub max_pending: usize,
}

impl DispatchPolicy for LoadBased {
    fn decide(&self, load: &PoolLoad) -> Dispatch {
        if load.pending >= self.max_pending {
            Dispatch::Inline
        } else {
            Dispatch::Pooled
        }
    }
}

/// Política elegida desde la configuración
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// Siempre al pool
    Pooled,

    /// Siempre inline
    Inline,

    /// Según la cantidad de tareas pendientes
    Load,
}

impl DispatchMode {
    /// Construye la política correspondiente
    pub fn into_policy(self, load_threshold: usize) -> Box<dyn DispatchPolicy> {
        match self {
            DispatchMode::Pooled => Box::new(AlwaysPooled),
            DispatchMode::Inline => Box::new(AlwaysInline),
            DispatchMode::Load => Box::new(LoadBased {
                max_pending: load_threshold,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Pooled => "pooled",
            DispatchMode::Inline => "inline",
            DispatchMode::Load => "load",
        }
    }
}
