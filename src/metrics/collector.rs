//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega métricas del servidor en tiempo real.

use crate::router::RouteKind;
use crate::server::dispatch::Dispatch;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Contador total de requests
    total_requests: u64,

    /// Requests por código de estado
    status_codes: BTreeMap<u16, u64>,

    /// Últimas latencias registradas (en microsegundos)
    latencies: VecDeque<u64>,

    /// Requests por tipo de destino
    routes: RouteCounts,

    /// Conexiones por forma de despacho
    dispatch: DispatchCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteCounts {
    pub r#static: u64,
    pub cgi: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub inline: u64,
    pub pooled: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub avg: u64,
    pub samples: usize,
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub routes: RouteCounts,
    pub dispatch: DispatchCounts,
    pub latency_us: LatencySummary,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra un request atendido
    ///
    /// Retorna el total de requests registrados hasta ahora.
    pub fn record_request(&self, route: RouteKind, status_code: u16, latency: Duration) -> u64 {
        let mut data = self.lock();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;

        match route {
            RouteKind::Static => data.routes.r#static += 1,
            RouteKind::Cgi => data.routes.cgi += 1,
            RouteKind::Rejected => data.routes.rejected += 1,
        }

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);

        data.total_requests
    }

    /// Registra dónde se despachó una conexión
    pub fn record_dispatch(&self, dispatch: Dispatch) {
        let mut data = self.lock();
        match dispatch {
            Dispatch::Inline => data.dispatch.inline += 1,
            Dispatch::Pooled => data.dispatch.pooled += 1,
        }
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_requests: data.total_requests,
            status_codes: data.status_codes.clone(),
            routes: data.routes,
            dispatch: data.dispatch,
            latency_us: summarize(&data.latencies),
        }
    }

    /// Snapshot en formato JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calcula percentiles y promedio de latencia
fn summarize(latencies: &VecDeque<u64>) -> LatencySummary {
    if latencies.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let sum: u64 = sorted.iter().sum();

    LatencySummary {
        p50: sorted[len * 50 / 100],
        p95: sorted[len * 95 / 100],
        p99: sorted[len * 99 / 100],
        avg: sum / len as u64,
        samples: len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new();

        collector.record_request(RouteKind::Static, 200, Duration::from_millis(10));
        collector.record_request(RouteKind::Cgi, 200, Duration::from_millis(20));
        let total = collector.record_request(RouteKind::Rejected, 404, Duration::from_millis(5));

        assert_eq!(total, 3);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&404), Some(&1));
        assert_eq!(snapshot.routes, RouteCounts { r#static: 1, cgi: 1, rejected: 1 });
    }

    #[test]
    fn test_percentiles() {
        let collector = MetricsCollector::new();

        for i in 1..=100 {
            collector.record_request(RouteKind::Static, 200, Duration::from_micros(i));
        }

        let latency = collector.snapshot().latency_us;
        assert!(latency.p50 > 0);
        assert!(latency.p95 > latency.p50);
        assert!(latency.p99 > latency.p95);
        assert_eq!(latency.samples, 100);
    }

    #[test]
    fn test_dispatch_counts() {
        let collector = MetricsCollector::new();

        collector.record_dispatch(Dispatch::Pooled);
        collector.record_dispatch(Dispatch::Pooled);
        collector.record_dispatch(Dispatch::Inline);

        assert_eq!(
            collector.snapshot().dispatch,
            DispatchCounts { inline: 1, pooled: 2 }
        );
    }

    #[test]
    fn test_latency_window_management() {
        let collector = MetricsCollector::new();

        for i in 0..15_000 {
            collector.record_request(RouteKind::Static, 200, Duration::from_micros(i));
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 15_000);
        assert_eq!(snapshot.latency_us.samples, MAX_LATENCIES);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.latency_us, LatencySummary::default());
    }

    #[test]
    fn test_json_format() {
        let collector = MetricsCollector::new();
        collector.record_request(RouteKind::Cgi, 200, Duration::from_millis(50));
        collector.record_dispatch(Dispatch::Inline);

        let json: serde_json::Value = serde_json::from_str(&collector.to_json().unwrap()).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["routes"]["cgi"], 1);
        assert_eq!(json["routes"]["static"], 0);
        assert_eq!(json["dispatch"]["inline"], 1);
        assert_eq!(json["status_codes"]["200"], 1);
    }
}
