//! # Earshot Health Check
//!
//! Small JSON-over-HTTP health server embedded in Earshot services:
//! - `/health` - Basic liveness check
//! - `/ready` - Readiness for traffic
//! - `/metrics` - Service counters
//! - `/status` - Detailed service status
//!
//! The server does not know what it is reporting on. Each request asks a
//! [`HealthProbe`] supplied by the service for the current status and counters, so the
//! numbers are always live.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use earshot_health_check::{HealthCheckServer, HealthProbe, HealthStatus};
//! use std::sync::Arc;
//!
//! struct AlwaysUp;
//!
//! impl HealthProbe for AlwaysUp {
//!     fn status(&self) -> HealthStatus {
//!         HealthStatus::Healthy
//!     }
//!
//!     fn metrics(&self) -> serde_json::Value {
//!         serde_json::json!({ "packets_received": 0 })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let server = HealthCheckServer::new("audio_ingest", Arc::new(AlwaysUp), 8090);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Errors retained in the status report
const MAX_RETAINED_ERRORS: usize = 10;

/// Service health status levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy and ready for traffic
    Healthy,
    /// Service is starting up, not ready for traffic
    Starting,
    /// Service has issues but still operational
    Degraded,
    /// Service is not operational
    Unhealthy,
}

/// Live view of a service, queried on every request
pub trait HealthProbe: Send + Sync + 'static {
    fn status(&self) -> HealthStatus;

    /// Counters served on `/metrics`
    fn metrics(&self) -> serde_json::Value;

    /// Extra key/value pairs for `/status`
    fn details(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Recent errors for `/status`
    fn errors(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Service health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service_name: String,
    pub status: HealthStatus,
    /// HTTP health check port
    pub health_port: u16,
    pub startup_time: SystemTime,
    pub last_check: SystemTime,
    pub metrics: serde_json::Value,
    /// Service-specific status details
    pub details: BTreeMap<String, String>,
    pub errors: Vec<String>,
}

impl ServiceHealth {
    pub fn new(service_name: &str, health_port: u16) -> Self {
        Self {
            service_name: service_name.to_string(),
            status: HealthStatus::Starting,
            health_port,
            startup_time: SystemTime::now(),
            last_check: SystemTime::now(),
            metrics: serde_json::Value::Null,
            details: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Pull the current state from a probe
    pub fn refresh(&mut self, probe: &dyn HealthProbe) {
        self.last_check = SystemTime::now();
        self.status = probe.status();
        self.metrics = probe.metrics();
        self.details = probe.details();
        self.errors.clear();
        for error in probe.errors() {
            self.add_error(&error);
        }
    }

    pub fn add_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
        if self.errors.len() > MAX_RETAINED_ERRORS {
            self.errors.remove(0);
        }
    }

    /// Check if service is ready for traffic
    pub fn is_ready(&self) -> bool {
        match self.status {
            HealthStatus::Healthy => true,
            HealthStatus::Degraded => true, // Still accepting traffic
            _ => false,
        }
    }

    /// Check if service is alive
    pub fn is_alive(&self) -> bool {
        !matches!(self.status, HealthStatus::Unhealthy)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.startup_time.elapsed().unwrap_or_default().as_secs()
    }
}

/// HTTP health check server
pub struct HealthCheckServer {
    health: Arc<tokio::sync::Mutex<ServiceHealth>>,
    probe: Arc<dyn HealthProbe>,
    port: u16,
}

impl HealthCheckServer {
    pub fn new(service_name: &str, probe: Arc<dyn HealthProbe>, port: u16) -> Self {
        Self {
            health: Arc::new(tokio::sync::Mutex::new(ServiceHealth::new(
                service_name,
                port,
            ))),
            probe,
            port,
        }
    }

    /// Serve until the listener fails
    pub async fn start(&self) -> Result<()> {
        let (addr, handle) = self.spawn()?;
        debug!("Health check server task running on {}", addr);
        handle.await.context("Health check server task panicked")
    }

    /// Bind on 127.0.0.1 and serve from a background task
    ///
    /// Returns the bound address, which differs from the configured port when that
    /// port is 0.
    pub fn spawn(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let health = Arc::clone(&self.health);
        let probe = Arc::clone(&self.probe);

        let make_svc = make_service_fn(move |_conn| {
            let health = Arc::clone(&health);
            let probe = Arc::clone(&probe);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, Arc::clone(&health), Arc::clone(&probe))
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("Failed to bind health check server on {}", addr))?
            .serve(make_svc);
        let local_addr = server.local_addr();

        info!("Health check server listening on http://{}", local_addr);
        info!("Endpoints: /health, /ready, /metrics, /status");

        let handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("Health check server error: {}", e);
            }
        });

        Ok((local_addr, handle))
    }

    /// Current snapshot, refreshed from the probe
    pub async fn get_health(&self) -> ServiceHealth {
        let mut health = self.health.lock().await;
        health.refresh(self.probe.as_ref());
        health.clone()
    }
}

/// Handle HTTP health check requests
async fn handle_request(
    req: Request<Body>,
    health: Arc<tokio::sync::Mutex<ServiceHealth>>,
    probe: Arc<dyn HealthProbe>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path();
    let method = req.method();

    debug!("Health check request: {} {}", method, path);

    if method != Method::GET {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        ));
    }

    let health_snapshot = {
        let mut guard = health.lock().await;
        guard.refresh(probe.as_ref());
        guard.clone()
    };

    let response = match path {
        "/health" => handle_health_endpoint(&health_snapshot),
        "/ready" => handle_ready_endpoint(&health_snapshot),
        "/metrics" => json_response(StatusCode::OK, &health_snapshot.metrics),
        "/status" => match serde_json::to_value(&health_snapshot) {
            Ok(value) => json_response(StatusCode::OK, &value),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to encode status: {}", e),
            ),
        },
        _ => text_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

/// Handle /health endpoint (basic liveness check)
fn handle_health_endpoint(health: &ServiceHealth) -> Response<Body> {
    if health.is_alive() {
        json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "healthy",
                "service": health.service_name,
                "uptime_seconds": health.uptime_seconds()
            }),
        )
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({
                "status": "unhealthy",
                "service": health.service_name,
                "errors": health.errors
            }),
        )
    }
}

/// Handle /ready endpoint (readiness for traffic)
fn handle_ready_endpoint(health: &ServiceHealth) -> Response<Body> {
    if health.is_ready() {
        json_response(
            StatusCode::OK,
            &serde_json::json!({
                "status": "ready",
                "service": health.service_name
            }),
        )
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({
                "status": "not ready",
                "service": health.service_name,
                "current_status": health.status
            }),
        )
    }
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Body> {
    let text = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text_response(status: StatusCode, body: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingProbe {
        status: HealthStatus,
        packets: AtomicU64,
    }

    impl HealthProbe for CountingProbe {
        fn status(&self) -> HealthStatus {
            self.status
        }

        fn metrics(&self) -> serde_json::Value {
            serde_json::json!({ "packets": self.packets.load(Ordering::Relaxed) })
        }

        fn details(&self) -> BTreeMap<String, String> {
            BTreeMap::from([("online_sensors".to_string(), "2".to_string())])
        }
    }

    fn probe(status: HealthStatus) -> Arc<CountingProbe> {
        Arc::new(CountingProbe {
            status,
            packets: AtomicU64::new(0),
        })
    }

    async fn get(addr: SocketAddr, path: &str) -> (StatusCode, serde_json::Value) {
        let client = hyper::Client::new();
        let uri: hyper::Uri = format!("http://{}{}", addr, path).parse().unwrap();
        let response = client.get(uri).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[test]
    fn test_service_health_refresh() {
        let probe = probe(HealthStatus::Degraded);
        let mut health = ServiceHealth::new("test_service", 0);
        assert_eq!(health.status, HealthStatus::Starting);
        assert!(!health.is_ready());

        health.refresh(probe.as_ref());
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(health.is_ready());
        assert!(health.is_alive());
        assert_eq!(health.details["online_sensors"], "2");
    }

    #[test]
    fn test_error_retention_is_bounded() {
        let mut health = ServiceHealth::new("test_service", 0);
        for i in 0..15 {
            health.add_error(&format!("error {}", i));
        }
        assert_eq!(health.errors.len(), MAX_RETAINED_ERRORS);
        assert_eq!(health.errors[0], "error 5");
    }

    #[tokio::test]
    async fn test_endpoints_report_live_probe_values() {
        let probe = probe(HealthStatus::Healthy);
        let server = HealthCheckServer::new("audio_ingest", probe.clone(), 0);
        let (addr, handle) = server.spawn().unwrap();

        let (status, body) = get(addr, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "audio_ingest");

        probe.packets.store(42, Ordering::Relaxed);
        let (status, body) = get(addr, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["packets"], 42);

        let (_, body) = get(addr, "/status").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["details"]["online_sensors"], "2");

        let (status, _) = get(addr, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        handle.abort();
    }

    #[tokio::test]
    async fn test_not_ready_while_starting() {
        let server = HealthCheckServer::new("audio_ingest", probe(HealthStatus::Starting), 0);
        let (addr, handle) = server.spawn().unwrap();

        let (status, body) = get(addr, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["current_status"], "starting");

        let (status, _) = get(addr, "/health").await;
        assert_eq!(status, StatusCode::OK);

        handle.abort();
    }
}
