//! Health check HTTP server
//!
//! Exposes `GET /health` with per-dependency checks and `GET /ready` for
//! readiness probes; both return 503 when any dependency fails. Dependencies
//! are modelled as probes so tests can substitute mocks for the broker.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::Filter;

/// A dependency the health endpoint reports on
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Name used as the key in the `checks` map
    fn name(&self) -> &str;

    /// Probe the dependency; the error string is reported verbatim
    async fn check(&self) -> Result<(), String>;
}

/// Broker probe backed by a redis PING
pub struct RedisProbe {
    conn: ConnectionManager,
}

impl RedisProbe {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl HealthProbe for RedisProbe {
    fn name(&self) -> &str {
        "broker"
    }

    async fn check(&self) -> Result<(), String> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    checks: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: String,
}

/// HTTP health check server
pub struct HealthServer {
    worker_id: String,
    port: u16,
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthServer {
    pub fn new(worker_id: String, port: u16) -> Self {
        Self {
            worker_id,
            port,
            probes: Vec::new(),
        }
    }

    pub fn add_probe(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    /// Serve until the cancellation scope closes
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let health_server = self.clone();
        let health_route = warp::path("health").and(warp::get()).and_then(move || {
            let server = health_server.clone();
            async move {
                let (response, healthy) = server.health_status().await;
                let status = if healthy {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                Ok::<_, Infallible>(warp::reply::with_status(
                    warp::reply::json(&response),
                    status,
                ))
            }
        });

        let ready_server = self.clone();
        let ready_route = warp::path("ready").and(warp::get()).and_then(move || {
            let server = ready_server.clone();
            async move {
                let (_, healthy) = server.health_status().await;
                let response = ReadyResponse {
                    status: if healthy { "ready" } else { "not ready" }.to_string(),
                };
                let status = if healthy {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                Ok::<_, Infallible>(warp::reply::with_status(
                    warp::reply::json(&response),
                    status,
                ))
            }
        });

        let routes = health_route.or(ready_route);

        tracing::info!(
            worker_id = %self.worker_id,
            port = self.port,
            "starting health server"
        );

        let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(
            ([0, 0, 0, 0], self.port),
            async move { cancel.cancelled().await },
        );
        server.await;

        tracing::info!("health server stopped");
    }

    async fn health_status(&self) -> (HealthResponse, bool) {
        let mut checks = HashMap::new();
        let mut healthy = true;

        for probe in &self.probes {
            match probe.check().await {
                Ok(()) => {
                    checks.insert(probe.name().to_string(), "healthy".to_string());
                }
                Err(e) => {
                    healthy = false;
                    checks.insert(probe.name().to_string(), format!("unhealthy: {e}"));
                }
            }
        }

        let status = if healthy { "healthy" } else { "unhealthy" };
        (
            HealthResponse {
                status: status.to_string(),
                checks,
            },
            healthy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe {
        name: &'static str,
        result: Result<(), String>,
    }

    #[async_trait]
    impl HealthProbe for StaticProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn check(&self) -> Result<(), String> {
            self.result.clone()
        }
    }

    fn server_with(probes: Vec<Arc<dyn HealthProbe>>) -> HealthServer {
        let mut server = HealthServer::new("router-1".to_string(), 8082);
        for probe in probes {
            server.add_probe(probe);
        }
        server
    }

    #[tokio::test]
    async fn test_all_probes_healthy() {
        let server = server_with(vec![Arc::new(StaticProbe {
            name: "broker",
            result: Ok(()),
        })]);

        let (response, healthy) = server.health_status().await;
        assert!(healthy);
        assert_eq!(response.status, "healthy");
        assert_eq!(response.checks["broker"], "healthy");
    }

    #[tokio::test]
    async fn test_failing_probe_degrades_status() {
        let server = server_with(vec![
            Arc::new(StaticProbe {
                name: "broker",
                result: Err("connection refused".to_string()),
            }),
            Arc::new(StaticProbe {
                name: "other",
                result: Ok(()),
            }),
        ]);

        let (response, healthy) = server.health_status().await;
        assert!(!healthy);
        assert_eq!(response.status, "unhealthy");
        assert!(response.checks["broker"].contains("connection refused"));
        assert_eq!(response.checks["other"], "healthy");
    }

    #[tokio::test]
    async fn test_no_probes_is_healthy() {
        let server = server_with(vec![]);
        let (response, healthy) = server.health_status().await;
        assert!(healthy);
        assert!(response.checks.is_empty());
    }
}
