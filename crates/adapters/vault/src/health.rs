//! Health check functionality for secret backends

use std::time::Instant;

use ports::SecretBackend;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealthStatus {
    /// Whether the backend answered the health check
    pub accessible: bool,

    /// Response time in milliseconds
    pub response_time_ms: Option<u64>,

    /// Error kind and message if the check failed
    pub error: Option<String>,
}

impl BackendHealthStatus {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            accessible: true,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            accessible: false,
            response_time_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.accessible && self.error.is_none()
    }
}

/// Check a backend and time the answer
pub async fn check_backend_health(backend: &dyn SecretBackend) -> BackendHealthStatus {
    debug!("Performing secret backend health check");

    let start = Instant::now();

    match backend.health_check().await {
        Ok(true) => {
            let response_time_ms = start.elapsed().as_millis() as u64;
            debug!(response_time_ms, "Secret backend health check passed");
            BackendHealthStatus::healthy(response_time_ms)
        }
        Ok(false) => {
            warn!("Secret backend reported itself unavailable");
            BackendHealthStatus::unhealthy("backend reported unavailable")
        }
        Err(e) => {
            warn!(error = %e, "Secret backend health check failed");
            BackendHealthStatus::unhealthy(format!("{}: {}", e.code(), e))
        }
    }
}
