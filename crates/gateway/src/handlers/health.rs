//! Health check handlers

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
}

/// Root endpoint - API banner
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "RagBridge API is running".to_string(),
        version: ragbridge_common::VERSION.to_string(),
        status: "healthy".to_string(),
    })
}

/// Liveness probe - always healthy if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_healthy() {
        let response = health().await;
        assert_eq!(response.0.status, "healthy");
        assert!(response.0.timestamp > 0);
    }

    #[tokio::test]
    async fn root_reports_version() {
        let response = root().await;
        assert_eq!(response.0.version, ragbridge_common::VERSION);
    }
}
